mod common;

use std::sync::Arc;

use common::{ScriptedBackend, WAIT, conversation, double_encoded, spawn_socket_server};
use imprint_client_core::{ChannelConfig, ChannelEvent, RealtimeChannel, SOCKET_ERROR_NOTICE};
use imprint_domain::AttachmentKind;
use imprint_protocol::DEFAULT_MAX_FRAME_SIZE;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn cfg(websocket_url: Option<String>) -> ChannelConfig {
	ChannelConfig {
		websocket_url,
		max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
	}
}

async fn next_event(rx: &mut UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
	timeout(WAIT, rx.recv())
		.await
		.expect("timed out waiting for channel event")
		.expect("channel event stream closed")
}

#[tokio::test]
async fn blank_token_means_no_socket() {
	let backend = Arc::new(ScriptedBackend::with_token("   "));
	let (handle, mut events) = RealtimeChannel::open(backend, cfg(Some("ws://127.0.0.1:1/ws".into())), conversation());

	match next_event(&mut events).await {
		ChannelEvent::Unavailable(_) => {}
		other => panic!("unexpected event: {other:?}"),
	}
	assert!(!handle.is_ready());
	assert!(!handle.send("hello"));
}

#[tokio::test]
async fn token_error_means_no_socket() {
	let backend = Arc::new(ScriptedBackend::default());
	let (_handle, mut events) = RealtimeChannel::open(backend, cfg(None), conversation());
	assert!(matches!(next_event(&mut events).await, ChannelEvent::Unavailable(_)));
}

#[tokio::test]
async fn opaque_token_without_base_url_is_unavailable() {
	let backend = Arc::new(ScriptedBackend::with_token("abc123"));
	let (_handle, mut events) = RealtimeChannel::open(backend, cfg(None), conversation());
	assert!(matches!(next_event(&mut events).await, ChannelEvent::Unavailable(_)));
}

#[tokio::test]
async fn connect_failure_surfaces_notice() {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let backend = Arc::new(ScriptedBackend::with_token(&format!("ws://{addr}/ws")));
	let (handle, mut events) = RealtimeChannel::open(backend, cfg(None), conversation());

	assert_eq!(
		next_event(&mut events).await,
		ChannelEvent::TransportError(SOCKET_ERROR_NOTICE.to_string())
	);
	assert!(!handle.is_ready());
}

#[tokio::test]
async fn frames_are_decoded_and_garbage_is_dropped() {
	let server = spawn_socket_server().await;
	let backend = Arc::new(ScriptedBackend::with_token(&server.url));
	let (handle, mut events) = RealtimeChannel::open(backend, cfg(None), conversation());

	assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);
	assert!(handle.is_ready());

	server.push.send("not json at all".to_string()).unwrap();
	server.push.send(r#"{"messageId":"m0","fromUserId":"u2"}"#.to_string()).unwrap();
	server
		.push
		.send(double_encoded(serde_json::json!({
			"messageId": "m1",
			"message": "hi there",
			"fromUserId": "u2",
			"attachmentType": null,
			"attachmentUrl": null,
		})))
		.unwrap();

	match next_event(&mut events).await {
		ChannelEvent::Frame(frame) => {
			assert_eq!(frame.message_id, "m1");
			assert_eq!(frame.message.as_deref(), Some("hi there"));
		}
		other => panic!("unexpected event: {other:?}"),
	}
	assert!(handle.is_ready());
}

#[tokio::test]
async fn sends_reach_the_server_once_open() {
	let mut server = spawn_socket_server().await;
	let backend = Arc::new(ScriptedBackend::with_token("t-1"));
	let (handle, mut events) = RealtimeChannel::open(backend, cfg(Some(server.url.clone())), conversation());

	assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);

	assert!(handle.send("hello"));
	assert!(handle.send_attachment("/GIFs/dino.gif", AttachmentKind::Gif));

	let text = timeout(WAIT, server.received.recv()).await.unwrap().unwrap();
	let value: serde_json::Value = serde_json::from_str(&text).unwrap();
	assert_eq!(
		value,
		serde_json::json!({
			"attachmentUrl": null,
			"attachmentType": null,
			"message": "hello",
			"conversationID": "conv-1",
		})
	);

	let text = timeout(WAIT, server.received.recv()).await.unwrap().unwrap();
	let value: serde_json::Value = serde_json::from_str(&text).unwrap();
	assert_eq!(value["attachmentType"], "GIF");
	assert_eq!(value["attachmentUrl"], "/GIFs/dino.gif");
	assert!(value.get("message").is_none());
}

#[tokio::test]
async fn close_is_deterministic() {
	let mut server = spawn_socket_server().await;
	let backend = Arc::new(ScriptedBackend::with_token(&server.url));
	let (handle, mut events) = RealtimeChannel::open(backend, cfg(None), conversation());

	assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);
	handle.close();
	assert!(!handle.is_ready());
	assert!(!handle.send("late"));

	assert_eq!(next_event(&mut events).await, ChannelEvent::Closed);
	timeout(WAIT, server.client_gone.recv()).await.unwrap();
}

#[tokio::test]
async fn server_close_marks_not_ready() {
	let server = spawn_socket_server().await;
	let backend = Arc::new(ScriptedBackend::with_token(&server.url));
	let (handle, mut events) = RealtimeChannel::open(backend, cfg(None), conversation());

	assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);
	drop(server.push);

	assert_eq!(next_event(&mut events).await, ChannelEvent::Closed);
	assert!(!handle.is_ready());
	assert!(!handle.send("after close"));
}
