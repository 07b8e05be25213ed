#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use imprint_client_core::{ChatBackend, ChatCoreError, ChatResult, SessionEvent};
use imprint_domain::{ConversationId, MessageId, Participant, UserId, UserIdentity};
use imprint_protocol::{RawMessage, RawUser};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub const WAIT: Duration = Duration::from_secs(5);

/// In-memory backend driven by a script.
#[derive(Default)]
pub struct ScriptedBackend {
	pub token: Mutex<Option<String>>,
	pub pages: Mutex<VecDeque<Result<Vec<RawMessage>, String>>>,
	pub page_delay: Mutex<Option<Duration>>,
	pub page_calls: Mutex<Vec<u32>>,
	pub delete_ack: Mutex<Option<bool>>,
	pub delete_calls: Mutex<Vec<(String, bool)>>,
	pub flag_calls: Mutex<Vec<(String, String)>>,
	pub mark_read_calls: AtomicUsize,
}

impl ScriptedBackend {
	pub fn with_token(token: &str) -> Self {
		let backend = Self::default();
		*backend.token.lock().unwrap() = Some(token.to_string());
		backend
	}

	pub fn push_page(&self, ids: &[&str]) {
		self.pages
			.lock()
			.unwrap()
			.push_back(Ok(ids.iter().map(|id| raw(id)).collect()));
	}

	pub fn push_page_error(&self, reason: &str) {
		self.pages.lock().unwrap().push_back(Err(reason.to_string()));
	}

	pub fn set_delete_ack(&self, ack: Option<bool>) {
		*self.delete_ack.lock().unwrap() = ack;
	}

	pub fn page_calls(&self) -> Vec<u32> {
		self.page_calls.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
	async fn get_chat_token(&self) -> ChatResult<String> {
		self.token
			.lock()
			.unwrap()
			.clone()
			.ok_or_else(|| ChatCoreError::Request("token endpoint down".to_string()))
	}

	async fn get_conversation_messages(&self, _: &ConversationId, page: u32) -> ChatResult<Vec<RawMessage>> {
		self.page_calls.lock().unwrap().push(page);
		let delay = *self.page_delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		let next = self.pages.lock().unwrap().pop_front();
		match next {
			Some(Ok(rows)) => Ok(rows),
			Some(Err(reason)) => Err(ChatCoreError::Request(reason)),
			None => Ok(Vec::new()),
		}
	}

	async fn mark_conversation_read(&self, _: &ConversationId) -> ChatResult<()> {
		self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
		Err(ChatCoreError::Request("read status ignored".to_string()))
	}

	async fn delete_message(&self, message_id: &MessageId, for_everyone: bool) -> ChatResult<bool> {
		self.delete_calls
			.lock()
			.unwrap()
			.push((message_id.to_string(), for_everyone));
		let ack = *self.delete_ack.lock().unwrap();
		ack.ok_or_else(|| ChatCoreError::Request("delete failed".to_string()))
	}

	async fn flag_message(&self, message_id: &MessageId, reason: &str) -> ChatResult<bool> {
		self.flag_calls
			.lock()
			.unwrap()
			.push((message_id.to_string(), reason.to_string()));
		Ok(true)
	}
}

pub fn raw(id: &str) -> RawMessage {
	RawMessage {
		id: id.to_string(),
		content: Some(format!("text {id}")),
		created_at: Some("2024-05-01T10:00:00Z".to_string()),
		is_flagged: None,
		user: RawUser {
			id: "u2".to_string(),
			display_name: "Friend".to_string(),
			avatar_url: String::new(),
		},
		attachment_type: None,
		attachment_url: None,
	}
}

pub fn conversation() -> ConversationId {
	ConversationId::new("conv-1").unwrap()
}

pub fn me() -> UserIdentity {
	UserIdentity {
		id: UserId::new("me").unwrap(),
		display_name: "Me".to_string(),
		avatar_url: "https://cdn.example.com/me.png".to_string(),
	}
}

pub fn friend() -> Participant {
	Participant {
		id: UserId::new("u2").unwrap(),
		display_name: "Friend".to_string(),
		avatar_url: String::new(),
		user_name: Some("friend".to_string()),
		blocked: false,
		blocks_me: false,
	}
}

/// Realtime payload as the server sends it: a JSON string holding the JSON frame.
pub fn double_encoded(frame: serde_json::Value) -> String {
	let inner = serde_json::to_string(&frame).unwrap();
	serde_json::to_string(&inner).unwrap()
}

/// Single-connection websocket server on localhost.
pub struct TestSocketServer {
	pub url: String,
	/// Text frames received from the client.
	pub received: mpsc::UnboundedReceiver<String>,
	/// Text frames to push to the client. Dropping it closes the connection.
	pub push: mpsc::UnboundedSender<String>,
	/// Fires when the client side of the connection has ended.
	pub client_gone: mpsc::UnboundedReceiver<()>,
}

pub async fn spawn_socket_server() -> TestSocketServer {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let (received_tx, received) = mpsc::unbounded_channel();
	let (push, mut push_rx) = mpsc::unbounded_channel::<String>();
	let (gone_tx, client_gone) = mpsc::unbounded_channel();

	tokio::spawn(async move {
		let Ok((stream, _)) = listener.accept().await else {
			return;
		};
		let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
			return;
		};
		loop {
			tokio::select! {
				out = push_rx.recv() => {
					match out {
						Some(text) => {
							if ws.send(WsMessage::Text(text.into())).await.is_err() {
								break;
							}
						}
						None => {
							let _ = ws.close(None).await;
							break;
						}
					}
				}
				msg = ws.next() => {
					match msg {
						Some(Ok(WsMessage::Text(text))) => {
							let _ = received_tx.send(text.as_str().to_string());
						}
						Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
						Some(Ok(_)) => {}
					}
				}
			}
		}
		let _ = gone_tx.send(());
	});

	TestSocketServer {
		url: format!("ws://{addr}/ws"),
		received,
		push,
		client_gone,
	}
}

/// Wait for the first event that `f` maps to `Some`.
pub async fn wait_for<T>(
	rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
	mut f: impl FnMut(&SessionEvent) -> Option<T>,
) -> T {
	tokio::time::timeout(WAIT, async {
		loop {
			let ev = rx.recv().await.expect("session event stream closed");
			if let Some(v) = f(&ev) {
				return v;
			}
		}
	})
	.await
	.expect("timed out waiting for session event")
}

pub fn ids(messages: &[imprint_domain::Message]) -> Vec<&str> {
	messages.iter().map(|m| m.id.as_str()).collect()
}
