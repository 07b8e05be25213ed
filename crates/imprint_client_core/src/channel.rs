#![forbid(unsafe_code)]

//! One realtime socket per session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use imprint_domain::{AttachmentKind, ConversationId};
use imprint_protocol::{InboundFrame, OutboundFrame, decode_inbound_frame, encode_outbound_frame};
use imprint_util::endpoint::resolve_socket_endpoint;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::config::ChatConfig;

/// Shown to the user when the socket reports an error.
pub const SOCKET_ERROR_NOTICE: &str = "There is something went wrong. Please try again in a while";

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Endpoint settings for the realtime socket.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
	/// Base URL used when the token is not itself a socket URL.
	pub websocket_url: Option<String>,
	pub max_frame_bytes: usize,
}

impl From<&ChatConfig> for ChannelConfig {
	fn from(cfg: &ChatConfig) -> Self {
		Self {
			websocket_url: cfg.websocket_url.clone(),
			max_frame_bytes: cfg.max_frame_bytes,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
	/// No socket will be opened (token missing or endpoint unresolvable).
	Unavailable(String),
	/// Transient socket error; carries the user-facing notice.
	TransportError(String),
	Opened,
	Closed,
	Frame(InboundFrame),
}

#[derive(Debug)]
enum ChannelCommand {
	Send(String),
	Close,
}

/// Owner side of an open channel. Dropping it closes the socket.
#[derive(Debug)]
pub struct ChannelHandle {
	conversation_id: ConversationId,
	ready: Arc<AtomicBool>,
	cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
}

pub struct RealtimeChannel;

impl RealtimeChannel {
	/// Fetch a token and open the socket in the background.
	pub fn open(
		backend: Arc<dyn ChatBackend>,
		cfg: ChannelConfig,
		conversation_id: ConversationId,
	) -> (ChannelHandle, mpsc::UnboundedReceiver<ChannelEvent>) {
		let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let ready = Arc::new(AtomicBool::new(false));

		tokio::spawn(run_channel(backend, cfg, Arc::clone(&ready), cmd_rx, events_tx));

		(
			ChannelHandle {
				conversation_id,
				ready,
				cmd_tx,
			},
			events_rx,
		)
	}
}

impl ChannelHandle {
	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::Acquire)
	}

	/// Send a text message. Dropped (returns false) when the socket is not open.
	pub fn send(&self, text: &str) -> bool {
		self.send_frame(OutboundFrame::text(&self.conversation_id, text))
	}

	/// Send an attachment-only message. Dropped (returns false) when the socket is not open.
	pub fn send_attachment(&self, url: &str, kind: AttachmentKind) -> bool {
		self.send_frame(OutboundFrame::attachment(&self.conversation_id, url, kind.as_str()))
	}

	fn send_frame(&self, frame: OutboundFrame) -> bool {
		if !self.is_ready() {
			debug!(conversation_id = %self.conversation_id, "socket not ready; dropping outbound frame");
			metrics::counter!("imprint_realtime_frames_unsent_total").increment(1);
			return false;
		}
		let payload = match encode_outbound_frame(&frame) {
			Ok(p) => p,
			Err(err) => {
				warn!(error = %err, "failed to encode outbound frame");
				return false;
			}
		};
		self.cmd_tx.send(ChannelCommand::Send(payload)).is_ok()
	}

	pub fn close(&self) {
		self.ready.store(false, Ordering::Release);
		let _ = self.cmd_tx.send(ChannelCommand::Close);
	}
}

impl Drop for ChannelHandle {
	fn drop(&mut self) {
		self.close();
	}
}

/// Wait until the owner closes or drops the handle, discarding sends.
async fn closed(cmd_rx: &mut mpsc::UnboundedReceiver<ChannelCommand>) {
	while let Some(cmd) = cmd_rx.recv().await {
		match cmd {
			ChannelCommand::Close => return,
			ChannelCommand::Send(_) => debug!("socket not open; dropping outbound frame"),
		}
	}
}

async fn run_channel(
	backend: Arc<dyn ChatBackend>,
	cfg: ChannelConfig,
	ready: Arc<AtomicBool>,
	mut cmd_rx: mpsc::UnboundedReceiver<ChannelCommand>,
	events_tx: mpsc::UnboundedSender<ChannelEvent>,
) {
	let token = tokio::select! {
		res = backend.get_chat_token() => res,
		_ = closed(&mut cmd_rx) => {
			debug!("channel closed before token arrived");
			return;
		}
	};

	let token = match token {
		Ok(token) => token,
		Err(err) => {
			warn!(error = %err, "chat token request failed");
			let _ = events_tx.send(ChannelEvent::Unavailable(err.to_string()));
			return;
		}
	};

	let url = match resolve_socket_endpoint(&token, cfg.websocket_url.as_deref()) {
		Ok(url) => url,
		Err(err) => {
			info!(error = %err, "realtime channel unavailable");
			let _ = events_tx.send(ChannelEvent::Unavailable(err.to_string()));
			return;
		}
	};

	let connect = tokio::select! {
		res = tokio_tungstenite::connect_async(url.as_str()) => res,
		_ = closed(&mut cmd_rx) => {
			debug!("channel closed while connecting");
			return;
		}
	};

	let mut ws: WsStream = match connect {
		Ok((ws, _)) => ws,
		Err(err) => {
			warn!(error = %err, host = url.host_str().unwrap_or_default(), "chat socket connect failed");
			let _ = events_tx.send(ChannelEvent::TransportError(SOCKET_ERROR_NOTICE.to_string()));
			return;
		}
	};

	ready.store(true, Ordering::Release);
	info!(host = url.host_str().unwrap_or_default(), "chat socket open");
	let _ = events_tx.send(ChannelEvent::Opened);

	loop {
		tokio::select! {
			cmd = cmd_rx.recv() => {
				match cmd {
					Some(ChannelCommand::Send(payload)) => {
						if let Err(err) = ws.send(WsMessage::Text(payload.into())).await {
							warn!(error = %err, "chat socket send failed");
							let _ = events_tx.send(ChannelEvent::TransportError(SOCKET_ERROR_NOTICE.to_string()));
						}
					}
					Some(ChannelCommand::Close) | None => {
						ready.store(false, Ordering::Release);
						if let Err(err) = ws.close(None).await {
							debug!(error = %err, "chat socket close failed");
						}
						break;
					}
				}
			}
			msg = ws.next() => {
				let Some(msg) = msg else {
					info!("chat socket stream ended");
					break;
				};
				match msg {
					Ok(WsMessage::Text(text)) => match decode_inbound_frame(text.as_str(), cfg.max_frame_bytes) {
						Ok(frame) => {
							metrics::counter!("imprint_realtime_frames_received_total").increment(1);
							if events_tx.send(ChannelEvent::Frame(frame)).is_err() {
								break;
							}
						}
						Err(err) => {
							metrics::counter!("imprint_realtime_frames_dropped_total").increment(1);
							warn!(error = %err, "dropping malformed realtime payload");
						}
					},
					Ok(WsMessage::Close(frame)) => {
						info!(?frame, "chat socket closed by server");
						break;
					}
					Ok(_) => {}
					Err(err) => {
						warn!(error = %err, "chat socket error");
						let _ = events_tx.send(ChannelEvent::TransportError(SOCKET_ERROR_NOTICE.to_string()));
						break;
					}
				}
			}
		}
	}

	ready.store(false, Ordering::Release);
	let _ = events_tx.send(ChannelEvent::Closed);
}
