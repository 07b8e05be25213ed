#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use imprint_domain::{AttachmentKind, MessageId};
use imprint_protocol::RawMessage;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::controller::{SessionCommand, SessionHandle};
use super::state::ChatSession;
use super::{
	BLOCKED_CHAT_NOTICE, ChannelStatus, DELETE_FAILED_NOTICE, REPORT_FAILED_NOTICE, SessionEvent, SessionParams,
};
use crate::backend::{ChatBackend, ChatResult};
use crate::channel::{ChannelConfig, ChannelEvent, ChannelHandle, RealtimeChannel};
use crate::config::ChatConfig;
use crate::normalize::{normalize_batch, normalize_incoming};
use crate::pagination::PageRequest;

const COMMAND_CAPACITY: usize = 64;

enum Completion {
	Page {
		page: u32,
		fetched_at: DateTime<Utc>,
		result: ChatResult<Vec<RawMessage>>,
	},
	Delete {
		id: MessageId,
		result: ChatResult<bool>,
	},
	Report {
		id: MessageId,
		result: ChatResult<bool>,
	},
	MarkRead(ChatResult<()>),
}

/// Mount a session for one conversation and run it on the current tokio runtime.
///
/// On start the session marks the conversation read, loads page 1 and opens the
/// realtime channel.
pub fn spawn_session(
	backend: Arc<dyn ChatBackend>,
	config: &ChatConfig,
	params: SessionParams,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
	let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
	let (events_tx, events_rx) = mpsc::unbounded_channel();

	let driver = SessionDriver {
		session: ChatSession::new(
			params.conversation_id.clone(),
			config.page_debounce,
			config.near_edge_threshold,
		),
		backend,
		channel_cfg: ChannelConfig::from(config),
		params,
		channel: None,
		requests: JoinSet::new(),
		events_tx,
	};
	tokio::spawn(driver.run(cmd_rx));

	(SessionHandle { cmd_tx }, events_rx)
}

struct SessionDriver {
	session: ChatSession,
	backend: Arc<dyn ChatBackend>,
	channel_cfg: ChannelConfig,
	params: SessionParams,
	channel: Option<ChannelHandle>,
	requests: JoinSet<Completion>,
	events_tx: mpsc::UnboundedSender<SessionEvent>,
}

async fn next_channel_event(rx: &mut Option<mpsc::UnboundedReceiver<ChannelEvent>>) -> Option<ChannelEvent> {
	match rx {
		Some(rx) => rx.recv().await,
		None => std::future::pending().await,
	}
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

impl SessionDriver {
	async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
		let conversation_id = self.session.conversation_id().clone();
		info!(%conversation_id, title = %self.params.display_title(), "chat session mounted");

		self.mark_read();
		let mut channel_rx = Some(self.open_channel());
		if let Some(req) = self.session.paginator_mut().and_then(|p| p.request_next_page()) {
			self.fetch_page(req);
		}

		loop {
			let deadline = self.session.paginator().deadline();
			tokio::select! {
				cmd = cmd_rx.recv() => {
					match cmd {
						None => {
							debug!(%conversation_id, "all session handles dropped");
							break;
						}
						Some(SessionCommand::Unmount) => break,
						Some(SessionCommand::ReopenChannel) => {
							channel_rx = Some(self.open_channel());
						}
						Some(cmd) => self.handle_command(cmd),
					}
				}
				ev = next_channel_event(&mut channel_rx) => {
					match ev {
						Some(ev) => self.handle_channel_event(ev),
						None => channel_rx = None,
					}
				}
				Some(done) = self.requests.join_next(), if !self.requests.is_empty() => {
					match done {
						Ok(completion) => self.handle_completion(completion),
						Err(err) => warn!(error = %err, "chat request task failed"),
					}
				}
				_ = sleep_until_deadline(deadline) => {
					let req = self.session.paginator_mut().and_then(|p| p.poll_due(Instant::now()));
					if let Some(req) = req {
						self.fetch_page(req);
					}
				}
			}
		}

		self.teardown();
		info!(%conversation_id, "chat session unmounted");
	}

	fn emit(&self, event: SessionEvent) {
		let _ = self.events_tx.send(event);
	}

	fn emit_messages(&self) {
		self.emit(SessionEvent::MessagesChanged(self.session.messages().to_vec()));
	}

	fn emit_pagination(&self) {
		self.emit(SessionEvent::PaginationState(self.session.paginator().state()));
	}

	fn open_channel(&mut self) -> mpsc::UnboundedReceiver<ChannelEvent> {
		if let Some(old) = self.channel.take() {
			old.close();
		}
		let (handle, rx) = RealtimeChannel::open(
			Arc::clone(&self.backend),
			self.channel_cfg.clone(),
			self.session.conversation_id().clone(),
		);
		self.channel = Some(handle);
		self.emit(SessionEvent::ChannelState(ChannelStatus::Connecting));
		rx
	}

	fn mark_read(&mut self) {
		let backend = Arc::clone(&self.backend);
		let conversation_id = self.session.conversation_id().clone();
		self.requests.spawn(async move {
			Completion::MarkRead(backend.mark_conversation_read(&conversation_id).await)
		});
	}

	fn fetch_page(&mut self, req: PageRequest) {
		let backend = Arc::clone(&self.backend);
		let conversation_id = self.session.conversation_id().clone();
		self.requests.spawn(async move {
			let result = backend.get_conversation_messages(&conversation_id, req.page).await;
			Completion::Page {
				page: req.page,
				fetched_at: Utc::now(),
				result,
			}
		});
		self.emit_pagination();
	}

	fn handle_command(&mut self, cmd: SessionCommand) {
		match cmd {
			SessionCommand::SendMessage { text } => {
				if self.refuse_if_blocked() || text.trim().is_empty() {
					return;
				}
				if let Some(channel) = &self.channel
					&& !channel.send(&text)
				{
					debug!("message not sent; socket not open");
				}
			}
			SessionCommand::SendGif { url } => {
				if self.refuse_if_blocked() {
					return;
				}
				if let Some(channel) = &self.channel
					&& !channel.send_attachment(&url, AttachmentKind::Gif)
				{
					debug!("gif not sent; socket not open");
				}
			}
			SessionCommand::DeleteMessage { id, for_everyone } => {
				if !self.session.is_active() {
					return;
				}
				let backend = Arc::clone(&self.backend);
				self.requests.spawn(async move {
					let result = backend.delete_message(&id, for_everyone).await;
					Completion::Delete { id, result }
				});
			}
			SessionCommand::ReportMessage { id, reason } => {
				if !self.session.select(id.clone()) {
					debug!(message_id = %id, "reporting message not in the list");
				}
				let backend = Arc::clone(&self.backend);
				self.requests.spawn(async move {
					let result = backend.flag_message(&id, &reason).await;
					Completion::Report { id, result }
				});
			}
			SessionCommand::SelectMessage { id } => {
				self.session.select(id);
			}
			SessionCommand::Scroll { metrics } => {
				if let Some(p) = self.session.paginator_mut() {
					p.on_scroll(metrics, Instant::now());
				}
			}
			SessionCommand::EndReached => {
				if let Some(p) = self.session.paginator_mut() {
					p.on_end_reached(Instant::now());
				}
			}
			SessionCommand::LoadOlder => {
				if let Some(req) = self.session.paginator_mut().and_then(|p| p.request_next_page()) {
					self.fetch_page(req);
				}
			}
			SessionCommand::ReopenChannel | SessionCommand::Unmount => {}
		}
	}

	fn refuse_if_blocked(&self) -> bool {
		if self.params.is_blocked {
			self.emit(SessionEvent::Notice(BLOCKED_CHAT_NOTICE.to_string()));
		}
		self.params.is_blocked
	}

	fn handle_channel_event(&mut self, ev: ChannelEvent) {
		match ev {
			ChannelEvent::Opened => self.emit(SessionEvent::ChannelState(ChannelStatus::Open)),
			ChannelEvent::Closed => self.emit(SessionEvent::ChannelState(ChannelStatus::Closed)),
			ChannelEvent::Unavailable(reason) => {
				debug!(%reason, "realtime channel unavailable");
				self.emit(SessionEvent::ChannelState(ChannelStatus::Unavailable));
			}
			ChannelEvent::TransportError(notice) => self.emit(SessionEvent::Notice(notice)),
			ChannelEvent::Frame(frame) => {
				match normalize_incoming(&frame, &self.params.current_user, &self.params.participants, Utc::now()) {
					Ok(message) => {
						if self.session.prepend_incoming(message) {
							self.emit_messages();
						}
					}
					Err(err) => warn!(error = %err, "dropping realtime frame without usable id"),
				}
			}
		}
	}

	fn handle_completion(&mut self, done: Completion) {
		if !self.session.is_active() {
			return;
		}
		match done {
			Completion::Page {
				page,
				fetched_at,
				result,
			} => {
				let Some(paginator) = self.session.paginator_mut() else {
					return;
				};
				match result {
					Ok(rows) => {
						let fetched = rows.len();
						paginator.complete::<()>(Ok(fetched));
						metrics::counter!("imprint_history_pages_fetched_total").increment(1);
						debug!(page, fetched, "history page loaded");
						if self.session.append_page(normalize_batch(rows, page, fetched_at)) > 0 {
							self.emit_messages();
						}
					}
					Err(err) => {
						warn!(page, error = %err, "history page request failed");
						paginator.complete(Err(err));
					}
				}
				self.emit_pagination();
			}
			Completion::Delete { id, result } => {
				self.session.clear_selection();
				match result {
					Ok(true) => {
						metrics::counter!("imprint_deletes_acknowledged_total").increment(1);
						if self.session.apply_delete_ack(&id) {
							self.emit_messages();
						}
					}
					Ok(false) => {
						info!(message_id = %id, "delete not acknowledged");
						self.emit(SessionEvent::Notice(DELETE_FAILED_NOTICE.to_string()));
					}
					Err(err) => {
						warn!(message_id = %id, error = %err, "delete request failed");
						self.emit(SessionEvent::Notice(DELETE_FAILED_NOTICE.to_string()));
					}
				}
			}
			Completion::Report { id, result } => {
				self.session.clear_selection();
				match result {
					Ok(true) => self.emit(SessionEvent::Reported(id)),
					Ok(false) => self.emit(SessionEvent::Notice(REPORT_FAILED_NOTICE.to_string())),
					Err(err) => {
						warn!(message_id = %id, error = %err, "report request failed");
						self.emit(SessionEvent::Notice(REPORT_FAILED_NOTICE.to_string()));
					}
				}
			}
			Completion::MarkRead(result) => {
				if let Err(err) = result {
					debug!(error = %err, "mark read failed");
				}
			}
		}
	}

	fn teardown(&mut self) {
		self.session.deactivate();
		if let Some(channel) = self.channel.take() {
			channel.close();
		}
		self.requests.abort_all();
	}
}
