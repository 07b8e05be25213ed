#![forbid(unsafe_code)]

//! Session controller: composes the channel, paginator and normalizer around one message list.

mod actions;
mod controller;
mod driver;
mod state;

use imprint_domain::{ConversationId, Message, MessageId, Participant, UserIdentity, chat_title};

pub use actions::{MessageAction, message_actions};
pub use controller::SessionHandle;
pub use driver::spawn_session;
pub use state::ChatSession;

use crate::pagination::PageState;

/// Refusal shown when the conversation is blocked in either direction.
pub const BLOCKED_CHAT_NOTICE: &str = "Please unblock this user or their messages to start the conversation.";
pub const DELETE_FAILED_NOTICE: &str = "Message could not be deleted";
pub const REPORT_FAILED_NOTICE: &str = "Message could not be reported";

/// Everything a session needs from its caller.
#[derive(Debug, Clone)]
pub struct SessionParams {
	pub conversation_id: ConversationId,
	pub current_user: UserIdentity,
	pub participants: Vec<Participant>,
	/// Sends are refused while true.
	pub is_blocked: bool,
	pub title: Option<String>,
}

impl SessionParams {
	pub fn new(conversation_id: ConversationId, current_user: UserIdentity, participants: Vec<Participant>) -> Self {
		let is_blocked = participants.iter().any(|p| p.blocked || p.blocks_me);
		Self {
			conversation_id,
			current_user,
			participants,
			is_blocked,
			title: None,
		}
	}

	pub fn display_title(&self) -> String {
		chat_title(self.title.as_deref(), &self.participants)
	}
}

/// Socket state as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
	Connecting,
	Open,
	Closed,
	/// No socket for this session (missing token or endpoint).
	Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	/// Full list snapshot after a mutation, newest first.
	MessagesChanged(Vec<Message>),
	/// Transient user-facing message.
	Notice(String),
	ChannelState(ChannelStatus),
	PaginationState(PageState),
	/// The server accepted a report for this message.
	Reported(MessageId),
}
