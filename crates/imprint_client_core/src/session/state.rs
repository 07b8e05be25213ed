#![forbid(unsafe_code)]

use std::time::Duration;

use imprint_domain::{ConversationId, Message, MessageId};
use tracing::debug;

use crate::pagination::Paginator;

/// Message list and pagination state for one mounted conversation.
///
/// The list is newest-first and ids are unique within it. Once deactivated,
/// every mutation is refused so results arriving after teardown are dropped.
#[derive(Debug)]
pub struct ChatSession {
	conversation_id: ConversationId,
	messages: Vec<Message>,
	paginator: Paginator,
	selected: Option<MessageId>,
	active: bool,
}

impl ChatSession {
	pub fn new(conversation_id: ConversationId, page_debounce: Duration, near_edge_threshold: f64) -> Self {
		Self {
			conversation_id,
			messages: Vec::new(),
			paginator: Paginator::new(page_debounce, near_edge_threshold),
			selected: None,
			active: true,
		}
	}

	pub fn conversation_id(&self) -> &ConversationId {
		&self.conversation_id
	}

	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	pub fn is_active(&self) -> bool {
		self.active
	}

	pub fn paginator(&self) -> &Paginator {
		&self.paginator
	}

	/// Mutable paginator access; `None` once the session is inactive.
	pub fn paginator_mut(&mut self) -> Option<&mut Paginator> {
		self.active.then_some(&mut self.paginator)
	}

	fn contains(&self, id: &MessageId) -> bool {
		self.messages.iter().any(|m| &m.id == id)
	}

	/// Put a realtime message at the head of the list.
	pub fn prepend_incoming(&mut self, message: Message) -> bool {
		if !self.active {
			return false;
		}
		if self.contains(&message.id) {
			debug!(message_id = %message.id, "ignoring duplicate realtime message");
			return false;
		}
		self.messages.insert(0, message);
		true
	}

	/// Append an older page at the tail. Returns how many messages were added.
	pub fn append_page(&mut self, page: Vec<Message>) -> usize {
		if !self.active {
			return 0;
		}
		let before = self.messages.len();
		for message in page {
			if self.contains(&message.id) {
				debug!(message_id = %message.id, "ignoring duplicate history message");
				continue;
			}
			self.messages.push(message);
		}
		self.messages.len() - before
	}

	/// Replace a message with the deleted placeholder after the server acknowledged it.
	pub fn apply_delete_ack(&mut self, id: &MessageId) -> bool {
		if !self.active {
			return false;
		}
		match self.messages.iter_mut().find(|m| &m.id == id) {
			Some(message) => {
				message.mark_deleted();
				true
			}
			None => false,
		}
	}

	/// Remember the message targeted by a long-press.
	pub fn select(&mut self, id: MessageId) -> bool {
		if !self.active || !self.contains(&id) {
			return false;
		}
		self.selected = Some(id);
		true
	}

	pub fn selected(&self) -> Option<&MessageId> {
		self.selected.as_ref()
	}

	pub fn clear_selection(&mut self) {
		self.selected = None;
	}

	pub fn deactivate(&mut self) {
		self.active = false;
		self.selected = None;
		self.paginator.close();
	}
}
