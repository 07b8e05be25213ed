#![forbid(unsafe_code)]

use imprint_domain::{Message, UserId};

/// Entries of the long-press menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
	DeleteForMe,
	DeleteForEveryone,
	Delete,
	Report,
	Cancel,
}

impl MessageAction {
	pub const fn label(self) -> &'static str {
		match self {
			MessageAction::DeleteForMe => "Delete for me",
			MessageAction::DeleteForEveryone => "Delete for everyone",
			MessageAction::Delete => "Delete",
			MessageAction::Report => "Report message",
			MessageAction::Cancel => "Cancel",
		}
	}

	/// Scope of a delete action; `None` for non-delete actions.
	pub const fn delete_for_everyone(self) -> Option<bool> {
		match self {
			MessageAction::DeleteForEveryone => Some(true),
			MessageAction::DeleteForMe | MessageAction::Delete => Some(false),
			MessageAction::Report | MessageAction::Cancel => None,
		}
	}
}

const OWN_MESSAGE_ACTIONS: [MessageAction; 3] = [
	MessageAction::DeleteForMe,
	MessageAction::DeleteForEveryone,
	MessageAction::Cancel,
];

const OTHER_MESSAGE_ACTIONS: [MessageAction; 3] =
	[MessageAction::Delete, MessageAction::Report, MessageAction::Cancel];

/// Menu entries for a long-pressed message.
pub fn message_actions(message: &Message, current_user_id: &UserId) -> &'static [MessageAction] {
	if message.is_from(current_user_id) {
		&OWN_MESSAGE_ACTIONS
	} else {
		&OTHER_MESSAGE_ACTIONS
	}
}
