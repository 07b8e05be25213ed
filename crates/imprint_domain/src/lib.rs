#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder text shown in place of a deleted message.
pub const DELETED_MESSAGE_TEXT: &str = "This message was deleted";

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("unknown attachment type: {0}")]
	UnknownAttachmentType(String),
}

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Create a non-empty id.
			pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
				let id = id.into();
				if id.trim().is_empty() {
					return Err(ParseIdError::Empty);
				}
				Ok(Self(id))
			}
			pub fn as_str(&self) -> &str {
				&self.0
			}
			pub fn into_string(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl FromStr for $name {
			type Err = ParseIdError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				$name::new(s.to_string())
			}
		}
	};
}

string_id!(
	/// Server-assigned conversation identifier.
	ConversationId
);

string_id!(
	/// Server-assigned message identifier, unique within a conversation.
	MessageId
);

string_id!(
	/// User identifier.
	UserId
);

impl MessageId {
	/// Stand-in for a history row that arrived without an id, stable per page and position.
	pub fn placeholder(page: u32, index: usize) -> Self {
		Self(format!("page{page}-{index}"))
	}
}

/// Attachment kinds understood by the chat UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentKind {
	#[serde(rename = "GIF")]
	Gif,
}

impl AttachmentKind {
	/// Wire marker for this attachment kind.
	pub const fn as_str(self) -> &'static str {
		match self {
			AttachmentKind::Gif => "GIF",
		}
	}
}

impl fmt::Display for AttachmentKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AttachmentKind {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}
		match s {
			"GIF" => Ok(AttachmentKind::Gif),
			other => Err(ParseIdError::UnknownAttachmentType(other.to_string())),
		}
	}
}

/// Renderable author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
	pub id: String,
	pub name: String,
	pub avatar_url: String,
}

/// UI-normalized chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub id: MessageId,

	/// Sanitized display text.
	pub text: String,

	pub created_at: DateTime<Utc>,

	pub sender: Sender,

	/// Moderation marker as reported by the server, opaque to the client.
	pub flagged: Option<serde_json::Value>,

	/// Resolved attachment URI.
	pub image: Option<String>,
}

impl Message {
	/// Replace the content with the deleted placeholder, keeping id and position.
	pub fn mark_deleted(&mut self) {
		self.text = DELETED_MESSAGE_TEXT.to_string();
		self.image = None;
	}

	pub fn is_deleted(&self) -> bool {
		self.text == DELETED_MESSAGE_TEXT && self.image.is_none()
	}

	pub fn is_from(&self, user_id: &UserId) -> bool {
		self.sender.id == user_id.as_str()
	}
}

/// Conversation participant, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
	pub id: UserId,
	pub display_name: String,
	pub avatar_url: String,
	#[serde(default)]
	pub user_name: Option<String>,
	/// The current user blocked this participant.
	#[serde(default)]
	pub blocked: bool,
	/// This participant blocked the current user.
	#[serde(default)]
	pub blocks_me: bool,
}

impl Participant {
	pub fn to_sender(&self) -> Sender {
		Sender {
			id: self.id.as_str().to_string(),
			name: self.display_name.clone(),
			avatar_url: self.avatar_url.clone(),
		}
	}
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
	pub id: UserId,
	pub display_name: String,
	pub avatar_url: String,
}

impl UserIdentity {
	pub fn to_sender(&self) -> Sender {
		Sender {
			id: self.id.as_str().to_string(),
			name: self.display_name.clone(),
			avatar_url: self.avatar_url.clone(),
		}
	}
}

/// Title for a conversation: the explicit title, else up to two participant user names.
pub fn chat_title(explicit: Option<&str>, participants: &[Participant]) -> String {
	if let Some(title) = explicit {
		return title.to_string();
	}
	participants
		.iter()
		.take(2)
		.filter_map(|p| p.user_name.as_deref())
		.filter(|name| !name.trim().is_empty())
		.collect::<Vec<_>>()
		.join(", ")
}
