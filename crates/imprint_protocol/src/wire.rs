#![forbid(unsafe_code)]

use imprint_domain::{AttachmentKind, ConversationId};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Default maximum realtime payload size.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024; // 256 KiB

#[derive(Debug, Error)]
pub enum WireError {
	#[error("frame exceeds maximum size: len={len} max={max}")]
	FrameTooLarge {
		len: usize,
		max: usize,
	},

	#[error("frame is not a JSON-encoded string")]
	NotDoubleEncoded,

	#[error("json decode error: {0}")]
	Decode(#[source] serde_json::Error),

	#[error("json encode error: {0}")]
	Encode(#[source] serde_json::Error),
}

/// Message row as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
	/// Empty when the server sent no usable id.
	#[serde(default, deserialize_with = "string_or_number")]
	pub id: String,
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub created_at: Option<String>,
	/// Moderation marker, passed through as sent.
	#[serde(default)]
	pub is_flagged: Option<serde_json::Value>,
	#[serde(default)]
	pub user: RawUser,
	#[serde(default)]
	pub attachment_type: Option<String>,
	#[serde(default)]
	pub attachment_url: Option<String>,
}

/// Author block of a history row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
	#[serde(default, deserialize_with = "string_or_number")]
	pub id: String,
	#[serde(default, deserialize_with = "nullable_string")]
	pub display_name: String,
	#[serde(default, deserialize_with = "nullable_string")]
	pub avatar_url: String,
}

/// Realtime message pushed by the server (after both decode layers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
	#[serde(default, deserialize_with = "string_or_number")]
	pub message_id: String,
	#[serde(default)]
	pub message: Option<String>,
	/// Absent or `null` when the server did not say who sent it.
	#[serde(default, deserialize_with = "optional_string_or_number")]
	pub from_user_id: Option<String>,
	#[serde(default)]
	pub attachment_type: Option<String>,
	#[serde(default)]
	pub attachment_url: Option<String>,
}

/// Frame sent by the client. Attachment fields always serialize, `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
	#[serde(rename = "attachmentUrl")]
	pub attachment_url: Option<String>,
	#[serde(rename = "attachmentType")]
	pub attachment_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(rename = "conversationID")]
	pub conversation_id: String,
}

impl OutboundFrame {
	/// Plain text message.
	pub fn text(conversation_id: &ConversationId, message: impl Into<String>) -> Self {
		Self {
			attachment_url: None,
			attachment_type: None,
			message: Some(message.into()),
			conversation_id: conversation_id.as_str().to_string(),
		}
	}

	/// Attachment-only message.
	pub fn attachment(conversation_id: &ConversationId, url: impl Into<String>, kind: impl Into<String>) -> Self {
		Self {
			attachment_url: Some(url.into()),
			attachment_type: Some(kind.into()),
			message: None,
			conversation_id: conversation_id.as_str().to_string(),
		}
	}

	/// GIF attachment.
	pub fn gif(conversation_id: &ConversationId, url: impl Into<String>) -> Self {
		Self::attachment(conversation_id, url, AttachmentKind::Gif.as_str())
	}
}

/// Decode a realtime payload: a JSON string whose content is the JSON frame.
pub fn decode_inbound_frame(payload: &str, max_frame_size: usize) -> Result<InboundFrame, WireError> {
	if payload.len() > max_frame_size {
		return Err(WireError::FrameTooLarge {
			len: payload.len(),
			max: max_frame_size,
		});
	}

	let outer: serde_json::Value = serde_json::from_str(payload).map_err(WireError::Decode)?;
	let serde_json::Value::String(inner) = outer else {
		return Err(WireError::NotDoubleEncoded);
	};

	serde_json::from_str(&inner).map_err(WireError::Decode)
}

/// Decode a history page row by row.
///
/// The body must be a JSON array. Rows that are not objects are dropped and
/// counted in the second tuple element.
pub fn decode_history_page(body: &str) -> Result<(Vec<RawMessage>, usize), WireError> {
	let values: Vec<serde_json::Value> = serde_json::from_str(body).map_err(WireError::Decode)?;
	let total = values.len();
	let rows: Vec<RawMessage> = values
		.into_iter()
		.filter_map(|value| serde_json::from_value(value).ok())
		.collect();
	let skipped = total - rows.len();
	Ok((rows, skipped))
}

/// Encode an outbound frame as a single JSON text payload.
pub fn encode_outbound_frame(frame: &OutboundFrame) -> Result<String, WireError> {
	serde_json::to_string(frame).map_err(WireError::Encode)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
	String(String),
	Number(serde_json::Number),
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
		StringOrNumber::String(s) => s,
		StringOrNumber::Number(n) => n.to_string(),
	}))
}

/// `null` decodes to an empty string.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(optional_string_or_number(deserializer)?.unwrap_or_default())
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
