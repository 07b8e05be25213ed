#![forbid(unsafe_code)]

//! Wire rows and realtime frames to UI messages.

use chrono::{DateTime, NaiveDateTime, Utc};
use imprint_domain::{Message, MessageId, ParseIdError, Participant, Sender, UserIdentity};
use imprint_protocol::{InboundFrame, RawMessage};
use tracing::warn;

use crate::gifs::resolve_attachment;

const LEFT_SINGLE_QUOTE: char = '\u{2018}';
const RIGHT_SINGLE_QUOTE: char = '\u{2019}';
const RIGHT_DOUBLE_QUOTE: char = '\u{201D}';

/// Percent-decode, HTML-decode, then keep printable ASCII and three curly quotes.
///
/// Percent-decoding that fails leaves the text as received.
pub fn sanitize_text(raw: &str) -> String {
	let decoded = match urlencoding::decode(raw) {
		Ok(s) => s,
		Err(_) => raw.into(),
	};
	let unescaped = html_escape::decode_html_entities(&decoded);
	unescaped.chars().filter(|c| is_displayable(*c)).collect()
}

fn is_displayable(c: char) -> bool {
	matches!(c, '\x20'..='\x7E' | LEFT_SINGLE_QUOTE | RIGHT_SINGLE_QUOTE | RIGHT_DOUBLE_QUOTE)
}

fn parse_created_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
	let raw = raw?.trim();
	if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
		return Some(dt.with_timezone(&Utc));
	}
	NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
		.ok()
		.map(|naive| naive.and_utc())
}

/// Normalize one history row. Fails when the row has no id.
pub fn normalize_row(row: RawMessage, fetched_at: DateTime<Utc>) -> Result<Message, ParseIdError> {
	let id = MessageId::new(row.id.clone())?;
	Ok(build_message(id, row, fetched_at))
}

fn build_message(id: MessageId, row: RawMessage, fetched_at: DateTime<Utc>) -> Message {
	let image = resolve_attachment(row.attachment_type.as_deref(), row.attachment_url.as_deref());
	let text = row.content.as_deref().map(sanitize_text).unwrap_or_default();
	let created_at = parse_created_at(row.created_at.as_deref()).unwrap_or(fetched_at);

	Message {
		id,
		text,
		created_at,
		sender: Sender {
			id: row.user.id,
			name: row.user.display_name,
			avatar_url: row.user.avatar_url,
		},
		flagged: row.is_flagged,
		image,
	}
}

/// Normalize history page `page`, keeping length and server order.
///
/// Rows without an id get [`MessageId::placeholder`].
pub fn normalize_batch(raw: Vec<RawMessage>, page: u32, fetched_at: DateTime<Utc>) -> Vec<Message> {
	raw.into_iter()
		.enumerate()
		.map(|(index, row)| {
			let id = MessageId::new(row.id.clone()).unwrap_or_else(|_| {
				warn!(page, index, "history row without id, using placeholder");
				metrics::counter!("imprint_history_rows_placeholder_id_total").increment(1);
				MessageId::placeholder(page, index)
			});
			build_message(id, row, fetched_at)
		})
		.collect()
}

/// Normalize a realtime frame.
///
/// The sender is the participant matching `fromUserId`, else the current user
/// (also when `fromUserId` is missing).
pub fn normalize_incoming(
	frame: &InboundFrame,
	current_user: &UserIdentity,
	participants: &[Participant],
	received_at: DateTime<Utc>,
) -> Result<Message, ParseIdError> {
	let id = MessageId::new(frame.message_id.clone())?;
	let sender = participants
		.iter()
		.find(|p| frame.from_user_id.as_deref() == Some(p.id.as_str()))
		.map(Participant::to_sender)
		.unwrap_or_else(|| current_user.to_sender());

	Ok(Message {
		id,
		text: frame.message.as_deref().map(sanitize_text).unwrap_or_default(),
		created_at: received_at,
		sender,
		flagged: None,
		image: resolve_attachment(frame.attachment_type.as_deref(), frame.attachment_url.as_deref()),
	})
}
