#![forbid(unsafe_code)]

use imprint_domain::{ConversationId, MessageId};
use imprint_protocol::RawMessage;

use crate::error::ChatCoreError;

pub type ChatResult<T> = Result<T, ChatCoreError>;

/// Chat service operations used by a session.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync + 'static {
	/// Short-lived realtime token. May itself be a socket URL.
	async fn get_chat_token(&self) -> ChatResult<String>;

	/// One page of history, newest first. Pages start at 1; an empty page means no more history.
	async fn get_conversation_messages(&self, conversation_id: &ConversationId, page: u32)
	-> ChatResult<Vec<RawMessage>>;

	async fn mark_conversation_read(&self, conversation_id: &ConversationId) -> ChatResult<()>;

	/// Returns the server acknowledgment; only `true` means the message was deleted.
	async fn delete_message(&self, message_id: &MessageId, for_everyone: bool) -> ChatResult<bool>;

	/// Report a message for moderation.
	async fn flag_message(&self, message_id: &MessageId, reason: &str) -> ChatResult<bool>;
}
