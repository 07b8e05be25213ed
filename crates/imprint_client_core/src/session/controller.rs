#![forbid(unsafe_code)]

use imprint_domain::MessageId;
use tokio::sync::mpsc;

use crate::error::ChatCoreError;
use crate::pagination::ScrollMetrics;

#[derive(Debug)]
pub(super) enum SessionCommand {
	SendMessage { text: String },
	SendGif { url: String },
	DeleteMessage { id: MessageId, for_everyone: bool },
	ReportMessage { id: MessageId, reason: String },
	SelectMessage { id: MessageId },
	Scroll { metrics: ScrollMetrics },
	EndReached,
	LoadOlder,
	ReopenChannel,
	Unmount,
}

/// Cloneable handle to a running session. The session tears down on `unmount` or
/// when every handle is dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
	pub(super) cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
	async fn dispatch(&self, cmd: SessionCommand) -> Result<(), ChatCoreError> {
		self.cmd_tx.send(cmd).await.map_err(|_| ChatCoreError::SessionClosed)
	}

	/// Send text over the socket. Dropped when the socket is not open; there is no local echo.
	pub async fn send_message(&self, text: impl Into<String>) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::SendMessage { text: text.into() }).await
	}

	pub async fn send_gif(&self, url: impl Into<String>) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::SendGif { url: url.into() }).await
	}

	/// Ask the server to delete; the list changes only after a truthy acknowledgment.
	pub async fn delete_message(&self, id: MessageId, for_everyone: bool) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::DeleteMessage { id, for_everyone }).await
	}

	pub async fn report_message(&self, id: MessageId, reason: impl Into<String>) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::ReportMessage {
			id,
			reason: reason.into(),
		})
		.await
	}

	pub async fn select_message(&self, id: MessageId) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::SelectMessage { id }).await
	}

	pub async fn scroll(&self, metrics: ScrollMetrics) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::Scroll { metrics }).await
	}

	pub async fn end_reached(&self) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::EndReached).await
	}

	/// Fetch the next older page now, without debounce.
	pub async fn load_older_messages(&self) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::LoadOlder).await
	}

	/// Close any current socket and run token fetch and connect again.
	pub async fn reopen_channel(&self) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::ReopenChannel).await
	}

	pub async fn unmount(&self) -> Result<(), ChatCoreError> {
		self.dispatch(SessionCommand::Unmount).await
	}

	pub fn is_running(&self) -> bool {
		!self.cmd_tx.is_closed()
	}
}
