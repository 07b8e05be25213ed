#![forbid(unsafe_code)]

use imprint_domain::ParseIdError;
use imprint_protocol::WireError;
use imprint_util::endpoint::EndpointError;

/// Errors for chat core operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatCoreError {
	/// REST request failed (transport or non-success status).
	#[error("request failed: {0}")]
	Request(String),

	/// Server answered with an unexpected body.
	#[error("unexpected response: {0}")]
	Response(String),

	/// Realtime endpoint could not be resolved.
	#[error(transparent)]
	Endpoint(#[from] EndpointError),

	/// Realtime payload error.
	#[error(transparent)]
	Wire(#[from] WireError),

	/// Invalid identifier.
	#[error(transparent)]
	InvalidId(#[from] ParseIdError),

	/// Websocket connect/IO error.
	#[error("socket error: {0}")]
	Socket(String),

	/// The session task is no longer running.
	#[error("chat session is closed")]
	SessionClosed,

	/// Configuration error.
	#[error("config error: {0}")]
	Config(String),

	/// Other error.
	#[error("error: {0}")]
	Other(String),
}

impl From<anyhow::Error> for ChatCoreError {
	fn from(e: anyhow::Error) -> Self {
		ChatCoreError::Other(format!("{e:#}"))
	}
}
