#![forbid(unsafe_code)]

//! Client-side chat session core: history pagination, realtime merge and
//! acknowledgment-gated deletes for one conversation at a time.

pub mod api;
pub mod backend;
pub mod channel;
pub mod config;
pub mod error;
pub mod gifs;
pub mod normalize;
pub mod pagination;
pub mod session;

pub use api::ChatApiClient;
pub use backend::{ChatBackend, ChatResult};
pub use channel::{ChannelConfig, ChannelEvent, ChannelHandle, RealtimeChannel, SOCKET_ERROR_NOTICE};
pub use config::{ChatConfig, SecretString, default_config_path, load_chat_config, load_chat_config_from_path};
pub use error::ChatCoreError;
pub use gifs::{GifAsset, available_gifs, resolve_attachment};
pub use normalize::{normalize_batch, normalize_incoming, sanitize_text};
pub use pagination::{PageRequest, PageState, Paginator, ScrollMetrics};
pub use session::{
	ChannelStatus, ChatSession, MessageAction, SessionEvent, SessionHandle, SessionParams, message_actions,
	spawn_session,
};
