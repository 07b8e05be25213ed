#![forbid(unsafe_code)]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use imprint_protocol::DEFAULT_MAX_FRAME_SIZE;
use imprint_util::endpoint::validate_socket_url;
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_API_BASE_URL: &str = "https://sigma.imprint.live/backend";
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://sigma.imprint.live/ws";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PAGE_DEBOUNCE: Duration = Duration::from_millis(300);
/// Pixels from the oldest edge that still count as "near".
pub const DEFAULT_NEAR_EDGE_THRESHOLD: f64 = 20.0;

/// Default config path: `~/.imprint/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".imprint").join("config.toml"))
}

/// Load the chat config from TOML and env overrides.
pub fn load_chat_config() -> anyhow::Result<ChatConfig> {
	let path = default_config_path()?;
	load_chat_config_from_path(&path)
}

/// Same as `load_chat_config` but with an explicit config path.
pub fn load_chat_config_from_path(path: &Path) -> anyhow::Result<ChatConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ChatConfig::from_file(file_cfg);
	apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
	Ok(cfg)
}

/// Parse a config from TOML text, without env overrides.
pub fn parse_chat_config(s: &str) -> anyhow::Result<ChatConfig> {
	let file: FileConfig = toml::from_str(s).context("parse TOML")?;
	Ok(ChatConfig::from_file(file))
}

/// Wrapper that redacts in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
	pub fn new(s: impl Into<String>) -> Self {
		Self(s.into())
	}

	/// Access the inner secret string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretString(<redacted>)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<redacted>")
	}
}

/// Chat client config.
#[derive(Debug, Clone)]
pub struct ChatConfig {
	/// REST API base URL.
	pub api_base_url: String,
	/// Websocket base URL used when the chat token is not itself a URL.
	pub websocket_url: Option<String>,
	/// Bearer token for REST calls.
	pub access_token: Option<SecretString>,
	/// Per-request timeout.
	pub request_timeout: Duration,
	/// Scroll trigger debounce window.
	pub page_debounce: Duration,
	pub near_edge_threshold: f64,
	/// Maximum inbound realtime payload.
	pub max_frame_bytes: usize,
}

impl Default for ChatConfig {
	fn default() -> Self {
		Self {
			api_base_url: DEFAULT_API_BASE_URL.to_string(),
			websocket_url: Some(DEFAULT_WEBSOCKET_URL.to_string()),
			access_token: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			page_debounce: DEFAULT_PAGE_DEBOUNCE,
			near_edge_threshold: DEFAULT_NEAR_EDGE_THRESHOLD,
			max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	access_token: Option<String>,

	#[serde(default)]
	api: FileApiSettings,

	#[serde(default)]
	chat: FileChatSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileApiSettings {
	base_url: Option<String>,
	websocket_url: Option<String>,
	request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileChatSettings {
	page_debounce_ms: Option<u64>,
	near_edge_threshold_px: Option<f64>,
	max_frame_bytes: Option<usize>,
}

impl ChatConfig {
	fn from_file(file: FileConfig) -> Self {
		let defaults = Self::default();

		let websocket_url = match file.api.websocket_url.filter(|s| !s.trim().is_empty()) {
			Some(url) => match validate_socket_url(&url) {
				Ok(()) => Some(url),
				Err(err) => {
					warn!(error = %err, "ignoring invalid websocket_url from config");
					defaults.websocket_url.clone()
				}
			},
			None => defaults.websocket_url.clone(),
		};

		Self {
			api_base_url: file
				.api
				.base_url
				.filter(|s| !s.trim().is_empty())
				.unwrap_or(defaults.api_base_url),
			websocket_url,
			access_token: file.access_token.filter(|s| !s.trim().is_empty()).map(SecretString::new),
			request_timeout: file
				.api
				.request_timeout_ms
				.filter(|v| *v > 0)
				.map(Duration::from_millis)
				.unwrap_or(defaults.request_timeout),
			page_debounce: file
				.chat
				.page_debounce_ms
				.map(Duration::from_millis)
				.unwrap_or(defaults.page_debounce),
			near_edge_threshold: file
				.chat
				.near_edge_threshold_px
				.filter(|v| v.is_finite() && *v >= 0.0)
				.unwrap_or(defaults.near_edge_threshold),
			max_frame_bytes: file
				.chat
				.max_frame_bytes
				.filter(|v| *v > 0)
				.unwrap_or(defaults.max_frame_bytes),
		}
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

/// Apply `IMPRINT_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides(cfg: &mut ChatConfig, lookup: impl Fn(&str) -> Option<String>) {
	let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

	if let Some(v) = non_empty("IMPRINT_API_BASE_URL") {
		cfg.api_base_url = v;
		info!("chat config: api_base_url overridden by env");
	}

	if let Some(v) = non_empty("IMPRINT_WEBSOCKET_URL") {
		match validate_socket_url(&v) {
			Ok(()) => {
				cfg.websocket_url = Some(v);
				info!("chat config: websocket_url overridden by env");
			}
			Err(err) => warn!(error = %err, "ignoring invalid IMPRINT_WEBSOCKET_URL"),
		}
	}

	if let Some(v) = non_empty("IMPRINT_ACCESS_TOKEN") {
		cfg.access_token = Some(SecretString::new(v));
		info!("chat auth: access_token overridden by env");
	}

	if let Some(v) = non_empty("IMPRINT_REQUEST_TIMEOUT_MS")
		&& let Ok(ms) = v.parse::<u64>()
		&& ms > 0
	{
		cfg.request_timeout = Duration::from_millis(ms);
		info!(ms, "chat config: request_timeout overridden by env");
	}

	if let Some(v) = non_empty("IMPRINT_PAGE_DEBOUNCE_MS")
		&& let Ok(ms) = v.parse::<u64>()
	{
		cfg.page_debounce = Duration::from_millis(ms);
		info!(ms, "chat config: page_debounce overridden by env");
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	#[test]
	fn empty_file_yields_defaults() {
		let cfg = parse_chat_config("").unwrap();
		assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
		assert_eq!(cfg.websocket_url.as_deref(), Some(DEFAULT_WEBSOCKET_URL));
		assert!(cfg.access_token.is_none());
		assert_eq!(cfg.request_timeout, DEFAULT_REQUEST_TIMEOUT);
		assert_eq!(cfg.page_debounce, Duration::from_millis(300));
		assert_eq!(cfg.near_edge_threshold, 20.0);
	}

	#[test]
	fn file_values_are_applied() {
		let cfg = parse_chat_config(
			r#"
access_token = "tok"

[api]
base_url = "https://api.example.com"
websocket_url = "wss://ws.example.com/chat"
request_timeout_ms = 5000

[chat]
page_debounce_ms = 150
near_edge_threshold_px = 40.0
"#,
		)
		.unwrap();

		assert_eq!(cfg.api_base_url, "https://api.example.com");
		assert_eq!(cfg.websocket_url.as_deref(), Some("wss://ws.example.com/chat"));
		assert_eq!(cfg.access_token.as_ref().map(SecretString::expose), Some("tok"));
		assert_eq!(cfg.request_timeout, Duration::from_secs(5));
		assert_eq!(cfg.page_debounce, Duration::from_millis(150));
		assert_eq!(cfg.near_edge_threshold, 40.0);
	}

	#[test]
	fn invalid_websocket_url_falls_back_to_default() {
		let cfg = parse_chat_config("[api]\nwebsocket_url = \"https://not-a-socket\"\n").unwrap();
		assert_eq!(cfg.websocket_url.as_deref(), Some(DEFAULT_WEBSOCKET_URL));
	}

	#[test]
	fn env_overrides_win_and_ignore_garbage() {
		let env: HashMap<&str, &str> = HashMap::from([
			("IMPRINT_API_BASE_URL", " https://env.example.com "),
			("IMPRINT_ACCESS_TOKEN", "env-token"),
			("IMPRINT_REQUEST_TIMEOUT_MS", "not-a-number"),
			("IMPRINT_WEBSOCKET_URL", "ftp://nope"),
			("IMPRINT_PAGE_DEBOUNCE_MS", "0"),
		]);
		let mut cfg = ChatConfig::default();
		apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string()));

		assert_eq!(cfg.api_base_url, "https://env.example.com");
		assert_eq!(cfg.access_token.as_ref().map(SecretString::expose), Some("env-token"));
		assert_eq!(cfg.request_timeout, DEFAULT_REQUEST_TIMEOUT);
		assert_eq!(cfg.websocket_url.as_deref(), Some(DEFAULT_WEBSOCKET_URL));
		assert_eq!(cfg.page_debounce, Duration::ZERO);
	}

	#[test]
	fn missing_file_is_not_an_error() {
		let dir = tempfile::tempdir().unwrap();
		assert!(load_chat_config_from_path(&dir.path().join("config.toml")).is_ok());
	}

	#[test]
	fn broken_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		fs::write(&path, "[api\nbase_url = 1").unwrap();
		let err = load_chat_config_from_path(&path).unwrap_err();
		assert!(format!("{err:#}").contains("parse TOML"));
	}

	#[test]
	fn secret_is_redacted() {
		let s = SecretString::new("hunter2");
		assert_eq!(format!("{s}"), "<redacted>");
		assert!(!format!("{s:?}").contains("hunter2"));
	}
}
