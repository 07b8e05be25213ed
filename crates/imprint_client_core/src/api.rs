#![forbid(unsafe_code)]

//! REST implementation of [`ChatBackend`].

use anyhow::Context as _;
use imprint_domain::{ConversationId, MessageId};
use imprint_protocol::{RawMessage, decode_history_page};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{ChatBackend, ChatResult};
use crate::config::{ChatConfig, SecretString};
use crate::error::ChatCoreError;

const TOKEN_PATH: &str = "/chat/token";
const MESSAGES_PATH: &str = "/chat/messages";
const READ_STATUS_PATH: &str = "/chat/read-status";
const DELETE_MESSAGE_PATH: &str = "/chat/message";
const FLAG_MESSAGE_PATH: &str = "/chat/flag-message";

#[derive(Debug, Clone)]
pub struct ChatApiClient {
	base_url: String,
	access_token: Option<SecretString>,
	client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlagMessageRequest<'a> {
	message_id: &'a str,
	reason: &'a str,
}

impl ChatApiClient {
	pub fn new(config: &ChatConfig) -> Result<Self, ChatCoreError> {
		let client = reqwest::Client::builder()
			.user_agent("imprint/0.x (chat)")
			.timeout(config.request_timeout)
			.build()
			.context("build reqwest client")?;

		Ok(Self {
			base_url: config.api_base_url.clone(),
			access_token: config.access_token.clone(),
			client,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url.trim_end_matches('/'), path)
	}

	fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		match self.access_token.as_ref().map(|t| t.expose().trim()).filter(|t| !t.is_empty()) {
			Some(token) => req.header("Authorization", format!("Bearer {token}")),
			None => req,
		}
	}

	async fn send(&self, req: reqwest::RequestBuilder, what: &'static str) -> ChatResult<String> {
		let resp = self
			.authed(req)
			.send()
			.await
			.map_err(|e| ChatCoreError::Request(format!("{what}: {e}")))?;

		let status = resp.status();
		let body = resp
			.text()
			.await
			.map_err(|e| ChatCoreError::Request(format!("{what} read body: {e}")))?;

		match status {
			StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => {
				debug!(%status, what, "chat api request ok");
				Ok(body)
			}
			status => Err(ChatCoreError::Request(format!("{what} failed: status={status}"))),
		}
	}
}

#[async_trait::async_trait]
impl ChatBackend for ChatApiClient {
	async fn get_chat_token(&self) -> ChatResult<String> {
		let body = self.send(self.client.get(self.url(TOKEN_PATH)), "GET /chat/token").await?;
		Ok(parse_token_body(&body))
	}

	async fn get_conversation_messages(
		&self,
		conversation_id: &ConversationId,
		page: u32,
	) -> ChatResult<Vec<RawMessage>> {
		let url = format!(
			"{}?page={}&convId={}",
			self.url(MESSAGES_PATH),
			page,
			urlencoding::encode(conversation_id.as_str())
		);
		let body = self.send(self.client.get(url), "GET /chat/messages").await?;
		if body.trim().is_empty() {
			return Ok(Vec::new());
		}
		let (rows, skipped) = decode_history_page(&body)
			.context("decode history page")
			.map_err(|e| ChatCoreError::Response(format!("{e:#}")))?;
		if skipped > 0 {
			warn!(page, skipped, "skipping undecodable history rows");
			metrics::counter!("imprint_history_rows_dropped_total").increment(skipped as u64);
		}
		Ok(rows)
	}

	async fn mark_conversation_read(&self, conversation_id: &ConversationId) -> ChatResult<()> {
		let url = format!(
			"{}/{}",
			self.url(READ_STATUS_PATH),
			urlencoding::encode(conversation_id.as_str())
		);
		self.send(self.client.put(url), "PUT /chat/read-status").await?;
		Ok(())
	}

	async fn delete_message(&self, message_id: &MessageId, for_everyone: bool) -> ChatResult<bool> {
		let url = format!(
			"{}?msgId={}&for-all={}",
			self.url(DELETE_MESSAGE_PATH),
			urlencoding::encode(message_id.as_str()),
			for_everyone
		);
		let body = self.send(self.client.delete(url), "DELETE /chat/message").await?;
		Ok(is_truthy_body(&body))
	}

	async fn flag_message(&self, message_id: &MessageId, reason: &str) -> ChatResult<bool> {
		let req = FlagMessageRequest {
			message_id: message_id.as_str(),
			reason,
		};
		let body = self
			.send(self.client.put(self.url(FLAG_MESSAGE_PATH)).json(&req), "PUT /chat/flag-message")
			.await?;
		Ok(is_truthy_body(&body))
	}
}

/// The token endpoint answers with a bare string, a JSON string, or `{"token": ..}` / `{"data": ..}`.
pub fn parse_token_body(body: &str) -> String {
	let body = body.trim();
	match serde_json::from_str::<serde_json::Value>(body) {
		Ok(serde_json::Value::String(s)) => s,
		Ok(serde_json::Value::Object(map)) => ["token", "data"]
			.iter()
			.find_map(|k| map.get(*k).and_then(|v| v.as_str()))
			.map(str::to_string)
			.unwrap_or_default(),
		Ok(_) => String::new(),
		Err(_) => body.to_string(),
	}
}

/// Truthiness of an acknowledgment body. Empty, `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy_body(body: &str) -> bool {
	let body = body.trim();
	if body.is_empty() {
		return false;
	}
	match serde_json::from_str::<serde_json::Value>(body) {
		Ok(serde_json::Value::Null) => false,
		Ok(serde_json::Value::Bool(b)) => b,
		Ok(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
		Ok(serde_json::Value::String(s)) => !s.is_empty(),
		Ok(_) => true,
		Err(_) => true,
	}
}
