#![forbid(unsafe_code)]

pub mod endpoint {
	use thiserror::Error;
	use url::Url;

	/// Query parameter used when the token is not itself a socket URL.
	pub const TOKEN_QUERY_PARAM: &str = "token";

	#[derive(Debug, Error, Clone, PartialEq, Eq)]
	pub enum EndpointError {
		#[error("chat token is empty")]
		EmptyToken,
		#[error("token is not a socket URL and no websocket base URL is configured")]
		MissingBaseUrl,
		#[error("invalid websocket URL (expected ws:// or wss://): {0}")]
		InvalidUrl(String),
	}

	/// Parse a `ws://` / `wss://` URL.
	pub fn parse_socket_url(s: &str) -> Result<Url, EndpointError> {
		let s = s.trim();
		let url = Url::parse(s).map_err(|e| EndpointError::InvalidUrl(format!("{s}: {e}")))?;
		match url.scheme() {
			"ws" | "wss" if url.host_str().is_some() => Ok(url),
			_ => Err(EndpointError::InvalidUrl(s.to_string())),
		}
	}

	/// Validate a configured websocket base URL.
	pub fn validate_socket_url(s: &str) -> Result<(), EndpointError> {
		let _ = parse_socket_url(s)?;
		Ok(())
	}

	/// Resolve the socket address for a chat token.
	///
	/// A token that already is a socket URL is used verbatim. Otherwise the token
	/// is attached to `base` as the `token` query parameter.
	pub fn resolve_socket_endpoint(token: &str, base: Option<&str>) -> Result<Url, EndpointError> {
		let token = token.trim();
		if token.is_empty() {
			return Err(EndpointError::EmptyToken);
		}

		if let Ok(url) = parse_socket_url(token) {
			return Ok(url);
		}

		let base = base.map(str::trim).filter(|b| !b.is_empty()).ok_or(EndpointError::MissingBaseUrl)?;
		let mut url = parse_socket_url(base)?;
		url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
		Ok(url)
	}

}
