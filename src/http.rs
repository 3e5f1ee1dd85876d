//! Transport primitives for the provider token exchange.
//!
//! [`OnrampHttpClient`] is the crate's only dependency on an HTTP stack. The session client hands
//! it a fully-formed [`JsonPost`] and expects back the raw [`HttpReply`]; status classification
//! and JSON parsing stay in [`crate::session`] so custom transports only move bytes.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
use std::time::Duration as StdDuration;
// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`OnrampHttpClient::post_json`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of issuing the token exchange.
///
/// Implementations must be `Send + Sync + 'static` so one instance can be shared by every request
/// handler, and must honor [`JsonPost::timeout`] by failing with [`TransportError::Timeout`].
pub trait OnrampHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Sends one authenticated JSON POST. Non-success statuses are not errors at this layer.
	fn post_json(&self, request: JsonPost) -> HttpFuture<'_>;
}

/// Authenticated JSON POST request.
#[derive(Clone)]
pub struct JsonPost {
	/// Target URL.
	pub url: Url,
	/// Bearer credential placed in the `Authorization` header.
	pub bearer: String,
	/// Serialized JSON body.
	pub body: Vec<u8>,
	/// Upper bound for the whole round trip.
	pub timeout: StdDuration,
}
impl Debug for JsonPost {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JsonPost")
			.field("url", &self.url.as_str())
			.field("bearer", &"<redacted>")
			.field("body_len", &self.body.len())
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Raw provider response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpReply {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The token endpoint answers directly; configure any custom [`ReqwestClient`] to disable
/// redirect following.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl OnrampHttpClient for ReqwestHttpClient {
	fn post_json(&self, request: JsonPost) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client
				.post(request.url)
				.header(AUTHORIZATION, format!("Bearer {}", request.bearer))
				.header(CONTENT_TYPE, "application/json")
				.timeout(request.timeout)
				.body(request.body)
				.send()
				.await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(HttpReply { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
