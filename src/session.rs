//! Exchanges signed assertions for provider session tokens.
//!
//! One call is one HTTPS POST: there is no retry here, callers decide whether a
//! [`Error::is_retryable`] failure deserves another attempt.

// std
use std::time::Duration as StdDuration;
// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	auth::{CredentialSigner, SessionToken},
	config::OnrampConfig,
	error::ProtocolError,
	http::{HttpReply, JsonPost, OnrampHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::{Asset, Network},
};

/// Assets requested when the caller does not name any.
pub const DEFAULT_ASSETS: [Asset; 1] = [Asset::Usdc];

#[derive(Debug, Deserialize)]
struct TokenResponse {
	#[serde(default)]
	token: Option<String>,
}

/// Client for the provider token endpoint.
pub struct SessionTokenClient<C>
where
	C: ?Sized + OnrampHttpClient,
{
	http_client: Arc<C>,
	endpoint: Url,
	timeout: StdDuration,
}
impl<C> SessionTokenClient<C>
where
	C: ?Sized + OnrampHttpClient,
{
	/// Creates a client for `endpoint` with the given round-trip timeout.
	pub fn new(http_client: impl Into<Arc<C>>, endpoint: Url, timeout: StdDuration) -> Self {
		Self { http_client: http_client.into(), endpoint, timeout }
	}

	/// Creates a client using the configured endpoint and timeout.
	pub fn from_config(http_client: impl Into<Arc<C>>, config: &OnrampConfig) -> Self {
		Self::new(http_client, config.token_endpoint.clone(), config.request_timeout)
	}

	/// Token endpoint this client posts to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Requests a session token scoped to `wallet_address` on `network` for `assets`.
	///
	/// An empty `assets` slice falls back to [`DEFAULT_ASSETS`].
	pub async fn session_token(
		&self,
		signer: &CredentialSigner,
		wallet_address: &str,
		network: Network,
		assets: &[Asset],
	) -> Result<SessionToken> {
		const KIND: FlowKind = FlowKind::TokenExchange;

		let span = FlowSpan::new(KIND, "session_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let assets = if assets.is_empty() { &DEFAULT_ASSETS[..] } else { assets };
				let assertion = signer.sign("POST", &self.endpoint)?;
				let body = json!({
					"addresses": [{ "address": wallet_address, "blockchains": [network] }],
					"assets": assets,
				});
				let request = JsonPost {
					url: self.endpoint.clone(),
					bearer: assertion.expose().to_owned(),
					body: body.to_string().into_bytes(),
					timeout: self.timeout,
				};
				let reply = self.http_client.post_json(request).await?;

				parse_reply(reply)
			})
			.await;

		// Callers own the flow and log the failure at their level.
		if let Err(e) = &result {
			span.record_inner_error(e);
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}
}
impl<C> Clone for SessionTokenClient<C>
where
	C: ?Sized + OnrampHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			endpoint: self.endpoint.clone(),
			timeout: self.timeout,
		}
	}
}
impl<C> Debug for SessionTokenClient<C>
where
	C: ?Sized + OnrampHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTokenClient")
			.field("endpoint", &self.endpoint.as_str())
			.field("timeout", &self.timeout)
			.finish()
	}
}

fn parse_reply(reply: HttpReply) -> Result<SessionToken> {
	let status = reply.status;

	if !reply.is_success() {
		return Err(Error::Remote { status, body: reply.body_text(), retry_after: reply.retry_after });
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&reply.body);
	let parsed: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ProtocolError::MalformedResponse { source, status })?;

	match parsed.token {
		Some(token) if !token.is_empty() => Ok(SessionToken::new(token)),
		_ => Err(ProtocolError::MissingToken { status }.into()),
	}
}
