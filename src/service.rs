//! Onramp session orchestration.
//!
//! [`OnrampService`] owns everything a request handler needs: validated configuration, the
//! transport, the shared limiter, and the audit log. Cloning the service is cheap and every clone
//! observes the same budgets and log.
//!
//! Both flows admit a request under a per-client guard: the rate check, the spend check, and the
//! record step run back to back, so concurrent requests from one client cannot both pass a check
//! that only one of them should pass. The guard is released before the token exchange, and the
//! recorded spend stays counted even when a later step fails.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	audit::{AuditLog, SessionLogEntry},
	auth::{ClientId, CredentialSigner, SessionId},
	config::OnrampConfig,
	error::ConfigError,
	http::OnrampHttpClient,
	limit::RateLimiter,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	redirect,
	request::{OnrampRequest, ValidatedRequest},
	session::SessionTokenClient,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Service specialized for the crate's default reqwest transport.
pub type ReqwestOnrampService = OnrampService<ReqwestHttpClient>;

/// Result of a successful flow.
#[derive(Clone)]
pub struct OnrampSession {
	/// Identifier recorded in the audit log.
	pub session_id: SessionId,
	/// Hosted purchase page the user should be sent to.
	pub url: Url,
	/// Purchase parameters that were admitted.
	pub request: ValidatedRequest,
}
impl Debug for OnrampSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// The URL may embed a session token.
		f.debug_struct("OnrampSession")
			.field("session_id", &self.session_id)
			.field("url", &"<redacted>")
			.field("request", &self.request)
			.finish()
	}
}

/// Coordinates validation, budgets, credential signing, token exchange, and redirect assembly.
///
/// Admission guards exist only while a client has an admission in flight, so the guard map stays
/// bounded by concurrency. Per-client limiter records are kept for the life of the store.
pub struct OnrampService<C>
where
	C: ?Sized + OnrampHttpClient,
{
	config: Arc<OnrampConfig>,
	limiter: RateLimiter,
	audit: Arc<AuditLog>,
	session_client: SessionTokenClient<C>,
	admission_guards: Arc<Mutex<HashMap<ClientId, Arc<AsyncMutex<()>>>>>,
}
impl<C> OnrampService<C>
where
	C: ?Sized + OnrampHttpClient,
{
	/// Creates a service that reuses the caller-provided transport.
	///
	/// The limiter starts with an in-memory store seeded from `config.limits`.
	pub fn with_http_client(config: OnrampConfig, http_client: impl Into<Arc<C>>) -> Self {
		let session_client = SessionTokenClient::from_config(http_client, &config);
		let limiter = RateLimiter::new(config.limits.clone());

		Self {
			config: Arc::new(config),
			limiter,
			audit: Default::default(),
			session_client,
			admission_guards: Default::default(),
		}
	}

	/// Replaces the limiter, e.g. to share one store between several services.
	pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
		self.limiter = limiter;

		self
	}

	/// Replaces the audit log.
	pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
		self.audit = audit;

		self
	}

	/// Configuration the service was built with.
	pub fn config(&self) -> &OnrampConfig {
		&self.config
	}

	/// Limiter enforcing the per-client budgets.
	pub fn limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	/// Log of completed sessions.
	pub fn audit_log(&self) -> &AuditLog {
		&self.audit
	}

	/// Runs the session-token flow and returns the redirect for `request`.
	///
	/// Order: validate, build the signer, admit (check rate, check spend, record), exchange the
	/// signed assertion for a session token, build the redirect, append to the audit log.
	pub async fn start_session(
		&self,
		client: &ClientId,
		request: &OnrampRequest,
	) -> Result<OnrampSession> {
		const KIND: FlowKind = FlowKind::Session;

		let span = FlowSpan::new(KIND, "start_session");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let purchase = request.validate(self.config.max_amount_per_tx)?;
				let signer = CredentialSigner::from_config(&self.config)?;

				self.admit(client, &purchase).await?;
				span.record_stage("admitted");

				let token = self
					.session_client
					.session_token(
						&signer,
						&purchase.wallet_address,
						purchase.network,
						&[purchase.asset],
					)
					.await?;
				let url = redirect::session_url(&self.config.pay_url, &token, &purchase);

				Ok(self.complete(client, purchase, url))
			})
			.await;

		if let Err(e) = &result {
			span.record_error(e);
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Runs the app-id flow, which skips credential signing and the token exchange.
	///
	/// Fails with [`ConfigError::MissingAppId`] before consulting the limiter when no app id is
	/// configured.
	pub async fn start_legacy_session(
		&self,
		client: &ClientId,
		request: &OnrampRequest,
	) -> Result<OnrampSession> {
		const KIND: FlowKind = FlowKind::LegacySession;

		let span = FlowSpan::new(KIND, "start_legacy_session");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let purchase = request.validate(self.config.max_amount_per_tx)?;
				let app_id = self.config.app_id.as_deref().ok_or(ConfigError::MissingAppId)?;

				self.admit(client, &purchase).await?;
				span.record_stage("admitted");

				let url = redirect::legacy_url(&self.config.pay_url, app_id, &purchase);

				Ok(self.complete(client, purchase, url))
			})
			.await;

		if let Err(e) = &result {
			span.record_error(e);
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn admit(&self, client: &ClientId, purchase: &ValidatedRequest) -> Result<()> {
		let guard = self.admission_guard(client);
		let result = async {
			let _admission = guard.lock().await;
			let now = OffsetDateTime::now_utc();

			self.limiter.admit_at(client, purchase.amount_usd, now).await?;
			self.limiter.record_request_at(client, purchase.amount_usd, now).await
		}
		.await;

		self.release_admission_guard(client, guard);

		result
	}

	fn admission_guard(&self, client: &ClientId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.admission_guards.lock();

		guards.entry(client.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_admission_guard(&self, client: &ClientId, guard: Arc<AsyncMutex<()>>) {
		let mut guards = self.admission_guards.lock();

		// Only the map and `guard` remain when no other admission is queued for this client.
		if Arc::strong_count(&guard) == 2 {
			guards.remove(client);
		}
	}

	fn complete(&self, client: &ClientId, purchase: ValidatedRequest, url: Url) -> OnrampSession {
		let session_id = SessionId::generate();

		self.audit.append(SessionLogEntry::new(session_id.clone(), client.clone(), &purchase));

		OnrampSession { session_id, url, request: purchase }
	}
}
#[cfg(feature = "reqwest")]
impl OnrampService<ReqwestHttpClient> {
	/// Creates a service with its own reqwest transport.
	///
	/// The client does not follow redirects; the token endpoint is expected to answer directly.
	pub fn new(config: OnrampConfig) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self::with_http_client(config, ReqwestHttpClient::with_client(client)))
	}
}
impl<C> Clone for OnrampService<C>
where
	C: ?Sized + OnrampHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			limiter: self.limiter.clone(),
			audit: self.audit.clone(),
			session_client: self.session_client.clone(),
			admission_guards: self.admission_guards.clone(),
		}
	}
}
impl<C> Debug for OnrampService<C>
where
	C: ?Sized + OnrampHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OnrampService")
			.field("config", &self.config)
			.field("limiter", &self.limiter)
			.field("session_client", &self.session_client)
			.field("audit_entries", &self.audit.len())
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::test_config,
		error::TransportError,
		http::{HttpFuture, HttpReply, JsonPost},
		request::ValidationError,
	};

	const ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

	/// Transport that answers every call with a canned reply and counts calls.
	#[derive(Default)]
	struct CannedHttpClient {
		calls: Mutex<Vec<JsonPost>>,
		reply: Option<HttpReply>,
	}
	impl OnrampHttpClient for CannedHttpClient {
		fn post_json(&self, request: JsonPost) -> HttpFuture<'_> {
			self.calls.lock().push(request);

			let reply = self.reply.clone();

			Box::pin(async move { reply.ok_or(TransportError::Timeout) })
		}
	}

	fn ok_transport() -> CannedHttpClient {
		CannedHttpClient {
			reply: Some(HttpReply {
				status: 200,
				retry_after: None,
				body: b"{\"token\":\"session-token\"}".to_vec(),
			}),
			..Default::default()
		}
	}

	fn client() -> ClientId {
		ClientId::new("192.0.2.10").expect("Client fixture should be valid.")
	}

	fn service(
		transport: CannedHttpClient,
	) -> (OnrampService<CannedHttpClient>, Arc<CannedHttpClient>) {
		let transport = Arc::new(transport);
		let service = OnrampService::<CannedHttpClient>::with_http_client(
			test_config("https://provider.test/onramp/v1/token"),
			transport.clone(),
		);

		(service, transport)
	}

	#[tokio::test]
	async fn start_session_returns_redirect_and_logs() {
		let (service, transport) = service(ok_transport());
		let session = service
			.start_session(&client(), &OnrampRequest::new(ADDRESS, 50.))
			.await
			.expect("Session flow should succeed.");

		assert!(
			session.url.as_str().starts_with("https://pay.coinbase.com/buy?sessionToken=session-token")
		);
		assert_eq!(session.session_id.as_str().len(), 32);
		assert_eq!(service.audit_log().len(), 1);
		assert_eq!(service.audit_log().entries()[0].session_id, session.session_id);

		let calls = transport.calls.lock();

		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].url.as_str(), "https://provider.test/onramp/v1/token");
		assert_eq!(calls[0].bearer.split('.').count(), 3);
		assert!(!format!("{session:?}").contains("session-token"));
	}

	#[tokio::test]
	async fn admission_guards_are_released_after_each_flow() {
		let (service, _) = service(ok_transport());

		service
			.start_legacy_session(&client(), &OnrampRequest::new(ADDRESS, 10.))
			.await
			.expect("Legacy flow should succeed.");

		assert!(service.admission_guards.lock().is_empty());

		let mut config = test_config("https://provider.test/onramp/v1/token");

		config.limits = crate::limit::LimitPolicy::new(1, 1_000.);

		let limited = OnrampService::<CannedHttpClient>::with_http_client(config, ok_transport());

		limited
			.start_legacy_session(&client(), &OnrampRequest::new(ADDRESS, 10.))
			.await
			.expect("First request should be admitted.");
		limited
			.start_legacy_session(&client(), &OnrampRequest::new(ADDRESS, 10.))
			.await
			.expect_err("Second request should be rate limited.");

		assert!(limited.admission_guards.lock().is_empty(), "Denied admissions release too.");
	}

	#[tokio::test]
	async fn validation_failure_short_circuits() {
		let (service, transport) = service(ok_transport());
		let err = service
			.start_session(&client(), &OnrampRequest::new("bad", 50.))
			.await
			.expect_err("Malformed address should be rejected.");

		assert!(matches!(err, Error::Validation(ValidationError::InvalidWalletAddress)));
		assert_eq!(err.user_message(), "Invalid wallet address format");
		assert!(transport.calls.lock().is_empty());
		assert!(service.audit_log().is_empty());
		assert!(
			service
				.limiter()
				.check_rate_limit(&client())
				.await
				.expect("Check should succeed.")
				.is_allowed()
		);
	}

	#[tokio::test]
	async fn transport_failure_keeps_recorded_spend() {
		let (service, transport) = service(CannedHttpClient::default());

		for _ in 0..2 {
			let err = service
				.start_session(&client(), &OnrampRequest::new(ADDRESS, 400.))
				.await
				.expect_err("Timeout transport should fail.");

			assert!(matches!(err, Error::Transport(TransportError::Timeout)));
			assert!(err.is_retryable());
			assert_eq!(err.user_message(), crate::error::GENERIC_USER_MESSAGE);
		}

		assert!(service.audit_log().is_empty());

		let err = service
			.start_session(&client(), &OnrampRequest::new(ADDRESS, 300.))
			.await
			.expect_err("Recorded spend should still count against the daily budget.");

		assert!(matches!(err, Error::SpendLimited(_)));
		assert_eq!(err.user_message(), "Daily limit of $1000 would be exceeded");
		assert_eq!(transport.calls.lock().len(), 2);
	}

	#[tokio::test]
	async fn legacy_flow_requires_app_id_before_touching_limits() {
		let transport = Arc::new(ok_transport());
		let mut config = test_config("https://provider.test/onramp/v1/token");

		config.app_id = None;

		let service =
			OnrampService::<CannedHttpClient>::with_http_client(config, transport.clone());
		let err = service
			.start_legacy_session(&client(), &OnrampRequest::new(ADDRESS, 20.))
			.await
			.expect_err("Legacy flow without app id should fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingAppId)));
		assert!(
			service
				.limiter()
				.check_amount_limit(&client(), 1_000.)
				.await
				.expect("Check should succeed.")
				.is_allowed(),
			"Nothing may be recorded when the app id is missing."
		);
		assert!(transport.calls.lock().is_empty());
	}

	#[tokio::test]
	async fn legacy_flow_skips_token_exchange() {
		let (service, transport) = service(ok_transport());
		let session = service
			.start_legacy_session(&client(), &OnrampRequest::new(ADDRESS, 20.))
			.await
			.expect("Legacy flow should succeed.");

		assert!(session.url.as_str().contains("appId=test-app-id"));
		assert!(transport.calls.lock().is_empty());
		assert_eq!(service.audit_log().len(), 1);
	}

	#[tokio::test]
	async fn missing_credentials_fail_without_consuming_budget() {
		let transport = Arc::new(ok_transport());
		let mut config = test_config("https://provider.test/onramp/v1/token");

		config.api_secret = None;

		let service =
			OnrampService::<CannedHttpClient>::with_http_client(config, transport.clone());
		let err = service
			.start_session(&client(), &OnrampRequest::new(ADDRESS, 20.))
			.await
			.expect_err("Missing secret should fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingApiSecret)));
		assert!(transport.calls.lock().is_empty());
		assert!(
			service
				.limiter()
				.check_amount_limit(&client(), 1_000.)
				.await
				.expect("Check should succeed.")
				.is_allowed()
		);
	}
}
