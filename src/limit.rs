//! Sliding-window request and spend budgets keyed by client.
//!
//! [`RateLimiter`] applies a [`LimitPolicy`] through a pluggable [`LimitStore`]. The window math
//! lives on [`RateRecord`] so every backend prunes and counts the same way:
//!
//! - requests are counted over the trailing hour, spend over the trailing 24 hours;
//! - the window's lower bound is inclusive, so an entry stamped exactly `now - window` still
//!   counts and only strictly older entries are pruned;
//! - recording never rolls back, so spend accepted before a later failure stays counted.

pub mod memory;
pub mod record;

pub use memory::MemoryLimitStore;
pub use record::RateRecord;

// self
use crate::{_prelude::*, auth::ClientId};

/// Trailing window over which requests are counted.
pub const REQUEST_WINDOW: Duration = Duration::hours(1);
/// Trailing window over which spend is summed.
pub const SPEND_WINDOW: Duration = Duration::hours(24);

/// Boxed future returned by [`LimitStore`] operations.
pub type LimitFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend holding per-client [`RateRecord`]s.
///
/// Each operation must be atomic with respect to the record it touches. Implementations other
/// than [`MemoryLimitStore`] (e.g. a shared cache) should reuse the [`RateRecord`] helpers so
/// pruning semantics stay identical.
pub trait LimitStore
where
	Self: Send + Sync,
{
	/// Prunes the client's request window and decides whether one more request fits.
	fn check_rate<'a>(
		&'a self,
		client: &'a ClientId,
		policy: &'a LimitPolicy,
		now: OffsetDateTime,
	) -> LimitFuture<'a, LimitDecision>;

	/// Prunes the client's spend window and decides whether `amount` fits the daily cap.
	fn check_amount<'a>(
		&'a self,
		client: &'a ClientId,
		policy: &'a LimitPolicy,
		amount: f64,
		now: OffsetDateTime,
	) -> LimitFuture<'a, LimitDecision>;

	/// Records one accepted request worth `amount`.
	fn record<'a>(
		&'a self,
		client: &'a ClientId,
		amount: f64,
		now: OffsetDateTime,
	) -> LimitFuture<'a, ()>;
}

/// Error type produced by [`LimitStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Per-client budgets enforced by the limiter.
#[derive(Clone, Debug, PartialEq)]
pub struct LimitPolicy {
	/// Requests allowed within [`LimitPolicy::request_window`].
	pub max_requests_per_hour: u32,
	/// Cumulative USD allowed within [`LimitPolicy::spend_window`].
	pub max_amount_per_day: f64,
	/// Trailing window for request counting.
	pub request_window: Duration,
	/// Trailing window for spend accounting.
	pub spend_window: Duration,
}
impl LimitPolicy {
	/// Creates a policy with the standard one-hour and 24-hour windows.
	pub fn new(max_requests_per_hour: u32, max_amount_per_day: f64) -> Self {
		Self {
			max_requests_per_hour,
			max_amount_per_day,
			request_window: REQUEST_WINDOW,
			spend_window: SPEND_WINDOW,
		}
	}
}

/// Result of a limiter check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LimitDecision {
	/// The request fits the budget.
	Allow,
	/// The request exceeds the budget.
	Deny(RetryDirective),
}
impl LimitDecision {
	/// Returns `true` when the request may proceed.
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow)
	}

	/// Human-readable denial message, if denied.
	pub fn message(&self) -> Option<&str> {
		match self {
			Self::Allow => None,
			Self::Deny(directive) => Some(&directive.reason),
		}
	}
}

/// Advises callers when a denied request could succeed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when enough of the window will have aged out.
	pub earliest_retry_at: OffsetDateTime,
	/// Suggested wait measured from the check.
	pub recommended_backoff: Duration,
	/// Message suitable for end users.
	pub reason: String,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: String::new() }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = reason.into();

		self
	}
}

/// Applies a [`LimitPolicy`] through a [`LimitStore`].
#[derive(Clone)]
pub struct RateLimiter {
	store: Arc<dyn LimitStore>,
	policy: LimitPolicy,
}
impl RateLimiter {
	/// Creates a limiter backed by a fresh [`MemoryLimitStore`].
	pub fn new(policy: LimitPolicy) -> Self {
		Self::with_store(Arc::new(MemoryLimitStore::default()), policy)
	}

	/// Creates a limiter backed by the provided store.
	pub fn with_store(store: Arc<dyn LimitStore>, policy: LimitPolicy) -> Self {
		Self { store, policy }
	}

	/// Policy enforced by this limiter.
	pub fn policy(&self) -> &LimitPolicy {
		&self.policy
	}

	/// Checks the hourly request budget at the current instant.
	pub async fn check_rate_limit(&self, client: &ClientId) -> Result<LimitDecision> {
		self.check_rate_limit_at(client, OffsetDateTime::now_utc()).await
	}

	/// Checks the hourly request budget as observed at `now`.
	pub async fn check_rate_limit_at(
		&self,
		client: &ClientId,
		now: OffsetDateTime,
	) -> Result<LimitDecision> {
		Ok(<dyn LimitStore>::check_rate(self.store.as_ref(), client, &self.policy, now).await?)
	}

	/// Checks the daily spend budget at the current instant.
	pub async fn check_amount_limit(&self, client: &ClientId, amount: f64) -> Result<LimitDecision> {
		self.check_amount_limit_at(client, amount, OffsetDateTime::now_utc()).await
	}

	/// Checks the daily spend budget as observed at `now`.
	pub async fn check_amount_limit_at(
		&self,
		client: &ClientId,
		amount: f64,
		now: OffsetDateTime,
	) -> Result<LimitDecision> {
		Ok(<dyn LimitStore>::check_amount(self.store.as_ref(), client, &self.policy, amount, now)
			.await?)
	}

	/// Records an accepted request at the current instant.
	///
	/// Call once per request, only after both checks allowed it.
	pub async fn record_request(&self, client: &ClientId, amount: f64) -> Result<()> {
		self.record_request_at(client, amount, OffsetDateTime::now_utc()).await
	}

	/// Records an accepted request at `now`.
	pub async fn record_request_at(
		&self,
		client: &ClientId,
		amount: f64,
		now: OffsetDateTime,
	) -> Result<()> {
		Ok(<dyn LimitStore>::record(self.store.as_ref(), client, amount, now).await?)
	}

	/// Runs the rate check, then the spend check, converting denials into errors.
	pub async fn admit_at(&self, client: &ClientId, amount: f64, now: OffsetDateTime) -> Result<()> {
		if let LimitDecision::Deny(directive) = self.check_rate_limit_at(client, now).await? {
			return Err(Error::RateLimited(directive));
		}
		if let LimitDecision::Deny(directive) =
			self.check_amount_limit_at(client, amount, now).await?
		{
			return Err(Error::SpendLimited(directive));
		}

		Ok(())
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").field("policy", &self.policy).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn t0() -> OffsetDateTime {
		datetime!(2026-03-01 09:00:00 UTC)
	}

	fn client(value: &str) -> ClientId {
		ClientId::new(value).expect("Client fixture should be valid.")
	}

	#[tokio::test]
	async fn brand_new_client_passes_both_checks() {
		let limiter = RateLimiter::new(LimitPolicy::new(1, 10.));
		let client = client("203.0.113.1");

		assert!(limiter.check_rate_limit(&client).await.expect("Check should succeed.").is_allowed());
		assert!(
			limiter
				.check_amount_limit(&client, 10.)
				.await
				.expect("Check should succeed.")
				.is_allowed()
		);
	}

	#[tokio::test]
	async fn hourly_budget_denies_the_request_past_the_maximum() {
		let max = 5;
		let limiter = RateLimiter::new(LimitPolicy::new(max, 1_000.));
		let client = client("203.0.113.2");

		for i in 0..max {
			let now = t0() + Duration::seconds(i64::from(i));
			let decision =
				limiter.check_rate_limit_at(&client, now).await.expect("Check should succeed.");

			assert!(decision.is_allowed(), "Request {i} should fit the budget.");

			limiter.record_request_at(&client, 1., now).await.expect("Record should succeed.");
		}

		let decision = limiter
			.check_rate_limit_at(&client, t0() + Duration::minutes(10))
			.await
			.expect("Check should succeed.");

		assert!(!decision.is_allowed());
		assert_eq!(decision.message(), Some("Rate limit exceeded. Try again in 50 minutes."));

		let LimitDecision::Deny(directive) = decision else {
			panic!("Decision should be a denial.");
		};

		assert_eq!(directive.earliest_retry_at, t0() + REQUEST_WINDOW);
		assert_eq!(directive.recommended_backoff, Duration::minutes(50));
	}

	#[tokio::test]
	async fn clients_do_not_share_budgets() {
		let limiter = RateLimiter::new(LimitPolicy::new(1, 100.));
		let first = client("203.0.113.3");
		let second = client("203.0.113.4");

		limiter.record_request_at(&first, 100., t0()).await.expect("Record should succeed.");

		assert!(!limiter.check_rate_limit_at(&first, t0()).await.expect("Check.").is_allowed());
		assert!(!limiter.check_amount_limit_at(&first, 1., t0()).await.expect("Check.").is_allowed());
		assert!(limiter.check_rate_limit_at(&second, t0()).await.expect("Check.").is_allowed());
		assert!(
			limiter.check_amount_limit_at(&second, 100., t0()).await.expect("Check.").is_allowed()
		);
	}

	#[tokio::test]
	async fn admit_reports_the_failing_budget() {
		let limiter = RateLimiter::new(LimitPolicy::new(2, 50.));
		let client = client("203.0.113.5");

		limiter.admit_at(&client, 40., t0()).await.expect("First request should be admitted.");
		limiter.record_request_at(&client, 40., t0()).await.expect("Record should succeed.");

		let err = limiter
			.admit_at(&client, 20., t0())
			.await
			.expect_err("Second request should exceed the daily cap.");

		assert!(matches!(err, Error::SpendLimited(_)));
		assert_eq!(err.user_message(), "Daily limit of $50 would be exceeded");

		limiter.record_request_at(&client, 5., t0()).await.expect("Record should succeed.");

		let err = limiter
			.admit_at(&client, 1., t0())
			.await
			.expect_err("Third request should exceed the hourly budget.");

		assert!(matches!(err, Error::RateLimited(_)));
	}
}
