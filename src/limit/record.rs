//! Per-client request and spend windows with lazy pruning.

// self
use crate::{
	_prelude::*,
	limit::{LimitDecision, LimitPolicy, RetryDirective},
};

/// Ordered request timestamps and spend entries for one client.
///
/// Both sequences are non-decreasing in time: a timestamp older than the newest stored entry is
/// clamped up to it when recorded, so pruning can stop at the first in-window entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RateRecord {
	requests: VecDeque<OffsetDateTime>,
	spend: VecDeque<(OffsetDateTime, f64)>,
}
impl RateRecord {
	/// Number of requests currently retained.
	pub fn request_count(&self) -> usize {
		self.requests.len()
	}

	/// Sum of the spend entries currently retained.
	pub fn spent(&self) -> f64 {
		self.spend.iter().map(|(_, amount)| amount).sum()
	}

	/// Retained request timestamps, oldest first.
	pub fn requests(&self) -> impl Iterator<Item = &OffsetDateTime> {
		self.requests.iter()
	}

	/// Drops request timestamps strictly older than `now - window`.
	pub fn prune_requests(&mut self, now: OffsetDateTime, window: Duration) {
		let cutoff = now - window;

		while self.requests.front().is_some_and(|at| *at < cutoff) {
			self.requests.pop_front();
		}
	}

	/// Drops spend entries strictly older than `now - window`.
	pub fn prune_spend(&mut self, now: OffsetDateTime, window: Duration) {
		let cutoff = now - window;

		while self.spend.front().is_some_and(|(at, _)| *at < cutoff) {
			self.spend.pop_front();
		}
	}

	/// Prunes the request window and decides whether one more request fits.
	pub fn check_rate(&mut self, policy: &LimitPolicy, now: OffsetDateTime) -> LimitDecision {
		self.prune_requests(now, policy.request_window);

		if self.requests.len() < policy.max_requests_per_hour as usize {
			return LimitDecision::Allow;
		}

		let Some(oldest) = self.requests.front().copied() else {
			return LimitDecision::Allow;
		};
		let retry_at = oldest + policy.request_window;
		let backoff = retry_at - now;

		LimitDecision::Deny(RetryDirective::new(retry_at, backoff).with_reason(format!(
			"Rate limit exceeded. Try again in {} minutes.",
			backoff.whole_minutes()
		)))
	}

	/// Prunes the spend window and decides whether `amount` fits the daily cap.
	pub fn check_amount(
		&mut self,
		policy: &LimitPolicy,
		amount: f64,
		now: OffsetDateTime,
	) -> LimitDecision {
		self.prune_spend(now, policy.spend_window);

		let cap = policy.max_amount_per_day;
		let mut total = self.spent();

		if total + amount <= cap {
			return LimitDecision::Allow;
		}

		// Earliest instant at which enough old spend ages out for `amount` to fit.
		let mut retry_at = now + policy.spend_window;

		for (at, spent) in &self.spend {
			total -= spent;

			if total + amount <= cap {
				retry_at = *at + policy.spend_window;

				break;
			}
		}

		LimitDecision::Deny(
			RetryDirective::new(retry_at, retry_at - now)
				.with_reason(format!("Daily limit of ${cap} would be exceeded")),
		)
	}

	/// Appends one accepted request worth `amount`.
	pub fn record(&mut self, amount: f64, now: OffsetDateTime) {
		let at = self.requests.back().copied().filter(|latest| *latest > now).unwrap_or(now);

		self.requests.push_back(at);
		self.spend.push_back((at, amount));
	}
}
