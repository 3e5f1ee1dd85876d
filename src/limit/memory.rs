//! Thread-safe in-memory [`LimitStore`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::ClientId,
	limit::{LimitDecision, LimitFuture, LimitPolicy, LimitStore, RateRecord},
};

type RecordMap = Arc<Mutex<HashMap<ClientId, RateRecord>>>;

/// Keeps one [`RateRecord`] per client for the lifetime of the process.
///
/// Records are created lazily and never evicted, so memory grows with the number of distinct
/// clients observed.
#[derive(Clone, Debug, Default)]
pub struct MemoryLimitStore(RecordMap);
impl MemoryLimitStore {
	/// Number of distinct clients with a record.
	pub fn client_count(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns a copy of the client's record, if one exists.
	pub fn snapshot(&self, client: &ClientId) -> Option<RateRecord> {
		self.0.lock().get(client).cloned()
	}

	fn check_rate_now(
		map: &RecordMap,
		client: &ClientId,
		policy: &LimitPolicy,
		now: OffsetDateTime,
	) -> LimitDecision {
		map.lock().entry(client.to_owned()).or_default().check_rate(policy, now)
	}

	fn check_amount_now(
		map: &RecordMap,
		client: &ClientId,
		policy: &LimitPolicy,
		amount: f64,
		now: OffsetDateTime,
	) -> LimitDecision {
		match map.lock().get_mut(client) {
			Some(record) => record.check_amount(policy, amount, now),
			// An unseen client has no spend; only the cap itself can deny.
			None => RateRecord::default().check_amount(policy, amount, now),
		}
	}

	fn record_now(map: &RecordMap, client: &ClientId, amount: f64, now: OffsetDateTime) {
		map.lock().entry(client.to_owned()).or_default().record(amount, now);
	}
}
impl LimitStore for MemoryLimitStore {
	fn check_rate<'a>(
		&'a self,
		client: &'a ClientId,
		policy: &'a LimitPolicy,
		now: OffsetDateTime,
	) -> LimitFuture<'a, LimitDecision> {
		Box::pin(async move { Ok(Self::check_rate_now(&self.0, client, policy, now)) })
	}

	fn check_amount<'a>(
		&'a self,
		client: &'a ClientId,
		policy: &'a LimitPolicy,
		amount: f64,
		now: OffsetDateTime,
	) -> LimitFuture<'a, LimitDecision> {
		Box::pin(async move { Ok(Self::check_amount_now(&self.0, client, policy, amount, now)) })
	}

	fn record<'a>(
		&'a self,
		client: &'a ClientId,
		amount: f64,
		now: OffsetDateTime,
	) -> LimitFuture<'a, ()> {
		Box::pin(async move {
			Self::record_now(&self.0, client, amount, now);

			Ok(())
		})
	}
}
