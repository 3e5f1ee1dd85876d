//! Bounded, in-process log of completed onramp sessions.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, SessionId},
	request::{Asset, Network, ValidatedRequest},
};

/// Maximum number of entries retained; older entries are evicted first.
pub const AUDIT_LOG_CAPACITY: usize = 1_000;

/// One completed session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
	/// Instant the session was logged.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Session identifier handed back to the caller.
	pub session_id: SessionId,
	/// Destination wallet address.
	pub wallet_address: String,
	/// Fiat amount in USD.
	pub amount_usd: f64,
	/// Purchased asset.
	pub asset: Asset,
	/// Delivery network.
	pub network: Network,
	/// Client the session was charged to.
	pub client_id: ClientId,
}
impl SessionLogEntry {
	/// Creates an entry stamped with the current UTC time.
	pub fn new(session_id: SessionId, client_id: ClientId, purchase: &ValidatedRequest) -> Self {
		Self {
			timestamp: OffsetDateTime::now_utc(),
			session_id,
			wallet_address: purchase.wallet_address.clone(),
			amount_usd: purchase.amount_usd,
			asset: purchase.asset,
			network: purchase.network,
			client_id,
		}
	}

	/// Overrides the timestamp.
	pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
		self.timestamp = timestamp;

		self
	}
}

/// FIFO log capped at a fixed capacity.
#[derive(Debug)]
pub struct AuditLog {
	entries: Mutex<VecDeque<SessionLogEntry>>,
	capacity: usize,
}
impl AuditLog {
	/// Creates a log retaining at most `capacity` entries (at least one).
	pub fn with_capacity(capacity: usize) -> Self {
		let capacity = capacity.max(1);

		Self { entries: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
	}

	/// Pushes `entry` to the tail, evicting from the head until the log fits its capacity.
	pub fn append(&self, entry: SessionLogEntry) {
		let mut entries = self.entries.lock();

		entries.push_back(entry);

		while entries.len() > self.capacity {
			entries.pop_front();
		}
	}

	/// Snapshot of the retained entries, oldest first.
	pub fn entries(&self) -> Vec<SessionLogEntry> {
		self.entries.lock().iter().cloned().collect()
	}

	/// Number of retained entries.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when nothing has been logged.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Maximum number of retained entries.
	pub fn capacity(&self) -> usize {
		self.capacity
	}
}
impl Default for AuditLog {
	fn default() -> Self {
		Self::with_capacity(AUDIT_LOG_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn purchase(amount_usd: f64) -> ValidatedRequest {
		ValidatedRequest {
			wallet_address: "0x52908400098527886E0F7030069857D2E4169EE7".into(),
			amount_usd,
			asset: Asset::Usdc,
			network: Network::Base,
		}
	}

	fn client() -> ClientId {
		ClientId::new("198.51.100.7").expect("Client fixture should be valid.")
	}

	#[test]
	fn append_evicts_oldest_beyond_capacity() {
		let log = AuditLog::default();
		let first = SessionId::generate();

		log.append(SessionLogEntry::new(first.clone(), client(), &purchase(0.)));

		assert!(log.entries().iter().any(|e| e.session_id == first));

		for i in 1..=AUDIT_LOG_CAPACITY {
			log.append(SessionLogEntry::new(SessionId::generate(), client(), &purchase(i as f64)));
		}

		let entries = log.entries();

		assert!(
			!entries.iter().any(|e| e.session_id == first),
			"The first entry must be evicted after capacity + 1 appends."
		);
		assert_eq!(log.len(), AUDIT_LOG_CAPACITY);
		assert_eq!(entries.len(), AUDIT_LOG_CAPACITY);
		assert_eq!(entries[0].amount_usd, 1.);
		assert_eq!(entries[AUDIT_LOG_CAPACITY - 1].amount_usd, AUDIT_LOG_CAPACITY as f64);
	}

	#[test]
	fn small_logs_keep_insertion_order() {
		let log = AuditLog::with_capacity(2);

		assert!(log.is_empty());

		for amount in [1., 2., 3.] {
			log.append(SessionLogEntry::new(SessionId::generate(), client(), &purchase(amount)));
		}

		let amounts = log.entries().into_iter().map(|e| e.amount_usd).collect::<Vec<_>>();

		assert_eq!(amounts, vec![2., 3.]);
		assert_eq!(AuditLog::with_capacity(0).capacity(), 1);
	}

	#[test]
	fn entries_serialize_with_rfc3339_timestamps() {
		let entry = SessionLogEntry::new(SessionId::generate(), client(), &purchase(42.))
			.with_timestamp(datetime!(2026-03-01 09:00:00 UTC));
		let json = serde_json::to_value(&entry).expect("Entry should serialize.");

		assert_eq!(json["timestamp"], "2026-03-01T09:00:00Z");
		assert_eq!(json["asset"], "USDC");
		assert_eq!(json["network"], "base");
		assert_eq!(json["client_id"], "198.51.100.7");
		assert_eq!(json["session_id"].as_str().map(str::len), Some(32));

		let back: SessionLogEntry = serde_json::from_value(json).expect("Entry should deserialize.");

		assert_eq!(back, entry);
	}
}
