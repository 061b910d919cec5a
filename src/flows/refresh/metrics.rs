// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the refresh path.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	reused: AtomicU64,
}
impl RefreshMetrics {
	/// Callers that found a token inside the refresh buffer and entered the refresh path.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Refresh calls the provider answered with new tokens.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Refresh attempts that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Callers that waited on the key guard and reused the token another caller refreshed.
	pub fn cache_hits(&self) -> u64 {
		self.reused.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.reused.fetch_add(1, Ordering::Relaxed);
	}
}
