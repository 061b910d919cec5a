//! Injectable UTC time sources used for every expiry comparison.
//!
//! Production code uses [`SystemClock`]; tests drive [`ManualClock`] so token expiry and
//! pending-authorization TTLs can be crossed without sleeping.

// self
use crate::_prelude::*;

/// Source of the current UTC instant.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time source.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for deterministic tests.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `instant`.
	pub fn at(instant: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(instant)))
	}

	/// Moves the clock forward (or backward for negative durations).
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Jumps to an absolute instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::at(OffsetDateTime::now_utc())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn manual_clock_advances_and_jumps() {
		let clock = ManualClock::at(macros::datetime!(2025-01-01 00:00 UTC));

		clock.advance(Duration::minutes(90));

		assert_eq!(clock.now(), macros::datetime!(2025-01-01 01:30 UTC));

		clock.set(macros::datetime!(2030-06-01 12:00 UTC));

		assert_eq!(clock.now(), macros::datetime!(2030-06-01 12:00 UTC));
	}

	#[test]
	fn clones_share_the_same_instant() {
		let clock = ManualClock::at(macros::datetime!(2025-01-01 00:00 UTC));
		let shared = clock.clone();

		shared.advance(Duration::seconds(30));

		assert_eq!(clock.now(), macros::datetime!(2025-01-01 00:00:30 UTC));
	}

	#[test]
	fn system_clock_is_monotonic_enough() {
		let first = SystemClock.now();
		let second = SystemClock.now();

		assert!(second >= first);
	}
}
