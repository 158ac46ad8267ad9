//! Minimum-interval admission throttling.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{FloodgateError, Result};

/// An admission throttle that enforces a minimum elapsed time between two
/// consecutive admitted events for the same identity.
///
/// State is held per identity and created lazily on the first admission.
/// Identities are independent: decisions for one never affect another. The
/// map is sharded, so concurrent callers for different identities do not
/// contend, while the check-and-set for a single identity is atomic.
pub struct IntervalThrottle<I, C = MonotonicClock> {
    /// Minimum gap required between two admissions for one identity.
    min_interval: Duration,
    /// Last admitted instant per identity. Absent means never admitted.
    last_admitted: DashMap<I, Instant>,
    /// Time source, read once per operation.
    clock: C,
}

impl<I: Eq + Hash + Debug> IntervalThrottle<I> {
    /// Create a new throttle using the system monotonic clock.
    ///
    /// Fails if `min_interval` is zero.
    pub fn new(min_interval: Duration) -> Result<Self> {
        Self::with_clock(min_interval, MonotonicClock)
    }
}

impl<I: Eq + Hash + Debug, C: Clock> IntervalThrottle<I, C> {
    /// Create a new throttle with an explicit time source.
    pub fn with_clock(min_interval: Duration, clock: C) -> Result<Self> {
        if min_interval.is_zero() {
            return Err(FloodgateError::Config(
                "min_interval must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            min_interval,
            last_admitted: DashMap::new(),
            clock,
        })
    }

    /// Attempt to admit an event for `identity`.
    ///
    /// The first event for an identity is always admitted. Subsequent events
    /// are admitted only once `min_interval` has elapsed since the last
    /// admission. A denied attempt leaves the stored state untouched, so
    /// retrying early does not extend the wait.
    pub fn try_admit(&self, identity: I) -> bool {
        let now = self.clock.now();

        match self.last_admitted.entry(identity) {
            Entry::Vacant(slot) => {
                debug!(identity = ?slot.key(), "First admission for identity");
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                let elapsed = now.saturating_duration_since(*slot.get());
                if elapsed >= self.min_interval {
                    trace!(identity = ?slot.key(), ?elapsed, "Admitting event");
                    *slot.get_mut() = now;
                    true
                } else {
                    debug!(
                        identity = ?slot.key(),
                        remaining = ?(self.min_interval - elapsed),
                        "Admission denied, interval not yet elapsed"
                    );
                    false
                }
            }
        }
    }

    /// Time remaining until the next event for `identity` would be admitted.
    ///
    /// Read-only: reflects the clock at call time and never mutates state.
    /// Returns zero for identities that have never been admitted.
    pub fn time_until_next(&self, identity: &I) -> Duration {
        let now = self.clock.now();

        match self.last_admitted.get(identity) {
            Some(last) => {
                let elapsed = now.saturating_duration_since(*last);
                self.min_interval.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    /// Remove identities whose last admission is at least `idle_for` old.
    ///
    /// Per-identity records otherwise live for the lifetime of the throttle,
    /// which grows without bound under open-ended identity churn. Returns the
    /// number of identities removed.
    pub fn evict_idle(&self, idle_for: Duration) -> usize {
        let now = self.clock.now();
        let before = self.last_admitted.len();

        self.last_admitted
            .retain(|_, last| now.saturating_duration_since(*last) < idle_for);

        let removed = before - self.last_admitted.len();
        if removed > 0 {
            debug!(removed, "Evicted idle identities");
        }
        removed
    }

    /// The number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.last_admitted.len()
    }

    /// Drop all per-identity state.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.last_admitted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn throttle(
        min_interval: Duration,
    ) -> (IntervalThrottle<&'static str, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let throttle = IntervalThrottle::with_clock(min_interval, Arc::clone(&clock)).unwrap();
        (throttle, clock)
    }

    #[test]
    fn test_zero_interval_rejected_at_construction() {
        let result = IntervalThrottle::<String>::new(Duration::ZERO);
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_first_admission_always_allowed() {
        let (throttle, _clock) = throttle(Duration::from_secs(10));

        assert_eq!(throttle.time_until_next(&"u1"), Duration::ZERO);
        assert!(throttle.try_admit("u1"));
    }

    #[test]
    fn test_denied_within_interval() {
        let (throttle, clock) = throttle(Duration::from_secs(10));

        assert!(throttle.try_admit("u1"));
        clock.advance(Duration::from_secs(5));
        assert!(!throttle.try_admit("u1"));
        assert_eq!(throttle.time_until_next(&"u1"), Duration::from_secs(5));
    }

    #[test]
    fn test_admitted_after_interval_elapses() {
        let (throttle, clock) = throttle(Duration::from_secs(10));

        assert!(throttle.try_admit("u1"));
        clock.advance(Duration::from_secs(11));
        assert!(throttle.try_admit("u1"));
    }

    #[test]
    fn test_denial_does_not_reset_the_wait() {
        let (throttle, clock) = throttle(Duration::from_secs(10));

        assert!(throttle.try_admit("u1"));
        clock.advance(Duration::from_secs(4));

        let before = throttle.time_until_next(&"u1");
        assert!(!throttle.try_admit("u1"));
        assert_eq!(throttle.time_until_next(&"u1"), before);

        // The original admission still gates, not the denied retry.
        clock.advance(Duration::from_secs(6));
        assert!(throttle.try_admit("u1"));
    }

    #[test]
    fn test_wait_decays_to_zero() {
        let (throttle, clock) = throttle(Duration::from_secs(10));

        assert!(throttle.try_admit("u1"));
        let mut previous = throttle.time_until_next(&"u1");
        for _ in 0..10 {
            clock.advance(Duration::from_secs(1));
            let remaining = throttle.time_until_next(&"u1");
            assert!(remaining <= previous);
            previous = remaining;
        }
        assert_eq!(previous, Duration::ZERO);
    }

    #[test]
    fn test_identities_are_independent() {
        let (throttle, clock) = throttle(Duration::from_secs(10));

        assert!(throttle.try_admit("u1"));
        clock.advance(Duration::from_secs(1));

        assert!(throttle.try_admit("u2"));
        assert!(!throttle.try_admit("u1"));
        assert_eq!(throttle.time_until_next(&"u2"), Duration::from_secs(10));
    }

    #[test]
    fn test_interval_floor_over_a_sequence() {
        let (throttle, clock) = throttle(Duration::from_secs(10));
        let mut admitted_at = Vec::new();
        let mut elapsed = Duration::ZERO;

        for _ in 0..40 {
            if throttle.try_admit("u1") {
                admitted_at.push(elapsed);
            }
            clock.advance(Duration::from_secs(3));
            elapsed += Duration::from_secs(3);
        }

        for pair in admitted_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_evict_idle_removes_stale_identities() {
        let (throttle, clock) = throttle(Duration::from_secs(1));

        assert!(throttle.try_admit("old"));
        clock.advance(Duration::from_secs(60));
        assert!(throttle.try_admit("fresh"));
        assert_eq!(throttle.tracked_identities(), 2);

        let removed = throttle.evict_idle(Duration::from_secs(30));
        assert_eq!(removed, 1);
        assert_eq!(throttle.tracked_identities(), 1);

        // An evicted identity starts over and admits immediately.
        assert!(throttle.try_admit("old"));
    }

    #[tokio::test]
    async fn test_concurrent_callers_admit_exactly_once() {
        let throttle =
            Arc::new(IntervalThrottle::<String>::new(Duration::from_secs(600)).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move {
                let mut admitted = 0usize;
                for _ in 0..100 {
                    if throttle.try_admit("u1".to_string()) {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }

        // The check-and-set is atomic per identity, so only the first
        // attempt anywhere can succeed within the interval.
        assert_eq!(total, 1);
    }

    #[test]
    fn test_clear_drops_all_state() {
        let (throttle, _clock) = throttle(Duration::from_secs(10));

        assert!(throttle.try_admit("u1"));
        assert!(throttle.try_admit("u2"));
        assert_eq!(throttle.tracked_identities(), 2);

        throttle.clear();
        assert_eq!(throttle.tracked_identities(), 0);
        assert!(throttle.try_admit("u1"));
    }
}
