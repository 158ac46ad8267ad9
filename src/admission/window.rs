//! Sliding-window admission limiting.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{FloodgateError, Result};

/// An admission limiter that caps the number of admitted events per identity
/// within a trailing window of fixed duration.
///
/// Each identity carries an ordered sequence of admission instants, oldest
/// first. Entries that have aged out of the window are evicted lazily before
/// any occupancy-dependent read or write, so no stale entry survives past the
/// next access. Because insertions are monotonic, a single forward scan from
/// the front finds every expired entry.
pub struct SlidingWindowLimiter<I, C = MonotonicClock> {
    /// Length of the trailing window.
    window_size: Duration,
    /// Maximum admissions per identity inside the window. Zero never admits.
    max_requests: usize,
    /// Admission instants per identity, oldest first.
    windows: DashMap<I, VecDeque<Instant>>,
    /// Time source, read once per operation.
    clock: C,
}

impl<I: Eq + Hash + Debug> SlidingWindowLimiter<I> {
    /// Create a new limiter using the system monotonic clock.
    ///
    /// Fails if `window_size` is zero.
    pub fn new(window_size: Duration, max_requests: usize) -> Result<Self> {
        Self::with_clock(window_size, max_requests, MonotonicClock)
    }
}

impl<I: Eq + Hash + Debug, C: Clock> SlidingWindowLimiter<I, C> {
    /// Create a new limiter with an explicit time source.
    pub fn with_clock(window_size: Duration, max_requests: usize, clock: C) -> Result<Self> {
        if window_size.is_zero() {
            return Err(FloodgateError::Config(
                "window_size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            window_size,
            max_requests,
            windows: DashMap::new(),
            clock,
        })
    }

    /// Drop entries that have aged out of the window ending at `now`.
    fn evict_expired(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = window.front() {
            if now.saturating_duration_since(oldest) > self.window_size {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether an event for `identity` would currently be admitted.
    ///
    /// Evicts expired entries but never records an admission.
    pub fn can_admit(&self, identity: &I) -> bool {
        let now = self.clock.now();

        match self.windows.get_mut(identity) {
            Some(mut entry) => {
                let window = entry.value_mut();
                self.evict_expired(window, now);
                window.len() < self.max_requests
            }
            None => self.max_requests > 0,
        }
    }

    /// Attempt to admit an event for `identity`.
    ///
    /// Admits and records the current instant while the identity holds fewer
    /// than `max_requests` admissions inside the trailing window. A denied
    /// attempt does not mutate state.
    pub fn try_admit(&self, identity: I) -> bool {
        let now = self.clock.now();

        if self.max_requests == 0 {
            debug!(identity = ?identity, "Admission denied, capacity is zero");
            return false;
        }

        match self.windows.entry(identity) {
            Entry::Vacant(slot) => {
                debug!(identity = ?slot.key(), "First admission for identity");
                slot.insert(VecDeque::from([now]));
                true
            }
            Entry::Occupied(mut slot) => {
                self.evict_expired(slot.get_mut(), now);
                let occupancy = slot.get().len();

                if occupancy < self.max_requests {
                    trace!(
                        identity = ?slot.key(),
                        occupancy,
                        "Admitting event"
                    );
                    slot.get_mut().push_back(now);
                    true
                } else {
                    debug!(
                        identity = ?slot.key(),
                        occupancy,
                        "Admission denied, window at capacity"
                    );
                    false
                }
            }
        }
    }

    /// Time remaining until the next event for `identity` would be admitted.
    ///
    /// Zero while the identity is under capacity. At capacity, the next slot
    /// opens when the oldest surviving admission ages out of the window.
    pub fn time_until_next(&self, identity: &I) -> Duration {
        let now = self.clock.now();

        let Some(mut entry) = self.windows.get_mut(identity) else {
            // Zero capacity never opens a slot; report a full window.
            return if self.max_requests == 0 {
                self.window_size
            } else {
                Duration::ZERO
            };
        };

        let window = entry.value_mut();
        self.evict_expired(window, now);

        if window.len() < self.max_requests {
            return Duration::ZERO;
        }

        match window.front() {
            Some(&oldest) => self
                .window_size
                .saturating_sub(now.saturating_duration_since(oldest)),
            None => self.window_size,
        }
    }

    /// Remove identities whose windows are fully expired.
    ///
    /// Per-identity records otherwise live for the lifetime of the limiter,
    /// which grows without bound under open-ended identity churn. Returns the
    /// number of identities removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();

        self.windows.retain(|_, window| {
            self.evict_expired(window, now);
            !window.is_empty()
        });

        let removed = before - self.windows.len();
        if removed > 0 {
            debug!(removed, "Evicted idle identities");
        }
        removed
    }

    /// The number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Drop all per-identity state.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.windows.clear();
    }
}
