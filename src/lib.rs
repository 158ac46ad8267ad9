//! Floodgate - Per-Identity Request Admission Control
//!
//! This crate decides, for a stream of events tagged by an identity, whether
//! each event may proceed now and how long until the next one will be
//! allowed. Two independent, swappable components implement the decision:
//! [`IntervalThrottle`] enforces a minimum gap between consecutive admissions
//! for one identity, and [`SlidingWindowLimiter`] caps the number of
//! admissions per identity within a trailing time window. Neither blocks the
//! caller: both return an immediate decision plus a wait-time hint.

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;

pub use admission::{IntervalThrottle, SlidingWindowLimiter};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::FloodgateConfig;
pub use error::{FloodgateError, Result};
