//! Admission control logic and per-identity state management.

mod throttle;
mod window;

pub use throttle::IntervalThrottle;
pub use window::SlidingWindowLimiter;
