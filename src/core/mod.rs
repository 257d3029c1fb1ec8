//! Core abstractions shared by the queue, cache and scheduler.

mod clock;

pub use clock::{is_expired, saturating_add, to_delta, Clock, ManualClock, SystemClock};
