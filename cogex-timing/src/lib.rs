pub mod clock;
pub mod timer;

pub use clock::{Clock, ClockKind, ClockSource, ClockValue, WallClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::ManualClock;
pub use timer::{HighPrecisionTimer, JitterStats, JitterWindow};
