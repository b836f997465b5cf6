pub mod scheduler;
pub mod timer;

pub use scheduler::{Due, Scheduler, TimerHandle};
pub use timer::{HighPrecisionTimer, ManualTimer, Timer, TimingStats};

pub const NANOS_PER_MS: u64 = 1_000_000;

/// Converts a millisecond setting into scheduler nanoseconds.
pub fn ms_to_ns(ms: u64) -> u64 {
    ms.saturating_mul(NANOS_PER_MS)
}
