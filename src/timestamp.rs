use core::ops::Add;
use core::time::Duration;

/// Monotonic clock the timers are scheduled against.
pub trait TimestampTrait: Sized + Add<Duration, Output = Self> + Clone + Copy + Ord + Eq {
    fn now() -> Self;
    fn with_delay(delay: core::time::Duration) -> Self {
        Self::now() + delay
    }
    /// Returns `Some(other - self)` or `None` if `self > other`
    fn until(&self, other: Self) -> Option<Duration>;
}
impl TimestampTrait for std::time::Instant {
    fn now() -> Self {
        std::time::Instant::now()
    }

    fn until(&self, other: Self) -> Option<Duration> {
        other.checked_duration_since(*self)
    }
}
