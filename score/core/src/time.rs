//! Absolute deadlines for timed blocking operations.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// An absolute point in time a blocking operation must not outlive.
///
/// Deadlines are monotonic internally; wall-clock inputs are converted once
/// at construction and are not affected by later clock adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline at the given monotonic instant.
    pub fn at(when: Instant) -> Self {
        Deadline(when)
    }

    /// Deadline `delay` from now.
    pub fn after(delay: Duration) -> Self {
        Deadline(Instant::now() + delay)
    }

    /// Deadline from an absolute wall-clock time (seconds and nanoseconds
    /// since the Unix epoch). A time already in the past yields a deadline
    /// that has passed.
    pub fn from_unix(secs: u64, nanos: u32) -> Self {
        let target = UNIX_EPOCH + Duration::new(secs, nanos);
        let remaining = target
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        Deadline(Instant::now() + remaining)
    }

    /// The underlying monotonic instant.
    pub fn instant(self) -> Instant {
        self.0
    }

    /// Returns true if the deadline has already passed.
    pub fn has_passed(self) -> bool {
        Instant::now() >= self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_has_passed() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.has_passed());
    }

    #[test]
    fn future_deadline_has_not_passed() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.has_passed());
    }

    #[test]
    fn past_wall_clock_time_has_passed() {
        // 2001-09-09T01:46:40Z, comfortably in the past.
        let deadline = Deadline::from_unix(1_000_000_000, 0);
        assert!(deadline.has_passed());
    }
}
