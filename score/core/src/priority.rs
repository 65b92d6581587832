//! Type-safe scheduling priorities.

use core::fmt;

use thiserror::Error;

/// Error returned when constructing a priority from an invalid raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("priority 0 is reserved; valid priorities are 1..=255")]
pub struct InvalidPriority;

/// Scheduling priority of a thread.
///
/// Larger values are more urgent. Priority 0 is reserved as the invalid
/// marker, so valid priorities are `1..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Lowest valid priority.
    pub const MIN: Priority = Priority(1);

    /// Highest valid priority.
    pub const MAX: Priority = Priority(255);

    /// Priority assigned to threads that never asked for one.
    pub const DEFAULT: Priority = Priority(128);

    /// Creates a new priority level.
    pub fn new(priority: u8) -> Result<Self, InvalidPriority> {
        if priority == 0 {
            Err(InvalidPriority)
        } else {
            Ok(Priority(priority))
        }
    }

    /// Creates a priority without validation (const fn).
    pub const fn new_unchecked(priority: u8) -> Self {
        Priority(priority)
    }

    /// Returns the raw priority value.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns true if this priority is valid (non-zero).
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
