//! Per-thread wait flag.
//!
//! Every thread control block owns one wait flag. A blocking protocol
//! prepares the flag, inserts the thread into a wait list, drops the list's
//! lock, and parks on the flag. The thread that later hands the resource
//! over calls [`WaitFlag::grant`], which wakes the parked thread.
//!
//! A thread woken through `grant` holds the resource by construction; there
//! are no spurious grants. A deadline expiry is reported locally to the
//! caller so it can go back, take the wait-list lock, and remove itself.

use parking_lot::{Condvar, Mutex};

use crate::isr;
use crate::time::Deadline;

/// What a blocked thread is waiting for. Diagnostic only.
///
/// The thread queue records whichever reason its caller passes; only the
/// mutex layer exists today, so `Semaphore` and `Event` are reserved for
/// the other primitives built on the same queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Blocked acquiring a mutex.
    Mutex,
    /// Blocked obtaining a semaphore.
    Semaphore,
    /// Blocked waiting for an event.
    Event,
}

/// Result of parking on a wait flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockResult {
    /// The resource was handed over; the caller owns it now.
    Granted,
    /// The deadline passed before a grant arrived. The thread is still on
    /// the wait list and must extract itself (or discover a racing grant).
    DeadlineExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagState {
    Idle,
    Waiting(WaitReason),
    Granted,
}

/// Park/wake cell for one thread.
pub struct WaitFlag {
    state: Mutex<FlagState>,
    wake: Condvar,
}

impl WaitFlag {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlagState::Idle),
            wake: Condvar::new(),
        }
    }

    /// Arms the flag before the thread goes onto a wait list.
    ///
    /// Must be called while holding the wait-list lock, so that a grant
    /// cannot arrive before the flag is armed.
    pub fn prepare(&self, reason: WaitReason) {
        let mut state = self.state.lock();
        debug_assert_eq!(*state, FlagState::Idle, "wait flag already armed");
        *state = FlagState::Waiting(reason);
    }

    /// Parks the calling thread until a grant arrives or the deadline passes.
    ///
    /// Must be called after the wait-list lock has been dropped.
    pub fn block(&self, deadline: Option<Deadline>) -> BlockResult {
        debug_assert_eq!(isr::nesting(), 0, "cannot block with ISRs disabled");
        let mut state = self.state.lock();
        loop {
            if *state == FlagState::Granted {
                *state = FlagState::Idle;
                return BlockResult::Granted;
            }
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut state, deadline.instant()).timed_out() {
                        // A grant may have slipped in just as the wait timed
                        // out; it wins over the expiry.
                        if *state == FlagState::Granted {
                            *state = FlagState::Idle;
                            return BlockResult::Granted;
                        }
                        return BlockResult::DeadlineExpired;
                    }
                }
                None => self.wake.wait(&mut state),
            }
        }
    }

    /// Hands the resource to the parked thread and wakes it.
    pub fn grant(&self) {
        let mut state = self.state.lock();
        debug_assert!(
            matches!(*state, FlagState::Waiting(_)),
            "grant on a thread that is not waiting"
        );
        *state = FlagState::Granted;
        self.wake.notify_one();
    }

    /// Disarms the flag after the thread extracted itself from a wait list.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        debug_assert!(
            matches!(*state, FlagState::Waiting(_)),
            "cancel on a thread that is not waiting"
        );
        *state = FlagState::Idle;
    }

    /// Returns what the thread is blocked on, or `None` if it is not blocked.
    pub fn reason(&self) -> Option<WaitReason> {
        match *self.state.lock() {
            FlagState::Waiting(reason) => Some(reason),
            _ => None,
        }
    }
}

impl Default for WaitFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn grant_before_block_returns_immediately() {
        let flag = WaitFlag::new();
        flag.prepare(WaitReason::Mutex);
        assert_eq!(flag.reason(), Some(WaitReason::Mutex));
        flag.grant();
        assert_eq!(flag.block(None), BlockResult::Granted);
        assert_eq!(flag.reason(), None);
    }

    #[test]
    fn deadline_expiry_leaves_flag_armed() {
        let flag = WaitFlag::new();
        flag.prepare(WaitReason::Semaphore);
        let result = flag.block(Some(Deadline::after(Duration::from_millis(10))));
        assert_eq!(result, BlockResult::DeadlineExpired);
        assert_eq!(flag.reason(), Some(WaitReason::Semaphore));
        flag.cancel();
        assert_eq!(flag.reason(), None);
    }

    #[test]
    fn past_deadline_expires_promptly() {
        let flag = WaitFlag::new();
        flag.prepare(WaitReason::Mutex);
        let result = flag.block(Some(Deadline::after(Duration::ZERO)));
        assert_eq!(result, BlockResult::DeadlineExpired);
        flag.cancel();
    }
}
