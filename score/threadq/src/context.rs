//! Per-call queue operation context.
//!
//! The context is an ephemeral, stack-allocated parameter object carrying
//! the configuration of one enqueue: the thread-state value to record while
//! blocked, the optional deadline, and the deadlock action. It is passed
//! explicitly by reference and never stored globally.

use score_core::time::Deadline;
use score_core::wait::WaitReason;

/// What [`ThreadQueue::enqueue`](crate::ThreadQueue::enqueue) does when the
/// enqueuing thread already owns the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlockAction {
    /// Halt the system. Self-acquisition of a non-recursive lock is a
    /// programming defect the thread could never recover from on its own.
    Fatal,
    /// Report [`EnqueueOutcome::Deadlock`](crate::EnqueueOutcome::Deadlock)
    /// to the caller, for surfaces that map it onto an error code.
    Status,
}

/// Configuration of a single enqueue operation.
#[derive(Debug, Clone, Copy)]
pub struct QueueContext {
    reason: WaitReason,
    deadline: Option<Deadline>,
    deadlock: DeadlockAction,
}

impl QueueContext {
    /// Context for an untimed enqueue with the fatal deadlock action.
    pub fn new(reason: WaitReason) -> Self {
        Self {
            reason,
            deadline: None,
            deadlock: DeadlockAction::Fatal,
        }
    }

    /// Bounds the enqueue by an absolute deadline.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Overrides the deadlock action.
    pub fn with_deadlock(mut self, action: DeadlockAction) -> Self {
        self.deadlock = action;
        self
    }

    pub fn wait_reason(&self) -> WaitReason {
        self.reason
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    pub fn deadlock_action(&self) -> DeadlockAction {
        self.deadlock
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_are_untimed_and_fatal() {
        let ctx = QueueContext::new(WaitReason::Mutex);
        assert_eq!(ctx.wait_reason(), WaitReason::Mutex);
        assert!(ctx.deadline().is_none());
        assert_eq!(ctx.deadlock_action(), DeadlockAction::Fatal);
    }

    #[test]
    fn builder_overrides_apply() {
        let ctx = QueueContext::new(WaitReason::Semaphore)
            .with_deadline(Deadline::after(Duration::from_millis(5)))
            .with_deadlock(DeadlockAction::Status);
        assert!(ctx.deadline().is_some());
        assert_eq!(ctx.deadlock_action(), DeadlockAction::Status);
    }
}
