//! The thread queue proper: a lockable resource's wait list plus its owner.
//!
//! All mutation of the owner and the wait list happens under the queue's
//! spinlock, held for bounded O(1) sections with ISRs disabled. Blocking
//! happens strictly after the lock is dropped, on the enqueuing thread's
//! own wait flag.

use std::sync::Arc;

use score_core::fatal::{fatal, FatalReason};
use score_core::isr::{self, IsrLevel};
use score_core::thread::ThreadRef;
use score_core::wait::BlockResult;
use spin::{Mutex as SpinMutex, MutexGuard as SpinMutexGuard};

use crate::context::{DeadlockAction, QueueContext};
use crate::ops::{ThreadQueueOps, WaiterList};

/// Result of a blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The thread was dequeued by a surrender and owns the resource.
    Granted,
    /// The deadline elapsed; the thread removed itself and owns nothing.
    TimedOut,
    /// The enqueue would have blocked on the caller itself and the context
    /// selected [`DeadlockAction::Status`].
    Deadlock,
}

struct QueueInner {
    owner: Option<ThreadRef>,
    waiters: WaiterList,
}

/// Critical-section guard over a queue: ISRs disabled, spinlock held.
///
/// Dropping the guard releases the lock and then restores the ISR level,
/// on every exit path.
pub struct QueueGuard<'a> {
    inner: SpinMutexGuard<'a, QueueInner>,
    _level: IsrLevel,
}

impl QueueGuard<'_> {
    /// The thread currently owning the resource, if any.
    pub fn owner(&self) -> Option<&ThreadRef> {
        self.inner.owner.as_ref()
    }

    /// Returns true if `thread` is the current owner.
    pub fn owner_is(&self, thread: &ThreadRef) -> bool {
        matches!(&self.inner.owner, Some(owner) if Arc::ptr_eq(owner, thread))
    }

    /// Records `thread` as the owner.
    pub fn set_owner(&mut self, thread: ThreadRef) {
        debug_assert!(self.inner.owner.is_none(), "queue already has an owner");
        self.inner.owner = Some(thread);
    }

    /// Clears the owner. Only valid while no thread is waiting.
    pub fn clear_owner(&mut self) {
        debug_assert!(
            self.inner.waiters.is_empty(),
            "owner cleared while threads are waiting"
        );
        self.inner.owner = None;
    }

    pub fn has_waiters(&self) -> bool {
        !self.inner.waiters.is_empty()
    }

    pub fn waiter_count(&self) -> usize {
        self.inner.waiters.len()
    }
}

/// An ordered, blocking wait-list attached to a resource.
pub struct ThreadQueue {
    inner: SpinMutex<QueueInner>,
    ops: &'static dyn ThreadQueueOps,
}

impl ThreadQueue {
    /// Creates an empty queue using the given wait discipline.
    pub fn new(ops: &'static dyn ThreadQueueOps) -> Self {
        Self {
            inner: SpinMutex::new(QueueInner {
                owner: None,
                waiters: WaiterList::new(),
            }),
            ops,
        }
    }

    /// Enters the queue's critical section: ISRs off, spinlock held.
    pub fn lock(&self) -> QueueGuard<'_> {
        let level = isr::disable();
        let inner = self.inner.lock();
        QueueGuard {
            inner,
            _level: level,
        }
    }

    /// Blocks `executing` on the queue until the owner surrenders to it or
    /// the context's deadline passes.
    ///
    /// Consumes the guard: the lock is released and ISRs are restored
    /// before the thread parks. The caller must have verified that the
    /// queue has an owner, checked with a debug assertion; a thread woken
    /// by a grant is the new owner, with no spurious wakeups.
    pub fn enqueue(
        &self,
        mut guard: QueueGuard<'_>,
        executing: &ThreadRef,
        ctx: &QueueContext,
    ) -> EnqueueOutcome {
        debug_assert!(
            guard.inner.owner.is_some(),
            "enqueue requires an owned queue"
        );
        let owner = guard.inner.owner.clone();

        if matches!(&owner, Some(owner) if Arc::ptr_eq(owner, executing)) {
            match ctx.deadlock_action() {
                DeadlockAction::Fatal => fatal(FatalReason::MutexSelfDeadlock {
                    thread: executing.id(),
                    name: executing.name().to_owned(),
                }),
                DeadlockAction::Status => {
                    drop(guard);
                    return EnqueueOutcome::Deadlock;
                }
            }
        }

        // Arm the flag while still holding the lock; a surrender cannot
        // race ahead of it.
        executing.wait_flag().prepare(ctx.wait_reason());
        self.ops.enqueue(&mut guard.inner.waiters, executing);
        if let Some(owner) = &owner {
            self.ops.boost(owner, executing);
        }
        log::trace!(
            "thread {} blocking on {} queue ({} waiting)",
            executing.id(),
            self.ops.name(),
            guard.inner.waiters.len()
        );
        drop(guard);

        match executing.wait_flag().block(ctx.deadline()) {
            BlockResult::Granted => EnqueueOutcome::Granted,
            BlockResult::DeadlineExpired => self.enqueue_timed_out(executing),
        }
    }

    /// Timeout path: remove ourselves, unless a surrender beat us to it.
    fn enqueue_timed_out(&self, executing: &ThreadRef) -> EnqueueOutcome {
        let mut guard = self.lock();
        if self.ops.extract(&mut guard.inner.waiters, executing) {
            executing.wait_flag().cancel();
            drop(guard);
            log::debug!(
                "thread {} timed out on {} queue",
                executing.id(),
                self.ops.name()
            );
            EnqueueOutcome::TimedOut
        } else {
            // Already dequeued by a surrender: the grant is in flight and
            // takes precedence over the expiry.
            drop(guard);
            match executing.wait_flag().block(None) {
                BlockResult::Granted => EnqueueOutcome::Granted,
                BlockResult::DeadlineExpired => unreachable!("retry wait has no deadline"),
            }
        }
    }

    /// Hands the resource from `executing` to the head waiter, waking it.
    ///
    /// Returns the new owner, or `None` if no thread was waiting and the
    /// queue is now free. The transition is atomic: other threads never
    /// observe the queue unowned while waiters exist.
    pub fn surrender(&self, mut guard: QueueGuard<'_>, executing: &ThreadRef) -> Option<ThreadRef> {
        debug_assert!(guard.owner_is(executing), "surrender by non-owner");
        match self.ops.dequeue(&mut guard.inner.waiters) {
            Some(next) => {
                guard.inner.owner = Some(Arc::clone(&next));
                next.resource_count_increment();
                log::trace!(
                    "queue surrendered by {} to {} ({} still waiting)",
                    executing.id(),
                    next.id(),
                    guard.inner.waiters.len()
                );
                drop(guard);
                next.wait_flag().grant();
                Some(next)
            }
            None => {
                guard.inner.owner = None;
                None
            }
        }
    }
}

impl Drop for ThreadQueue {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let inner = self.inner.get_mut();
        debug_assert!(
            inner.owner.is_none() && inner.waiters.is_empty(),
            "thread queue dropped while owned or with waiters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::PRIORITY_INHERIT;
    use score_core::thread::ThreadControl;
    use score_core::wait::WaitReason;
    use score_core::Priority;

    #[test]
    fn lock_disables_isrs_for_the_critical_section() {
        let queue = ThreadQueue::new(&PRIORITY_INHERIT);
        assert_eq!(isr::nesting(), 0);
        {
            let _guard = queue.lock();
            assert_eq!(isr::nesting(), 1);
        }
        assert_eq!(isr::nesting(), 0);
    }

    #[test]
    fn owner_bookkeeping_under_the_guard() {
        let queue = ThreadQueue::new(&PRIORITY_INHERIT);
        let thread = ThreadControl::new("owner", Priority::new(5).unwrap());

        let mut guard = queue.lock();
        assert!(guard.owner().is_none());
        guard.set_owner(Arc::clone(&thread));
        assert!(guard.owner_is(&thread));
        assert!(!guard.has_waiters());
        guard.clear_owner();
        assert!(guard.owner().is_none());
    }

    #[test]
    #[should_panic(expected = "dropped while owned")]
    fn dropping_an_owned_queue_is_a_usage_error() {
        let queue = ThreadQueue::new(&PRIORITY_INHERIT);
        let owner = ThreadControl::new("owner", Priority::new(5).unwrap());
        queue.lock().set_owner(owner);
        drop(queue);
    }

    #[test]
    #[should_panic(expected = "enqueue requires an owned queue")]
    fn enqueue_on_an_unowned_queue_is_a_usage_error() {
        let queue = ThreadQueue::new(&PRIORITY_INHERIT);
        let waiter = ThreadControl::new("waiter", Priority::new(5).unwrap());
        let ctx = QueueContext::new(WaitReason::Mutex);
        queue.enqueue(queue.lock(), &waiter, &ctx);
    }
}
