//! The plain, non-recursive priority-inheritance mutex.

use core::fmt;

use score_core::fatal::{fatal, FatalReason};
use score_core::thread::{self, ThreadId, ThreadRef};
use score_core::time::Deadline;
use score_core::wait::WaitReason;
use score_threadq::{EnqueueOutcome, QueueContext, QueueGuard, ThreadQueue, PRIORITY_INHERIT};
use thiserror::Error;

/// Recoverable mutex outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MutexError {
    /// The mutex is held by another thread (the `EBUSY` flavor).
    #[error("mutex is held by another thread")]
    Busy,
    /// The deadline elapsed before ownership was granted (the `ETIMEDOUT`
    /// flavor). The caller does not own the mutex.
    #[error("timed out waiting for the mutex")]
    TimedOut,
}

/// A priority-inheritance mutex.
///
/// Exactly one thread owns the mutex at a time. Waiters are served in
/// priority order, FIFO within a priority, and the owner inherits the
/// highest waiter's effective priority until it releases its last held
/// resource.
///
/// The mutex must be free when dropped; dropping it while owned or with
/// waiters is a usage error caught by a debug assertion.
pub struct Mutex {
    pub(crate) queue: ThreadQueue,
}

impl Mutex {
    /// Creates a free mutex.
    pub fn new() -> Self {
        Self {
            queue: ThreadQueue::new(&PRIORITY_INHERIT),
        }
    }

    /// Acquires the mutex, blocking until the calling thread owns it.
    ///
    /// # Fatal errors
    ///
    /// Acquiring a mutex the calling thread already owns is a
    /// self-deadlock and halts the system.
    pub fn acquire(&self) {
        let executing = thread::current();
        match self.seize(&executing, None) {
            Ok(()) => {}
            Err(err) => unreachable!("untimed acquire cannot fail: {err}"),
        }
    }

    /// Acquires the mutex, giving up at `deadline`.
    ///
    /// On `Err(TimedOut)` the calling thread does not own the mutex and
    /// ownership is unchanged.
    pub fn acquire_timed(&self, deadline: Deadline) -> Result<(), MutexError> {
        let executing = thread::current();
        self.seize(&executing, Some(deadline))
    }

    /// Claims the mutex if it is free; never suspends.
    pub fn try_acquire(&self) -> Result<(), MutexError> {
        let executing = thread::current();
        let mut guard = self.queue.lock();
        if guard.owner().is_none() {
            guard.set_owner(ThreadRef::clone(&executing));
            executing.resource_count_increment();
            Ok(())
        } else {
            Err(MutexError::Busy)
        }
    }

    /// Releases the mutex, handing it directly to the highest-priority
    /// waiter if any thread is blocked.
    ///
    /// # Fatal errors
    ///
    /// Releasing a mutex the calling thread does not own halts the system.
    pub fn release(&self) {
        let executing = thread::current();
        let guard = self.queue.lock();
        self.release_locked(guard, &executing);
    }

    /// The id of the owning thread, if any. Diagnostic.
    pub fn owner(&self) -> Option<ThreadId> {
        self.queue.lock().owner().map(|t| t.id())
    }

    /// Returns true if some thread owns the mutex.
    pub fn is_owned(&self) -> bool {
        self.queue.lock().owner().is_some()
    }

    /// Fast path plus contended path, shared by the timed and untimed
    /// acquires (and by the recursive wrapper for its non-nested cases).
    pub(crate) fn seize(
        &self,
        executing: &ThreadRef,
        deadline: Option<Deadline>,
    ) -> Result<(), MutexError> {
        let mut guard = self.queue.lock();
        if guard.owner().is_none() {
            guard.set_owner(ThreadRef::clone(executing));
            executing.resource_count_increment();
            log::trace!("mutex claimed by {} on the fast path", executing.id());
            return Ok(());
        }
        self.block_on(guard, executing, deadline)
    }

    /// Contended path: enqueue under the already-held guard and park.
    pub(crate) fn block_on(
        &self,
        guard: QueueGuard<'_>,
        executing: &ThreadRef,
        deadline: Option<Deadline>,
    ) -> Result<(), MutexError> {
        let mut ctx = QueueContext::new(WaitReason::Mutex);
        if let Some(deadline) = deadline {
            ctx = ctx.with_deadline(deadline);
        }
        match self.queue.enqueue(guard, executing, &ctx) {
            EnqueueOutcome::Granted => Ok(()),
            EnqueueOutcome::TimedOut => Err(MutexError::TimedOut),
            EnqueueOutcome::Deadlock => unreachable!("fatal deadlock callout never returns"),
        }
    }

    /// Release with the critical section already entered.
    pub(crate) fn release_locked(&self, mut guard: QueueGuard<'_>, executing: &ThreadRef) {
        if !guard.owner_is(executing) {
            fatal(FatalReason::ReleaseNotOwner {
                thread: executing.id(),
                name: executing.name().to_owned(),
            });
        }
        let remaining = executing.resource_count_decrement();
        if remaining == 0 {
            // Last resource given up: any inherited boost ends here.
            executing.restore_base_priority();
        }
        if guard.has_waiters() {
            self.queue.surrender(guard, executing);
        } else {
            guard.clear_owner();
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.queue.lock();
        f.debug_struct("Mutex")
            .field("owner", &guard.owner().map(|t| t.id()))
            .field("waiters", &guard.waiter_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_path_claims_and_releases() {
        let mutex = Mutex::new();
        assert!(!mutex.is_owned());

        mutex.acquire();
        let me = thread::current();
        assert_eq!(mutex.owner(), Some(me.id()));
        assert_eq!(me.resource_count(), 1);

        mutex.release();
        assert!(!mutex.is_owned());
        assert_eq!(me.resource_count(), 0);
    }

    #[test]
    fn try_acquire_succeeds_when_free() {
        let mutex = Mutex::new();
        assert!(mutex.try_acquire().is_ok());
        assert!(mutex.is_owned());
        mutex.release();
    }

    #[test]
    fn try_acquire_by_owner_reports_busy() {
        let mutex = Mutex::new();
        mutex.acquire();
        // The plain mutex is not recursive, but try never deadlocks.
        assert_eq!(mutex.try_acquire(), Err(MutexError::Busy));
        mutex.release();
    }

    #[test]
    #[should_panic(expected = "self-deadlock")]
    fn reacquire_by_owner_is_fatal() {
        let mutex = Mutex::new();
        mutex.acquire();
        mutex.acquire();
    }

    #[test]
    #[should_panic(expected = "release by non-owner")]
    fn release_of_free_mutex_is_fatal() {
        let mutex = Mutex::new();
        mutex.release();
    }
}
