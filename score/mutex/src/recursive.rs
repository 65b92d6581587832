//! Recursive mutex: a plain mutex composed with a nesting counter.

use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use score_core::fatal::{fatal, FatalReason};
use score_core::thread::{self, ThreadId, ThreadRef};
use score_core::time::Deadline;

use crate::mutex::{Mutex, MutexError};

enum Claim {
    Free,
    Nested,
    Contended,
}

/// A mutex the owning thread may re-acquire without blocking.
///
/// Re-acquisition by the owner increments a nesting counter and touches
/// neither the wait queue nor priority inheritance; every other case
/// behaves exactly like the plain [`Mutex`]. While `nest_level > 0` the
/// counter's invariant is that the mutex is owned by the nesting thread,
/// and the depth of ownership is `nest_level + 1`.
pub struct RecursiveMutex {
    mutex: Mutex,
    /// Mutated only by the owning thread while holding the queue lock.
    nest_level: AtomicU32,
}

impl RecursiveMutex {
    /// Creates a free recursive mutex.
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(),
            nest_level: AtomicU32::new(0),
        }
    }

    /// Acquires the mutex, blocking until the calling thread owns it.
    /// Never blocks when the calling thread is already the owner.
    pub fn acquire(&self) {
        let executing = thread::current();
        match self.seize(&executing, None) {
            Ok(()) => {}
            Err(err) => unreachable!("untimed acquire cannot fail: {err}"),
        }
    }

    /// Acquires the mutex, giving up at `deadline`. Re-acquisition by the
    /// owner succeeds immediately regardless of the deadline.
    pub fn acquire_timed(&self, deadline: Deadline) -> Result<(), MutexError> {
        let executing = thread::current();
        self.seize(&executing, Some(deadline))
    }

    /// Claims or re-claims the mutex without suspending.
    pub fn try_acquire(&self) -> Result<(), MutexError> {
        let executing = thread::current();
        let mut guard = self.mutex.queue.lock();
        match self.classify(&guard, &executing) {
            Claim::Free => {
                guard.set_owner(ThreadRef::clone(&executing));
                executing.resource_count_increment();
                Ok(())
            }
            Claim::Nested => {
                self.nest_level.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Claim::Contended => Err(MutexError::Busy),
        }
    }

    /// Releases one level of ownership; the mutex itself is released only
    /// when the outermost acquire is undone.
    ///
    /// # Fatal errors
    ///
    /// Releasing a mutex the calling thread does not own halts the system.
    pub fn release(&self) {
        let executing = thread::current();
        let guard = self.mutex.queue.lock();
        if !guard.owner_is(&executing) {
            fatal(FatalReason::ReleaseNotOwner {
                thread: executing.id(),
                name: executing.name().to_owned(),
            });
        }
        let nested = self.nest_level.load(Ordering::Relaxed);
        if nested > 0 {
            // Ownership is retained; no queue interaction.
            self.nest_level.store(nested - 1, Ordering::Relaxed);
            return;
        }
        self.mutex.release_locked(guard, &executing);
    }

    /// The id of the owning thread, if any. Diagnostic.
    pub fn owner(&self) -> Option<ThreadId> {
        self.mutex.owner()
    }

    /// Current depth of ownership: 0 when free, `nest_level + 1` when
    /// owned. Diagnostic.
    pub fn depth(&self) -> u32 {
        let guard = self.mutex.queue.lock();
        if guard.owner().is_some() {
            self.nest_level.load(Ordering::Relaxed) + 1
        } else {
            0
        }
    }

    fn seize(&self, executing: &ThreadRef, deadline: Option<Deadline>) -> Result<(), MutexError> {
        let mut guard = self.mutex.queue.lock();
        match self.classify(&guard, executing) {
            Claim::Free => {
                guard.set_owner(ThreadRef::clone(executing));
                executing.resource_count_increment();
                Ok(())
            }
            Claim::Nested => {
                self.nest_level.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            // The self-owner case was peeled off above, so the enqueue-time
            // deadlock check cannot fire here.
            Claim::Contended => self.mutex.block_on(guard, executing, deadline),
        }
    }

    fn classify(&self, guard: &score_threadq::QueueGuard<'_>, executing: &ThreadRef) -> Claim {
        match guard.owner() {
            None => Claim::Free,
            Some(owner) if Arc::ptr_eq(owner, executing) => Claim::Nested,
            Some(_) => Claim::Contended,
        }
    }
}

impl Default for RecursiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecursiveMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursiveMutex")
            .field("owner", &self.owner())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_acquires_count_and_unwind() {
        let mutex = RecursiveMutex::new();
        let me = thread::current();

        mutex.acquire();
        mutex.acquire();
        mutex.acquire();
        assert_eq!(mutex.depth(), 3);
        assert_eq!(mutex.owner(), Some(me.id()));

        mutex.release();
        assert_eq!(mutex.depth(), 2);
        assert_eq!(mutex.owner(), Some(me.id()));

        mutex.release();
        mutex.release();
        assert_eq!(mutex.depth(), 0);
        assert_eq!(mutex.owner(), None);
    }

    #[test]
    fn nested_try_and_timed_succeed_for_owner() {
        let mutex = RecursiveMutex::new();
        mutex.acquire();
        assert!(mutex.try_acquire().is_ok());
        // A deadline in the past is irrelevant for the owner.
        assert!(mutex
            .acquire_timed(Deadline::after(std::time::Duration::ZERO))
            .is_ok());
        assert_eq!(mutex.depth(), 3);
        mutex.release();
        mutex.release();
        mutex.release();
    }

    #[test]
    fn resource_count_tracks_only_outermost_ownership() {
        let mutex = RecursiveMutex::new();
        let me = thread::current();
        let before = me.resource_count();

        mutex.acquire();
        mutex.acquire();
        assert_eq!(me.resource_count(), before + 1);

        mutex.release();
        mutex.release();
        assert_eq!(me.resource_count(), before);
    }

    #[test]
    #[should_panic(expected = "release by non-owner")]
    fn release_of_free_recursive_mutex_is_fatal() {
        let mutex = RecursiveMutex::new();
        mutex.release();
    }
}
