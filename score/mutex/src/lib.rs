//! # score-mutex
//!
//! Priority-inheritance mutexes built on the thread-queue layer.
//!
//! [`Mutex`] is the plain, non-recursive primitive every higher-level lock
//! is built from: an owner reference plus a priority-ordered wait queue.
//! The uncontended paths are O(1) and never suspend; contended acquires
//! park on the queue and are handed ownership directly by the releasing
//! thread, with the owner's effective priority boosted to the highest
//! waiter's in between.
//!
//! [`RecursiveMutex`] composes a plain mutex with a nesting counter so the
//! owning thread may re-acquire without blocking.
//!
//! Recoverable outcomes (`Busy`, `TimedOut`) are ordinary results; usage
//! errors (self-deadlock, release by a non-owner) are fatal and halt the
//! system rather than hanging a thread forever.

pub mod mutex;
pub mod recursive;

pub use mutex::{Mutex, MutexError};
pub use recursive::RecursiveMutex;
