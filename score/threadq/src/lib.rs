//! # score-threadq
//!
//! The thread queue: an ordered, intrusive wait-list attached to a lockable
//! resource. Threads enqueue themselves (optionally with a deadline) and
//! park; the owner surrenders the resource directly to the head of the
//! queue, so a woken thread holds the resource by construction.
//!
//! Ordering and priority-inheritance behavior is pluggable through the
//! [`ThreadQueueOps`] discipline, selected once per queue:
//!
//! - [`PriorityInherit`] orders waiters by priority (FIFO within a
//!   priority) and boosts the owner's effective priority to the highest
//!   waiter's.
//! - [`Fifo`] keeps arrival order and never touches priorities.
//!
//! Each enqueue call carries an ephemeral [`QueueContext`] with the wait
//! reason, the optional deadline, and the action to take when the enqueue
//! would deadlock on the caller itself.

pub mod context;
pub mod ops;
pub mod queue;

pub use context::{DeadlockAction, QueueContext};
pub use ops::{Fifo, PriorityInherit, ThreadQueueOps, WaiterList, FIFO, PRIORITY_INHERIT};
pub use queue::{EnqueueOutcome, QueueGuard, ThreadQueue};
