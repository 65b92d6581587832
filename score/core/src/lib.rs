//! # score-core
//!
//! Foundation types for the SCORE synchronization layer: thread control
//! blocks with priorities and resource accounting, the per-thread wait flag
//! that blocking protocols park on, ISR-level bookkeeping for the hosted
//! port, deadlines for timed operations, and fatal-error reporting.
//!
//! ## Module Overview
//!
//! - [`priority`] - Type-safe scheduling priorities
//! - [`thread`] - Thread control blocks and the executing-thread handle
//! - [`wait`] - Per-thread park/wake flag used by thread queues
//! - [`isr`] - Interrupt disable/enable pairing (bookkeeping on hosts)
//! - [`time`] - Absolute deadlines for timed blocking
//! - [`fatal`] - Non-returning reporting of unrecoverable usage errors

pub mod fatal;
pub mod isr;
pub mod priority;
pub mod thread;
pub mod time;
pub mod wait;

pub use fatal::{fatal, FatalReason};
pub use priority::{InvalidPriority, Priority};
pub use thread::{ThreadControl, ThreadId, ThreadRef};
pub use time::Deadline;
pub use wait::{BlockResult, WaitFlag, WaitReason};
