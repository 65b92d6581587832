//! Fatal-error reporting.
//!
//! Unrecoverable usage errors halt the system instead of returning an error
//! code: continuing from them would hang a thread forever or corrupt lock
//! state silently. On the hosted port the halt is a panic carrying the
//! fatal reason.

use thiserror::Error;

use crate::thread::ThreadId;

/// Reasons the synchronization layer halts the system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalReason {
    /// A thread attempted to block on a non-recursive mutex it already owns.
    #[error("self-deadlock: thread {thread} ({name}) already owns the mutex it is acquiring")]
    MutexSelfDeadlock { thread: ThreadId, name: String },

    /// A thread released a mutex it does not own.
    #[error("release by non-owner: thread {thread} ({name}) does not own the mutex it is releasing")]
    ReleaseNotOwner { thread: ThreadId, name: String },
}

/// Reports a fatal error and halts. Never returns.
pub fn fatal(reason: FatalReason) -> ! {
    log::error!("fatal error: {reason}");
    panic!("fatal error: {reason}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_format_with_thread_identity() {
        let reason = FatalReason::MutexSelfDeadlock {
            thread: ThreadId::for_tests(7),
            name: "worker".into(),
        };
        let text = reason.to_string();
        assert!(text.contains("self-deadlock"));
        assert!(text.contains("worker"));
    }

    #[test]
    #[should_panic(expected = "release by non-owner")]
    fn fatal_panics_with_reason() {
        fatal(FatalReason::ReleaseNotOwner {
            thread: ThreadId::for_tests(1),
            name: "intruder".into(),
        });
    }
}
