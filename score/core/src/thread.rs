//! Thread control blocks and the executing-thread handle.
//!
//! A [`ThreadControl`] is the synchronization layer's view of a thread: its
//! identity, base and effective priorities, how many resources it currently
//! holds, and the wait flag it parks on. Host threads bind themselves to a
//! control block with [`attach`]; [`current`] returns the binding for the
//! calling thread, creating a default one on first use so every caller has
//! an identity.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::priority::Priority;
use crate::wait::WaitFlag;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a thread control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u64);

impl ThreadId {
    fn next() -> Self {
        ThreadId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(raw: u64) -> Self {
        ThreadId(raw)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to a thread control block.
pub type ThreadRef = Arc<ThreadControl>;

/// Per-thread state consumed by the blocking protocols.
pub struct ThreadControl {
    id: ThreadId,
    name: String,
    base_priority: Priority,
    current_priority: AtomicU8,
    resource_count: AtomicU32,
    wait: WaitFlag,
}

impl ThreadControl {
    /// Creates a detached control block. Use [`attach`] to also bind it to
    /// the calling host thread.
    pub fn new(name: impl Into<String>, priority: Priority) -> ThreadRef {
        Arc::new(ThreadControl {
            id: ThreadId::next(),
            name: name.into(),
            base_priority: priority,
            current_priority: AtomicU8::new(priority.raw()),
            resource_count: AtomicU32::new(0),
            wait: WaitFlag::new(),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The priority the thread was created with.
    pub fn base_priority(&self) -> Priority {
        self.base_priority
    }

    /// The effective scheduling priority, including any inherited boost.
    pub fn current_priority(&self) -> Priority {
        Priority::new_unchecked(self.current_priority.load(Ordering::Acquire))
    }

    /// Raises the effective priority to `to` if that is an increase.
    /// Returns whether the priority changed.
    pub fn raise_priority(&self, to: Priority) -> bool {
        let mut current = self.current_priority.load(Ordering::Acquire);
        loop {
            if to.raw() <= current {
                return false;
            }
            match self.current_priority.compare_exchange(
                current,
                to.raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Drops any inherited boost, reverting to the base priority.
    pub fn restore_base_priority(&self) {
        self.current_priority
            .store(self.base_priority.raw(), Ordering::Release);
    }

    /// Number of resources (mutexes) the thread currently holds.
    pub fn resource_count(&self) -> u32 {
        self.resource_count.load(Ordering::Acquire)
    }

    /// Records that the thread claimed one more resource.
    pub fn resource_count_increment(&self) {
        self.resource_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Records that the thread gave up a resource. Returns the new count.
    pub fn resource_count_decrement(&self) -> u32 {
        let previous = self.resource_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "resource count underflow");
        previous - 1
    }

    /// The wait flag this thread parks on while blocked.
    pub fn wait_flag(&self) -> &WaitFlag {
        &self.wait
    }

    /// Returns true if the thread is currently parked on a wait list.
    pub fn is_blocked(&self) -> bool {
        self.wait.reason().is_some()
    }
}

impl fmt::Debug for ThreadControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadControl")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_priority", &self.base_priority)
            .field("current_priority", &self.current_priority())
            .field("resource_count", &self.resource_count())
            .finish()
    }
}

thread_local! {
    static EXECUTING: RefCell<Option<ThreadRef>> = const { RefCell::new(None) };
}

/// Binds the calling host thread to a new control block.
///
/// # Panics
///
/// Panics if the calling thread is already attached.
pub fn attach(name: impl Into<String>, priority: Priority) -> ThreadRef {
    let control = ThreadControl::new(name, priority);
    EXECUTING.with(|executing| {
        let mut slot = executing.borrow_mut();
        assert!(slot.is_none(), "host thread is already attached");
        *slot = Some(Arc::clone(&control));
    });
    control
}

/// The control block of the calling thread, if it has one.
pub fn try_current() -> Option<ThreadRef> {
    EXECUTING.with(|executing| executing.borrow().clone())
}

/// The control block of the calling thread.
///
/// A thread that never called [`attach`] is attached on first use with the
/// host thread's name and [`Priority::DEFAULT`].
pub fn current() -> ThreadRef {
    if let Some(existing) = try_current() {
        return existing;
    }
    let name = std::thread::current()
        .name()
        .unwrap_or("anonymous")
        .to_owned();
    attach(name, Priority::DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_attaches_once() {
        assert!(try_current().is_none());
        let first = current();
        let second = current();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.base_priority(), Priority::DEFAULT);
    }

    #[test]
    fn attach_binds_name_and_priority() {
        let me = attach("unit", Priority::new(7).unwrap());
        assert_eq!(me.name(), "unit");
        assert_eq!(me.current_priority().raw(), 7);
        let again = current();
        assert!(Arc::ptr_eq(&me, &again));
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_panics() {
        let _first = attach("first", Priority::MIN);
        let _second = attach("second", Priority::MIN);
    }

    #[test]
    fn priority_only_raises_upward() {
        let thread = ThreadControl::new("prio", Priority::new(5).unwrap());
        assert!(!thread.raise_priority(Priority::new(3).unwrap()));
        assert_eq!(thread.current_priority().raw(), 5);
        assert!(thread.raise_priority(Priority::new(9).unwrap()));
        assert_eq!(thread.current_priority().raw(), 9);
        thread.restore_base_priority();
        assert_eq!(thread.current_priority().raw(), 5);
    }

    #[test]
    fn resource_count_round_trip() {
        let thread = ThreadControl::new("resources", Priority::MIN);
        assert_eq!(thread.resource_count(), 0);
        thread.resource_count_increment();
        thread.resource_count_increment();
        assert_eq!(thread.resource_count(), 2);
        assert_eq!(thread.resource_count_decrement(), 1);
        assert_eq!(thread.resource_count_decrement(), 0);
    }
}
