//! Wait disciplines: how a queue orders its waiters and what it does to
//! the owner's priority when a new waiter arrives.

use std::collections::VecDeque;
use std::sync::Arc;

use score_core::thread::ThreadRef;

/// Ordered list of threads blocked on one queue.
///
/// The discipline decides the order; the list itself is policy-free.
#[derive(Debug, Default)]
pub struct WaiterList {
    threads: VecDeque<ThreadRef>,
}

impl WaiterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn front(&self) -> Option<&ThreadRef> {
        self.threads.front()
    }

    pub fn push_back(&mut self, thread: ThreadRef) {
        self.threads.push_back(thread);
    }

    pub fn insert(&mut self, index: usize, thread: ThreadRef) {
        self.threads.insert(index, thread);
    }

    pub fn pop_front(&mut self) -> Option<ThreadRef> {
        self.threads.pop_front()
    }

    /// Position of a specific thread, by identity.
    pub fn position(&self, thread: &ThreadRef) -> Option<usize> {
        self.threads.iter().position(|t| Arc::ptr_eq(t, thread))
    }

    pub fn remove(&mut self, index: usize) -> Option<ThreadRef> {
        self.threads.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThreadRef> {
        self.threads.iter()
    }
}

/// Ordering and inheritance strategy of a thread queue.
///
/// Implementations must not block and must keep every operation bounded;
/// they run under the queue's spinlock.
pub trait ThreadQueueOps: Send + Sync {
    /// Discipline name used in log records.
    fn name(&self) -> &'static str;

    /// Inserts a thread that is about to block.
    fn enqueue(&self, waiters: &mut WaiterList, thread: &ThreadRef);

    /// Removes and returns the next thread to be granted the resource.
    fn dequeue(&self, waiters: &mut WaiterList) -> Option<ThreadRef>;

    /// Removes a specific thread (the timeout path). Returns false if the
    /// thread was already dequeued, meaning a grant is in flight.
    fn extract(&self, waiters: &mut WaiterList, thread: &ThreadRef) -> bool;

    /// Called after `enqueue` so the discipline can adjust the owner.
    fn boost(&self, _owner: &ThreadRef, _waiter: &ThreadRef) {}
}

/// Priority discipline with priority inheritance.
///
/// Waiters are kept in descending priority order, FIFO within a priority.
/// Whenever a waiter outranks the owner, the owner's effective priority is
/// raised to match, bounding priority-inversion delay.
///
/// Insertion scans for the first lower-priority slot, so its cost is linear
/// in the number of waiters. Queues on a lock are expected to stay short;
/// a discipline over a sub-chained or indexed structure can replace this
/// one without touching the queue itself.
pub struct PriorityInherit;

/// Shared instance of the priority-inheritance discipline.
pub static PRIORITY_INHERIT: PriorityInherit = PriorityInherit;

impl ThreadQueueOps for PriorityInherit {
    fn name(&self) -> &'static str {
        "priority-inherit"
    }

    fn enqueue(&self, waiters: &mut WaiterList, thread: &ThreadRef) {
        let priority = thread.current_priority();
        // First strictly-lower slot keeps FIFO order among equals.
        let slot = waiters.iter().position(|w| w.current_priority() < priority);
        match slot {
            Some(index) => waiters.insert(index, Arc::clone(thread)),
            None => waiters.push_back(Arc::clone(thread)),
        }
    }

    fn dequeue(&self, waiters: &mut WaiterList) -> Option<ThreadRef> {
        waiters.pop_front()
    }

    fn extract(&self, waiters: &mut WaiterList, thread: &ThreadRef) -> bool {
        match waiters.position(thread) {
            Some(index) => {
                waiters.remove(index);
                true
            }
            None => false,
        }
    }

    fn boost(&self, owner: &ThreadRef, waiter: &ThreadRef) {
        let priority = waiter.current_priority();
        if owner.raise_priority(priority) {
            log::debug!(
                "priority inheritance: owner {} boosted to {} by waiter {}",
                owner.id(),
                priority,
                waiter.id()
            );
        }
    }
}

/// Arrival-order discipline. No priority adjustment.
pub struct Fifo;

/// Shared instance of the FIFO discipline.
pub static FIFO: Fifo = Fifo;

impl ThreadQueueOps for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn enqueue(&self, waiters: &mut WaiterList, thread: &ThreadRef) {
        waiters.push_back(Arc::clone(thread));
    }

    fn dequeue(&self, waiters: &mut WaiterList) -> Option<ThreadRef> {
        waiters.pop_front()
    }

    fn extract(&self, waiters: &mut WaiterList, thread: &ThreadRef) -> bool {
        match waiters.position(thread) {
            Some(index) => {
                waiters.remove(index);
                true
            }
            None => false,
        }
    }
}
