//! ISR disable/enable bookkeeping.
//!
//! A hosted executive cannot mask hardware interrupts; the thread-queue
//! spinlock supplies the actual atomicity. This module keeps the
//! disable/enable pairing of the bare-metal protocol so lock-protected
//! sections are written the same way they would be on a target, and so the
//! pairing can be checked: the nesting depth must balance, and a thread
//! must never park while its depth is non-zero.

use std::cell::Cell;

thread_local! {
    static DISABLE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Token returned by [`disable`]. Re-enables on drop, so every exit path
/// (success, timeout, fatal unwind) restores the previous level.
#[derive(Debug)]
#[must_use = "dropping the level immediately re-enables ISRs"]
pub struct IsrLevel(());

impl Drop for IsrLevel {
    fn drop(&mut self) {
        DISABLE_DEPTH.with(|depth| {
            let current = depth.get();
            assert!(current > 0, "ISR level underflow");
            depth.set(current - 1);
        });
    }
}

/// Disables interrupts for the calling context.
#[inline]
pub fn disable() -> IsrLevel {
    DISABLE_DEPTH.with(|depth| depth.set(depth.get() + 1));
    IsrLevel(())
}

/// Restores the interrupt level captured by a matching [`disable`].
#[inline]
pub fn enable(level: IsrLevel) {
    drop(level);
}

/// Current disable-nesting depth of the calling context.
pub fn nesting() -> u32 {
    DISABLE_DEPTH.with(|depth| depth.get())
}
