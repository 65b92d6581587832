//! Stress tests: many threads hammering shared mutexes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use score_core::thread::attach;
use score_core::{Deadline, Priority};
use score_mutex::{Mutex, MutexError};

static LOCK: Lazy<Mutex> = Lazy::new(Mutex::new);
static IN_SECTION: AtomicUsize = AtomicUsize::new(0);
static TOTAL: AtomicU64 = AtomicU64::new(0);

#[test]
fn many_threads_never_overlap_in_the_critical_section() {
    const THREADS: u8 = 8;
    const ITERATIONS: u64 = 200;

    let handles: Vec<_> = (0..THREADS)
        .map(|n| {
            thread::spawn(move || {
                // Mixed priorities keep the inheritance paths busy.
                attach(format!("worker-{n}"), Priority::new(4 + n % 4).unwrap());
                for _ in 0..ITERATIONS {
                    LOCK.acquire();
                    assert_eq!(
                        IN_SECTION.fetch_add(1, Ordering::SeqCst),
                        0,
                        "two threads inside the critical section"
                    );
                    TOTAL.fetch_add(1, Ordering::Relaxed);
                    assert_eq!(IN_SECTION.fetch_sub(1, Ordering::SeqCst), 1);
                    LOCK.release();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(TOTAL.load(Ordering::Relaxed), u64::from(THREADS) * ITERATIONS);
    assert!(!LOCK.is_owned());
}

#[test]
fn try_and_timed_acquires_survive_contention() {
    const THREADS: u8 = 4;
    const ATTEMPTS: u32 = 100;

    let mutex = Arc::new(Mutex::new());
    let grants = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|n| {
            let mutex = Arc::clone(&mutex);
            let grants = Arc::clone(&grants);
            thread::spawn(move || {
                attach(format!("mixed-{n}"), Priority::new(5).unwrap());
                for _ in 0..ATTEMPTS {
                    let granted = match mutex.try_acquire() {
                        Ok(()) => true,
                        Err(MutexError::Busy) => mutex
                            .acquire_timed(Deadline::after(Duration::from_millis(100)))
                            .is_ok(),
                        Err(err) => unreachable!("try_acquire cannot report {err}"),
                    };
                    if granted {
                        grants.fetch_add(1, Ordering::Relaxed);
                        mutex.release();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(grants.load(Ordering::Relaxed) > 0);
    assert!(!mutex.is_owned());
}
