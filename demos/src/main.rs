//! Priority-inversion demonstration.
//!
//! A low-priority thread grabs a shared mutex, then a high-priority thread
//! blocks on it. Without priority inheritance, a medium-priority hog could
//! starve the low thread and, through it, the high one. With inheritance
//! the low owner runs at the high waiter's priority until it releases.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use score_core::thread::attach;
use score_core::Priority;
use score_mutex::Mutex;

fn report(started: Instant, who: &str, what: &str) {
    println!("[{:>4} ms] {:<4} {}", started.elapsed().as_millis(), who, what);
}

fn main() {
    let started = Instant::now();
    let shared = Arc::new(Mutex::new());
    let (held_tx, held_rx) = mpsc::channel::<()>();

    let low_handle = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            let me = attach("low", Priority::new(2).unwrap());
            shared.acquire();
            report(started, "low", "acquired the mutex");
            held_tx.send(()).unwrap();

            // Simulate a long critical section, watching for the boost.
            let mut boosted = false;
            let work_done = Instant::now() + Duration::from_millis(100);
            while Instant::now() < work_done {
                let current = me.current_priority();
                if !boosted && current > me.base_priority() {
                    boosted = true;
                    report(
                        started,
                        "low",
                        &format!("inherited priority {current} from a waiter"),
                    );
                }
                thread::sleep(Duration::from_millis(5));
            }

            shared.release();
            report(
                started,
                "low",
                &format!(
                    "released the mutex, back at priority {}",
                    me.current_priority()
                ),
            );
        })
    };

    held_rx.recv().unwrap();

    let high_handle = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            attach("high", Priority::new(8).unwrap());
            report(started, "high", "needs the mutex, blocking");
            shared.acquire();
            report(started, "high", "got the mutex");
            shared.release();
        })
    };

    low_handle.join().unwrap();
    high_handle.join().unwrap();
    report(started, "main", "done; no thread was starved");
}
