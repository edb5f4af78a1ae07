//! LockTwo in action: it never deadlocks, but it can let both participants
//! in.
//!
//! A participant first waits for the other flag to drop and only then raises
//! its own. Two participants arriving together can both see the other flag
//! lowered and both enter. The demo repeats the race and counts how often
//! the critical section was shared.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use softlock::spins::LockTwo;
use softlock::RawLock;
use tracing_subscriber::EnvFilter;

const ROUNDS: usize = 1_000;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("softlock=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let lock = LockTwo::new();
    let inside = AtomicUsize::new(0);
    let shared = AtomicUsize::new(0);
    let start = Barrier::new(2);

    thread::scope(|s| {
        for id in 0..2 {
            let (lock, inside, shared, start) = (&lock, &inside, &shared, &start);
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    start.wait();
                    lock.lock(id);
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        shared.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                    lock.unlock(id);
                }
            });
        }
    });

    let shared = shared.into_inner();
    println!("both rounds finished: no deadlock in {ROUNDS} rounds");
    if shared > 0 {
        println!("mutual exclusion violated: both participants were inside {shared} times");
    } else {
        println!("this run got lucky, the participants never overlapped");
    }
}
