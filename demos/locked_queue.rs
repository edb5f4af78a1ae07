//! Three participants share one bounded queue serialized by a Filter lock.

use std::thread;

use softlock::spins::backoff::Filter;
use softlock::LockedQueue;
use tracing_subscriber::EnvFilter;

const N: usize = 3;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("softlock=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let queue = LockedQueue::<String, Filter<N>, 8>::new();

    let handles: Vec<_> = (0..N).map(|_| queue.handle().unwrap()).collect();
    thread::scope(|s| {
        for mut handle in handles {
            s.spawn(move || {
                let id = handle.id();
                for round in 0..3 {
                    let message = format!("participant {id}, round {round}");
                    if let Err(message) = handle.enqueue(message) {
                        println!("queue full, dropped {message:?}");
                    }
                    if let Some(message) = handle.dequeue() {
                        println!("participant {id} took {message:?}");
                    }
                }
            });
        }
    });

    let mut handle = queue.handle().unwrap();
    while let Some(message) = handle.dequeue() {
        println!("left over: {message:?}");
    }
}
