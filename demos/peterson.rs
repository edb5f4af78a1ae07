//! Two participants arrive at once and Peterson's lock lets them in one at a
//! time.
//!
//! Each participant raises its flag, yields the turn to the other one and
//! waits. The `TRACE` events show the flag, turn, entry and release of each
//! participant; override the default filter with `RUST_LOG`.

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use softlock::spins::Peterson;
use softlock::Mutex;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("softlock=trace"));
    tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true).init();

    let log = Mutex::<Vec<String>, Peterson>::new(Vec::new());
    let start = Barrier::new(2);
    let participants: Vec<_> = (0..2).map(|_| log.participant().unwrap()).collect();

    thread::scope(|s| {
        for mut participant in participants {
            let id = participant.id();
            let start = &start;
            thread::Builder::new()
                .name(format!("participant-{id}"))
                .spawn_scoped(s, move || {
                    start.wait();
                    participant.lock_then(|log| {
                        println!("participant {id}: working in the critical section");
                        log.push(format!("participant {id} entered"));
                        thread::sleep(Duration::from_millis(100));
                        log.push(format!("participant {id} left"));
                    });
                })
                .unwrap();
        }
    });

    // Entries and exits never interleave.
    for line in log.into_inner() {
        println!("{line}");
    }
}
