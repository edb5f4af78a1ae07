//! Five participants climb the levels of a Filter lock.
//!
//! Each level holds back at least one of the participants still competing,
//! so only one reaches the top and enters. The `TRACE` events show every
//! level passed; override the default filter with `RUST_LOG`.

use std::thread;
use std::time::Duration;

use softlock::spins::Filter;
use softlock::Mutex;
use tracing_subscriber::EnvFilter;

const N: usize = 5;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("softlock=trace"));
    tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true).init();

    let counter = Mutex::<u64, Filter<N>>::new(0);
    let participants: Vec<_> = (0..N).map(|_| counter.participant().unwrap()).collect();

    thread::scope(|s| {
        for mut participant in participants {
            let id = participant.id();
            let counter = &counter;
            thread::Builder::new()
                .name(format!("participant-{id}"))
                .spawn_scoped(s, move || {
                    for round in 0..2 {
                        let mut guard = participant.lock();
                        *guard += 1;
                        let levels: Vec<_> = (0..N).map(|k| counter.lock_state().level(k)).collect();
                        println!("participant {id}, round {round}: inside, levels {levels:?}");
                        thread::sleep(Duration::from_millis(20));
                        drop(guard);
                    }
                })
                .unwrap();
        }
    });

    println!("counter = {}", counter.into_inner());
}
