//! Four participants take tickets and enter the Bakery in ticket order.
//!
//! The lock's own milestones are logged at `TRACE` level; override the
//! default filter with `RUST_LOG`.

use std::thread;
use std::time::Duration;

use softlock::spins::Bakery;
use softlock::Mutex;
use tracing_subscriber::EnvFilter;

const N: usize = 4;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("softlock=trace"));
    tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true).init();

    let served = Mutex::<Vec<usize>, Bakery<N>>::new(Vec::new());

    let participants: Vec<_> = (0..N).map(|_| served.participant().unwrap()).collect();
    thread::scope(|s| {
        for mut participant in participants {
            let id = participant.id();
            thread::Builder::new()
                .name(format!("customer-{id}"))
                .spawn_scoped(s, move || {
                    thread::sleep(Duration::from_millis(5 * id as u64));
                    println!("customer {id}: taking a ticket");
                    participant.lock_then(|served| {
                        println!("customer {id}: served");
                        served.push(id);
                        thread::sleep(Duration::from_millis(10));
                    });
                })
                .unwrap();
        }
    });

    println!("served in order {:?}", served.into_inner());
}
