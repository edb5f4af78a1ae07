//! LockOne in action: alone it works, contended it can deadlock.
//!
//! Both participants raise their flags before either one checks the other.
//! Neither ever lowers it again, so both wait forever. The demo gives up
//! after a timeout instead of hanging.

use std::sync::mpsc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use softlock::spins::LockOne;
use softlock::RawLock;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("softlock=trace"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("-- taking turns --");
    let lock = LockOne::new();
    for id in [0, 1, 0] {
        lock.lock(id);
        println!("participant {id}: inside");
        lock.unlock(id);
    }

    println!("-- arriving together --");
    // Leaked so the stuck threads can outlive `main`'s scope.
    let lock: &'static LockOne = Box::leak(Box::new(LockOne::new()));
    let start: &'static Barrier = Box::leak(Box::new(Barrier::new(2)));
    let (tx, rx) = mpsc::channel();

    for id in 0..2 {
        let tx = tx.clone();
        thread::spawn(move || {
            start.wait();
            lock.lock(id);
            println!("participant {id}: inside");
            lock.unlock(id);
            let _ = tx.send(id);
        });
    }
    drop(tx);

    let mut entered = 0;
    while let Ok(id) = rx.recv_timeout(Duration::from_secs(1)) {
        println!("participant {id}: done");
        entered += 1;
    }
    if entered < 2 {
        println!("no progress for a second: both flags are raised and both participants wait");
    } else {
        println!("this run got lucky, one flag went up after the other was checked");
    }
}
