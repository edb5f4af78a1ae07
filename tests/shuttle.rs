//! Randomized schedule exploration of the locks with Shuttle.
//!
//! Run with `RUSTFLAGS="--cfg shuttle" cargo test --test shuttle`.

#![cfg(shuttle)]

use shuttle::scheduler::RandomScheduler;
use shuttle::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use shuttle::sync::Arc;
use shuttle::{thread, Config, PortfolioRunner};
use softlock::yields::{Bakery, Filter, LockTwo, Peterson};
use softlock::{Mutex, MutualExclusion, RawLock};
use test_log::test;

const ITERATIONS: usize = 1_000;

/// Every participant enters once; none may find the critical section taken.
fn exclusive<L>()
where
    L: RawLock + Default + Send + Sync + 'static,
{
    let lock = Arc::new(L::default());
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..L::PARTICIPANTS)
        .map(|id| {
            let (lock, inside) = (Arc::clone(&lock), Arc::clone(&inside));
            thread::spawn(move || {
                lock.lock(id);
                let others = inside.fetch_add(1, SeqCst);
                // Give the scheduler a chance to run someone else inside.
                thread::yield_now();
                assert_eq!(others, 0, "participant {id} entered an occupied critical section");
                inside.fetch_sub(1, SeqCst);
                lock.unlock(id);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Every participant increments the protected counter through a `Mutex`.
fn counter<L>()
where
    L: MutualExclusion + Default + Send + Sync + 'static,
{
    let mutex = Arc::new(Mutex::<usize, L>::new(0));

    let handles: Vec<_> = (0..L::PARTICIPANTS)
        .map(|_| {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || {
                let mut participant = mutex.participant().unwrap();
                let mut data = participant.lock();
                let value = *data;
                thread::yield_now();
                *data = value + 1;
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*mutex.participant().unwrap().lock(), L::PARTICIPANTS);
}

#[test]
fn peterson_is_exclusive() {
    shuttle::check_random(exclusive::<Peterson>, ITERATIONS);
}

#[test]
fn filter_is_exclusive() {
    shuttle::check_random(exclusive::<Filter<3>>, ITERATIONS);
}

#[test]
fn bakery_is_exclusive() {
    shuttle::check_random(exclusive::<Bakery<3>>, ITERATIONS);
}

#[test]
fn mutex_counters() {
    let mut runner = PortfolioRunner::new(true, Config::new());
    for _ in 0..4 {
        runner.add(RandomScheduler::new(ITERATIONS / 4));
    }
    runner.run(|| {
        counter::<Peterson>();
        counter::<Filter<3>>();
        counter::<Bakery<3>>();
    });
}

#[test]
#[should_panic]
fn lock_two_lets_both_in() {
    shuttle::check_random(exclusive::<LockTwo>, ITERATIONS);
}
