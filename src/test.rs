//! Generic test harness shared by the unit tests of every lock.
//!
//! The critical section instrumentation lives here and only here: locks are
//! measured from the outside and never count their own occupants.

use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::thread;
use std::time::Duration;

use crate::lock::{MutualExclusion, RawLock};
use crate::mutex::Mutex;

/// An arbitrary unsigned integer type.
pub type Int = u32;

/// Counts the threads currently inside a critical section and remembers the
/// highest count ever observed.
#[derive(Debug, Default)]
pub struct Occupancy {
    inside: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    pub const fn new() -> Self {
        Self { inside: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
    }

    /// Records one more thread inside, returning the count including it.
    pub fn enter(&self) -> usize {
        let current = self.inside.fetch_add(1, SeqCst) + 1;
        let mut peak = self.peak.load(SeqCst);
        while current > peak {
            match self.peak.compare_exchange(peak, current, SeqCst, SeqCst) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
        current
    }

    /// Records one thread leaving.
    pub fn exit(&self) {
        self.inside.fetch_sub(1, SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(SeqCst)
    }
}

/// Deterministic, uneven amount of busy work so participants drift apart.
pub fn jitter(id: usize, round: usize) {
    let spins = (id * 31 + round * 17) % 64;
    for _ in 0..spins {
        core::hint::spin_loop();
    }
}

/// Staggers thread starts by a participant dependent offset.
pub fn stagger(id: usize) {
    thread::sleep(Duration::from_micros(((id * 7) % 5) as u64 * 100));
}

/// Runs every participant of `lock` through `rounds` lock/unlock cycles and
/// returns the highest number of participants seen inside at once.
///
/// Returning at all is the liveness check: it joins every participant.
pub fn peak_occupancy<L>(lock: &L, rounds: usize) -> usize
where
    L: RawLock + Sync,
{
    let occupancy = Occupancy::new();
    thread::scope(|s| {
        for id in 0..L::PARTICIPANTS {
            let (lock, occupancy) = (lock, &occupancy);
            s.spawn(move || {
                stagger(id);
                for round in 0..rounds {
                    lock.lock(id);
                    occupancy.enter();
                    jitter(id, round);
                    occupancy.exit();
                    lock.unlock(id);
                }
            });
        }
    });
    occupancy.peak()
}

/// Asserts that no two participants ever overlap inside the critical section.
pub fn mutual_exclusion<L>(lock: &L, rounds: usize)
where
    L: MutualExclusion + Sync,
{
    assert_eq!(peak_occupancy(lock, rounds), 1);
}

/// Every participant of a `Mutex` increments the protected counter `iters`
/// times, non-atomically.
pub fn lots_and_lots<L>(iters: Int)
where
    L: MutualExclusion + Default + Sync + Send,
{
    let mutex = Mutex::<Int, L>::new(0);
    thread::scope(|s| {
        for _ in 0..L::PARTICIPANTS {
            let mut participant = mutex.participant().unwrap();
            s.spawn(move || {
                stagger(participant.id());
                for _ in 0..iters {
                    *participant.lock() += 1;
                }
            });
        }
    });
    let expected = iters * Int::try_from(L::PARTICIPANTS).unwrap();
    assert_eq!(mutex.into_inner(), expected);
}

/// Repeated single participant acquisitions never block.
pub fn smoke<L: RawLock>(lock: &L) {
    for id in 0..L::PARTICIPANTS {
        lock.lock(id);
        lock.unlock(id);
        lock.lock(id);
        lock.unlock(id);
    }
}
