use core::fmt;
use core::marker::PhantomData;

use tracing::trace;

use super::{other, Flags, PARTICIPANTS};
use crate::lock::{check_id, RawLock};
use crate::register::wait_while;
use crate::relax::Relax;

/// A two participant lock that waits for the other participant's flag to
/// drop and only then raises its own.
///
/// This lock never deadlocks, but it does **not** provide mutual exclusion:
/// both participants can find the other flag lowered before either one
/// raises its own, and then both enter. It implements [`RawLock`] so it can
/// be driven like the other locks, and deliberately not
/// [`MutualExclusion`], so it cannot guard a [`Mutex`].
///
/// [`MutualExclusion`]: crate::MutualExclusion
/// [`Mutex`]: crate::Mutex
pub struct LockTwo<R> {
    flags: Flags,
    relax: PhantomData<R>,
}

impl<R> LockTwo<R> {
    /// Creates a lock with both flags lowered.
    #[cfg(not(any(loom, shuttle)))]
    #[must_use]
    pub const fn new() -> Self {
        Self { flags: Flags::new(), relax: PhantomData }
    }

    /// Creates a lock with model checker primitives (non-const).
    #[cfg(any(loom, shuttle))]
    #[must_use]
    pub fn new() -> Self {
        Self { flags: Flags::new(), relax: PhantomData }
    }
}

impl<R: Relax> LockTwo<R> {
    /// Waits while participant `other` has its flag raised.
    fn wait_for(&self, other: usize) {
        wait_while::<R, _>(|| self.flags.is_raised(other));
    }
}

impl<R: Relax> RawLock for LockTwo<R> {
    const PARTICIPANTS: usize = PARTICIPANTS;

    fn lock(&self, id: usize) {
        let other = other(id);
        self.wait_for(other);
        // The window between the check above and this store is the race.
        self.flags.raise(id);
        trace!(id, "entered");
    }

    fn unlock(&self, id: usize) {
        check_id(id, PARTICIPANTS);
        self.flags.lower(id);
        trace!(id, "released");
    }
}

impl<R> Default for LockTwo<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for LockTwo<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTwo").field("flags", &self.flags).finish()
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use std::sync::Barrier;
    use std::thread;

    use super::LockTwo;
    use crate::lock::RawLock;
    use crate::relax::Yield;
    use crate::test::{self, Occupancy};

    type Lock = LockTwo<Yield>;

    #[test]
    fn smoke() {
        test::smoke(&Lock::new());
    }

    #[test]
    fn never_deadlocks_under_contention() {
        // Returning is the check: every participant gets through.
        let peak = test::peak_occupancy(&Lock::new(), 1_000);
        assert!((1..=2).contains(&peak));
    }

    #[test]
    fn both_enter_when_both_check_before_either_raises() {
        let lock = Lock::new();
        let occupancy = Occupancy::new();
        let checked = Barrier::new(2);
        let inside = Barrier::new(2);

        thread::scope(|s| {
            for id in 0..2 {
                let (lock, occupancy) = (&lock, &occupancy);
                let (checked, inside) = (&checked, &inside);
                s.spawn(move || {
                    lock.wait_for(1 - id);
                    checked.wait();
                    lock.flags.raise(id);
                    occupancy.enter();
                    // Both are inside before either leaves.
                    inside.wait();
                    occupancy.exit();
                    lock.unlock(id);
                });
            }
        });

        assert_eq!(occupancy.peak(), 2);
    }

    #[test]
    fn excludes_a_participant_that_arrives_late() {
        let lock = Lock::new();
        lock.lock(0);
        assert!(lock.flags.is_raised(0));
        thread::scope(|s| {
            let handle = s.spawn(|| lock.lock(1));
            thread::sleep(std::time::Duration::from_millis(50));
            assert!(!handle.is_finished());
            lock.unlock(0);
            handle.join().unwrap();
        });
        lock.unlock(1);
    }
}
