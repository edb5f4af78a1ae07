use core::fmt;
use core::marker::PhantomData;

use tracing::trace;

use super::{other, Flags, PARTICIPANTS};
use crate::lock::{check_id, MutualExclusion, RawLock};
use crate::register::wait_while;
use crate::relax::Relax;

/// A two participant lock that raises its flag first and then waits for the
/// other participant's flag to drop.
///
/// Mutual exclusion holds: a participant only enters after seeing the other
/// flag lowered *after* raising its own, so both cannot be inside together.
/// Liveness does not: if both participants raise their flags before either
/// one checks, both wait on each other forever. That deadlock is the
/// documented behavior of this algorithm, which is why `LockOne` is
/// [`MutualExclusion`] but not [`DeadlockFree`]. Observe it with a timeout
/// around the whole acquisition.
///
/// [`DeadlockFree`]: crate::DeadlockFree
///
/// # Examples
///
/// ```
/// use softlock::spins::LockOne;
/// use softlock::RawLock;
///
/// let lock = LockOne::new();
/// lock.lock(0);
/// // Critical section, participant 1 is kept out.
/// lock.unlock(0);
/// ```
pub struct LockOne<R> {
    flags: Flags,
    relax: PhantomData<R>,
}

impl<R> LockOne<R> {
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

impl<R: Relax> LockOne<R> {
    /// Waits while participant `other` has its flag raised.
    fn wait_for(&self, other: usize) {
        wait_while::<R, _>(|| self.flags.is_raised(other));
    }
}

impl<R: Relax> RawLock for LockOne<R> {
    const PARTICIPANTS: usize = PARTICIPANTS;

    fn lock(&self, id: usize) {
        let other = other(id);
        self.flags.raise(id);
        trace!(id, "flag raised, waiting for participant {other}");
        self.wait_for(other);
        trace!(id, "entered");
    }

    fn unlock(&self, id: usize) {
        check_id(id, PARTICIPANTS);
        self.flags.lower(id);
        trace!(id, "released");
    }
}

// SAFETY: A participant enters only after reading the other flag as lowered
// after its own flag was raised; with sequentially consistent accesses the
// two reads cannot both precede both writes.
unsafe impl<R: Relax> MutualExclusion for LockOne<R> {}

impl<R> Default for LockOne<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for LockOne<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockOne").field("flags", &self.flags).finish()
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use std::sync::mpsc::{channel, RecvTimeoutError};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::LockOne;
    use crate::lock::RawLock;
    use crate::relax::Yield;
    use crate::test;

    type Lock = LockOne<Yield>;

    #[test]
    fn smoke() {
        test::smoke(&Lock::new());
    }

    #[test]
    fn sequential_hand_offs_make_progress() {
        let lock = Lock::new();
        // Never raises both flags at once, so this never deadlocks.
        for round in 0..100 {
            let id = round % 2;
            lock.lock(id);
            assert!(!lock.flags.is_raised(1 - id));
            lock.unlock(id);
        }
    }

    #[test]
    fn deadlocks_when_both_flags_are_raised_before_checking() {
        let lock = Lock::new();
        let barrier = Barrier::new(2);
        let (tx, rx) = channel();

        thread::scope(|s| {
            for id in 0..2 {
                let (lock, barrier, tx) = (&lock, &barrier, tx.clone());
                s.spawn(move || {
                    lock.flags.raise(id);
                    barrier.wait();
                    lock.wait_for(1 - id);
                    tx.send(id).unwrap();
                    lock.unlock(id);
                });
            }

            let timeout = rx.recv_timeout(Duration::from_millis(200));
            assert_eq!(timeout, Err(RecvTimeoutError::Timeout));

            // Back participant 1 off from the outside. That frees participant
            // 0, whose release in turn frees participant 1.
            lock.flags.lower(1);
            assert_eq!(rx.recv().unwrap(), 0);
            assert_eq!(rx.recv().unwrap(), 1);
        });
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn third_participant_panics() {
        Lock::new().lock(2);
    }
}
