use core::fmt;
use core::marker::PhantomData;

use tracing::trace;

use super::{other, Flags, PARTICIPANTS};
use crate::cfg::atomic::AtomicUsize;
use crate::lock::{check_id, DeadlockFree, MutualExclusion, RawLock, StarvationFree};
use crate::register::{wait_while, Register};
use crate::relax::Relax;

/// Peterson's lock for two participants.
///
/// To enter, a participant raises its flag, then hands the turn to the other
/// participant, then waits while the other participant's flag is raised
/// *and* the turn still belongs to the other participant. Whichever of the
/// two writes `turn` last is the one that waits, so when both compete the
/// participant that asked first enters first.
///
/// The order of the three steps is the whole algorithm. Checking before
/// raising the flag reintroduces the [`LockTwo`] race; dropping the turn
/// reintroduces the [`LockOne`] deadlock.
///
/// Peterson's lock is mutually exclusive and starvation free for exactly two
/// participants.
///
/// [`LockOne`]: super::LockOne
/// [`LockTwo`]: super::LockTwo
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use softlock::spins::Peterson;
/// use softlock::RawLock;
///
/// static LOCK: Peterson = Peterson::new();
///
/// thread::scope(|s| {
///     for id in 0..2 {
///         s.spawn(move || {
///             LOCK.lock(id);
///             // Critical section.
///             LOCK.unlock(id);
///         });
///     }
/// });
/// ```
pub struct Peterson<R> {
    flags: Flags,
    turn: AtomicUsize,
    relax: PhantomData<R>,
}

impl<R> Peterson<R> {
    /// Creates a lock with both flags lowered.
    #[cfg(not(any(loom, shuttle)))]
    #[must_use]
    pub const fn new() -> Self {
        let turn = AtomicUsize::new(0);
        Self { flags: Flags::new(), turn, relax: PhantomData }
    }

    /// Creates a lock with model checker primitives (non-const).
    #[cfg(any(loom, shuttle))]
    #[must_use]
    pub fn new() -> Self {
        let turn = AtomicUsize::new(0);
        Self { flags: Flags::new(), turn, relax: PhantomData }
    }
}

impl<R: Relax> RawLock for Peterson<R> {
    const PARTICIPANTS: usize = PARTICIPANTS;

    fn lock(&self, id: usize) {
        let other = other(id);
        self.flags.raise(id);
        self.turn.write(other);
        trace!(id, "turn given to participant {other}");
        wait_while::<R, _>(|| self.flags.is_raised(other) && self.turn.read() == other);
        trace!(id, "entered");
    }

    fn unlock(&self, id: usize) {
        check_id(id, PARTICIPANTS);
        self.flags.lower(id);
        trace!(id, "released");
    }
}

// SAFETY: If both participants were inside, each read either the other flag
// lowered or the turn as its own. Both flags were raised before the turn
// writes, and the turn holds a single value, so the participant that wrote
// it last read it back as the other's and must still be waiting.
unsafe impl<R: Relax> MutualExclusion for Peterson<R> {}

impl<R: Relax> DeadlockFree for Peterson<R> {}

impl<R: Relax> StarvationFree for Peterson<R> {}

impl<R> Default for Peterson<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Peterson<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Peterson");
        d.field("flags", &self.flags);
        d.field("turn", &self.turn);
        d.finish()
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
    use std::thread;

    use super::Peterson;
    use crate::lock::RawLock;
    use crate::register::Register;
    use crate::relax::{Spin, Yield};
    use crate::test;

    #[test]
    fn smoke() {
        test::smoke(&Peterson::<Spin>::new());
    }

    #[test]
    fn mutual_exclusion() {
        test::mutual_exclusion(&Peterson::<Yield>::new(), 10_000);
    }

    #[test]
    fn lots_and_lots() {
        test::lots_and_lots::<Peterson<Yield>>(1_000);
    }

    #[test]
    fn waiting_participant_enters_before_a_returning_one() {
        let lock = Peterson::<Yield>::new();
        let entered = AtomicBool::new(false);
        lock.lock(0);

        thread::scope(|s| {
            s.spawn(|| {
                lock.lock(1);
                entered.store(true, SeqCst);
                lock.unlock(1);
            });

            // Participant 0 only ever wrote 1 to `turn`, so reading 0 means
            // participant 1 has raised its flag and is waiting.
            while !(lock.flags.is_raised(1) && lock.turn.read() == 0) {
                thread::yield_now();
            }

            lock.unlock(0);
            lock.lock(0);
            assert!(entered.load(SeqCst));
            lock.unlock(0);
        });
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn third_participant_panics() {
        Peterson::<Spin>::new().unlock(2);
    }
}
