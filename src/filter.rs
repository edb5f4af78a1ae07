//! The Filter lock, Peterson's lock generalized to `N` participants.
//!
//! A participant climbs levels `1..N` in order. At every level it announces
//! itself, volunteers as that level's victim, and waits while it is still the
//! victim and some other participant stands at the same level or above.
//! Level `L` lets at most `N - L` participants through: of all participants
//! trying to pass it, the last one to volunteer stays behind. After `N - 1`
//! levels a single participant is left, and it is the one inside the
//! critical section.
//!
//! The Filter lock is mutually exclusive and deadlock free. It is not
//! starvation free in the presence of an adversarial scheduler, a participant
//! can be overtaken at a level an unbounded number of times.

use core::fmt;
use core::marker::PhantomData;

use tracing::trace;

use crate::cfg::atomic::AtomicUsize;
use crate::lock::{check_id, DeadlockFree, MutualExclusion, RawLock};
use crate::register::{wait_while, Register};
use crate::mutex::LockState;
use crate::relax::Relax;

/// A Filter lock for `N` participants.
///
/// `level[i]` is the highest level participant `i` has reached, `0` when it
/// is not competing. `victim[L]` is the last participant to arrive at level
/// `L`; index `0` is never used.
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use softlock::spins::Filter;
/// use softlock::RawLock;
///
/// const N: usize = 4;
/// static LOCK: Filter<N> = Filter::new();
///
/// thread::scope(|s| {
///     for id in 0..N {
///         s.spawn(move || {
///             LOCK.lock(id);
///             // Critical section.
///             LOCK.unlock(id);
///         });
///     }
/// });
/// ```
pub struct Filter<const N: usize, R> {
    level: [AtomicUsize; N],
    victim: [AtomicUsize; N],
    relax: PhantomData<R>,
}

impl<const N: usize, R> Filter<N, R> {
    /// Creates a lock with every participant at level `0`.
    #[cfg(not(any(loom, shuttle)))]
    #[must_use]
    pub const fn new() -> Self {
        let level = [const { AtomicUsize::new(0) }; N];
        let victim = [const { AtomicUsize::new(0) }; N];
        Self { level, victim, relax: PhantomData }
    }

    /// Creates a lock with model checker primitives (non-const).
    #[cfg(any(loom, shuttle))]
    #[must_use]
    pub fn new() -> Self {
        let level = core::array::from_fn(|_| AtomicUsize::new(0));
        let victim = core::array::from_fn(|_| AtomicUsize::new(0));
        Self { level, victim, relax: PhantomData }
    }

    /// Returns the level participant `id` has currently reached, `0` if it is
    /// not competing.
    ///
    /// The value may be stale by the time it is returned. It is meant for
    /// instrumentation, not for synchronization.
    ///
    /// # Panics
    ///
    /// Panics if `id >= N`.
    #[track_caller]
    pub fn level(&self, id: usize) -> usize {
        check_id(id, N);
        self.level[id].read()
    }

    /// Returns `true` if some participant other than `id` stands at `level`
    /// or above.
    fn contended(&self, id: usize, level: usize) -> bool {
        self.level.iter().enumerate().any(|(k, l)| k != id && l.read() >= level)
    }
}

impl<const N: usize, R> LockState<'_, Filter<N, R>> {
    /// Returns the level participant `id` has currently reached.
    ///
    /// See [`Filter::level`].
    ///
    /// # Panics
    ///
    /// Panics if `id >= N`.
    #[track_caller]
    pub fn level(&self, id: usize) -> usize {
        self.lock.level(id)
    }
}

impl<const N: usize, R: Relax> Filter<N, R> {
    /// Announces participant `id` at `level` and waits until it may pass.
    fn climb(&self, id: usize, level: usize) {
        self.level[id].write(level);
        self.victim[level].write(id);
        wait_while::<R, _>(|| self.contended(id, level) && self.victim[level].read() == id);
        trace!(id, level, "passed level");
    }
}

impl<const N: usize, R: Relax> RawLock for Filter<N, R> {
    const PARTICIPANTS: usize = N;

    fn lock(&self, id: usize) {
        check_id(id, N);
        for level in 1..N {
            self.climb(id, level);
        }
        trace!(id, "entered");
    }

    fn unlock(&self, id: usize) {
        check_id(id, N);
        self.level[id].write(0);
        trace!(id, "released");
    }
}

// SAFETY: By induction on the level, at most `N - L` participants are past
// level `L`: the last one to write `victim[L]` cannot pass while any of the
// others stands at `L` or above. Past level `N - 1` at most one remains.
unsafe impl<const N: usize, R: Relax> MutualExclusion for Filter<N, R> {}

impl<const N: usize, R: Relax> DeadlockFree for Filter<N, R> {}

impl<const N: usize, R> Default for Filter<N, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, R> fmt::Debug for Filter<N, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Filter");
        d.field("level", &self.level);
        d.field("victim", &self.victim);
        d.finish()
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    use std::thread;

    use super::Filter;
    use crate::lock::RawLock;
    use crate::relax::{Spin, Yield};
    use crate::test::{self, jitter, stagger};

    #[test]
    fn smoke() {
        test::smoke(&Filter::<5, Spin>::new());
    }

    #[test]
    fn single_participant_has_no_levels() {
        let lock = Filter::<1, Spin>::new();
        lock.lock(0);
        assert_eq!(lock.level(0), 0);
        lock.unlock(0);
    }

    #[test]
    fn holder_reaches_the_top_level() {
        let lock = Filter::<4, Spin>::new();
        lock.lock(2);
        assert_eq!(lock.level(2), 3);
        assert_eq!(lock.level(0), 0);
        lock.unlock(2);
        assert_eq!(lock.level(2), 0);
    }

    #[test]
    fn mutual_exclusion_two() {
        test::mutual_exclusion(&Filter::<2, Yield>::new(), 5_000);
    }

    #[test]
    fn mutual_exclusion_three() {
        test::mutual_exclusion(&Filter::<3, Yield>::new(), 2_000);
    }

    #[test]
    fn mutual_exclusion_five() {
        test::mutual_exclusion(&Filter::<5, Yield>::new(), 500);
    }

    #[test]
    fn mutual_exclusion_eight() {
        test::mutual_exclusion(&Filter::<8, Yield>::new(), 200);
    }

    #[test]
    fn lots_and_lots() {
        test::lots_and_lots::<Filter<4, Yield>>(500);
    }

    /// At every level `L`, at most `N - L` participants have passed it.
    fn level_bound<const N: usize>(rounds: usize) {
        let lock = Filter::<N, Yield>::new();
        let passed: [AtomicUsize; N] = core::array::from_fn(|_| AtomicUsize::new(0));

        thread::scope(|s| {
            for id in 0..N {
                let (lock, passed) = (&lock, &passed);
                s.spawn(move || {
                    stagger(id);
                    for round in 0..rounds {
                        for level in 1..N {
                            lock.climb(id, level);
                            let count = passed[level].fetch_add(1, SeqCst) + 1;
                            assert!(count <= N - level, "{count} participants past level {level}");
                        }
                        jitter(id, round);
                        for level in 1..N {
                            passed[level].fetch_sub(1, SeqCst);
                        }
                        lock.unlock(id);
                    }
                });
            }
        });
    }

    #[test]
    fn level_bound_three() {
        level_bound::<3>(1_000);
    }

    #[test]
    fn level_bound_six() {
        level_bound::<6>(200);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_participant_panics() {
        Filter::<3, Spin>::new().lock(3);
    }
}
