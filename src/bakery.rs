//! Lamport's Bakery lock for `N` participants.
//!
//! Entering is split in two phases. In the *doorway* a participant takes a
//! ticket one larger than every ticket it can see, bracketed by a `choosing`
//! flag so that nobody reads a half-taken ticket. In the *waiting room* it
//! waits, for every other participant in turn, first until that participant
//! is done choosing and then until that participant either holds no ticket
//! or ranks behind it.
//!
//! Ranking is a total order over `(ticket, id)` pairs: a smaller ticket
//! goes first, and two participants that took equal tickets concurrently are
//! ordered by id. Releasing drops the ticket back to `0`.
//!
//! The Bakery lock is mutually exclusive and first-come-first-served: a
//! participant that completed its doorway before another one started its own
//! enters first. Tickets grow without bound while the lock is never idle,
//! which in practice means after `usize::MAX` overlapping acquisitions.

use core::fmt;
use core::marker::PhantomData;

use tracing::trace;

use crate::cfg::atomic::{AtomicBool, AtomicUsize};
use crate::lock::{check_id, DeadlockFree, MutualExclusion, RawLock, StarvationFree};
use crate::register::{wait_while, Register};
use crate::mutex::LockState;
use crate::relax::Relax;

/// A Bakery lock for `N` participants.
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use softlock::spins::Bakery;
/// use softlock::RawLock;
///
/// const N: usize = 4;
/// static LOCK: Bakery<N> = Bakery::new();
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
pub struct Bakery<const N: usize, R> {
    choosing: [AtomicBool; N],
    number: [AtomicUsize; N],
    relax: PhantomData<R>,
}

/// Returns `true` if the request `(ticket_j, j)` ranks ahead of
/// `(ticket_i, i)`.
#[inline]
fn outranks((ticket_j, j): (usize, usize), (ticket_i, i): (usize, usize)) -> bool {
    ticket_j < ticket_i || (ticket_j == ticket_i && j < i)
}

impl<const N: usize, R> Bakery<N, R> {
    /// Creates a lock where no participant holds a ticket.
    #[cfg(not(any(loom, shuttle)))]
    #[must_use]
    pub const fn new() -> Self {
        let choosing = [const { AtomicBool::new(false) }; N];
        let number = [const { AtomicUsize::new(0) }; N];
        Self { choosing, number, relax: PhantomData }
    }

    /// Creates a lock with model checker primitives (non-const).
    #[cfg(any(loom, shuttle))]
    #[must_use]
    pub fn new() -> Self {
        let choosing = core::array::from_fn(|_| AtomicBool::new(false));
        let number = core::array::from_fn(|_| AtomicUsize::new(0));
        Self { choosing, number, relax: PhantomData }
    }

    /// Returns the ticket participant `id` currently holds, `0` if it is not
    /// competing.
    ///
    /// The value may be stale by the time it is returned. It is meant for
    /// instrumentation, not for synchronization.
    ///
    /// # Panics
    ///
    /// Panics if `id >= N`.
    #[track_caller]
    pub fn ticket(&self, id: usize) -> usize {
        check_id(id, N);
        self.number[id].read()
    }

    /// Takes a ticket larger than every ticket currently visible.
    fn doorway(&self, id: usize) -> usize {
        self.choosing[id].write(true);
        let max = self.number.iter().map(Register::read).max().unwrap_or(0);
        let ticket = max + 1;
        self.number[id].write(ticket);
        self.choosing[id].write(false);
        trace!(id, ticket, "took ticket");
        ticket
    }
}

impl<const N: usize, R> LockState<'_, Bakery<N, R>> {
    /// Returns the ticket participant `id` currently holds.
    ///
    /// See [`Bakery::ticket`].
    ///
    /// # Panics
    ///
    /// Panics if `id >= N`.
    #[track_caller]
    pub fn ticket(&self, id: usize) -> usize {
        self.lock.ticket(id)
    }
}

impl<const N: usize, R: Relax> Bakery<N, R> {
    /// Waits until every other participant either holds no ticket or ranks
    /// behind `(ticket, id)`.
    fn waiting_room(&self, id: usize, ticket: usize) {
        for j in (0..N).filter(|&j| j != id) {
            wait_while::<R, _>(|| self.choosing[j].read());
            wait_while::<R, _>(|| {
                let ticket_j = self.number[j].read();
                ticket_j != 0 && outranks((ticket_j, j), (ticket, id))
            });
        }
    }
}

impl<const N: usize, R: Relax> RawLock for Bakery<N, R> {
    const PARTICIPANTS: usize = N;

    fn lock(&self, id: usize) {
        check_id(id, N);
        let ticket = self.doorway(id);
        self.waiting_room(id, ticket);
        trace!(id, ticket, "entered");
    }

    fn unlock(&self, id: usize) {
        check_id(id, N);
        self.number[id].write(0);
        trace!(id, "released");
    }
}

// SAFETY: Of two participants inside, the one ranking behind passed the
// other in the waiting room after that other finished choosing, so it must
// have read a ticket of `0` or one ranking behind it. The `choosing` wait
// rules out reading a ticket that is still being taken, and a ticket taken
// later than that read is larger than its own.
unsafe impl<const N: usize, R: Relax> MutualExclusion for Bakery<N, R> {}

impl<const N: usize, R: Relax> DeadlockFree for Bakery<N, R> {}

impl<const N: usize, R: Relax> StarvationFree for Bakery<N, R> {}

impl<const N: usize, R> Default for Bakery<N, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, R> fmt::Debug for Bakery<N, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Bakery");
        d.field("choosing", &self.choosing);
        d.field("number", &self.number);
        d.finish()
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use std::sync::Mutex;
    use std::thread;
    use std::vec::Vec;

    use super::{outranks, Bakery};
    use crate::lock::RawLock;
    use crate::register::Register;
    use crate::relax::{Spin, Yield};
    use crate::test;

    #[test]
    fn smoke() {
        test::smoke(&Bakery::<4, Spin>::new());
    }

    #[test]
    fn ranking_is_total() {
        assert!(outranks((1, 3), (2, 0)));
        assert!(!outranks((2, 0), (1, 3)));
        // Equal tickets fall back to the id.
        assert!(outranks((5, 0), (5, 1)));
        assert!(!outranks((5, 1), (5, 0)));
        assert!(!outranks((5, 1), (5, 1)));
    }

    #[test]
    fn tickets_increase_and_reset() {
        let lock = Bakery::<3, Spin>::new();
        lock.lock(0);
        assert_eq!(lock.ticket(0), 1);
        assert_eq!(lock.doorway(1), 2);
        assert_eq!(lock.doorway(2), 3);
        lock.unlock(0);
        assert_eq!(lock.ticket(0), 0);
        lock.waiting_room(1, 2);
        lock.unlock(1);
        lock.waiting_room(2, 3);
        lock.unlock(2);
        // An idle bakery starts counting over.
        lock.lock(1);
        assert_eq!(lock.ticket(1), 1);
        lock.unlock(1);
    }

    #[test]
    fn mutual_exclusion_two() {
        test::mutual_exclusion(&Bakery::<2, Yield>::new(), 5_000);
    }

    #[test]
    fn mutual_exclusion_four() {
        test::mutual_exclusion(&Bakery::<4, Yield>::new(), 1_000);
    }

    #[test]
    fn mutual_exclusion_eight() {
        test::mutual_exclusion(&Bakery::<8, Yield>::new(), 200);
    }

    #[test]
    fn lots_and_lots() {
        test::lots_and_lots::<Bakery<4, Yield>>(500);
    }

    #[test]
    fn first_come_first_served() {
        let lock = Bakery::<4, Yield>::new();
        let order = Mutex::new(Vec::new());

        // Hold the lock so every later arrival queues up.
        lock.lock(0);
        // Participants 3, 1 and 2 finish their doorways in that order, each
        // strictly before the next one starts.
        let tickets = [(3, lock.doorway(3)), (1, lock.doorway(1)), (2, lock.doorway(2))];
        assert_eq!(tickets, [(3, 2), (1, 3), (2, 4)]);

        thread::scope(|s| {
            // Start the waiting rooms in reverse arrival order.
            for &(id, ticket) in tickets.iter().rev() {
                let (lock, order) = (&lock, &order);
                s.spawn(move || {
                    lock.waiting_room(id, ticket);
                    order.lock().unwrap().push(id);
                    lock.unlock(id);
                });
            }
            lock.unlock(0);
        });

        assert_eq!(order.into_inner().unwrap(), [3, 1, 2]);
    }

    #[test]
    fn equal_tickets_enter_by_id() {
        let lock = Bakery::<3, Yield>::new();
        let order = Mutex::new(Vec::new());

        lock.lock(0);
        // Force the tie two concurrent doorways can produce.
        let ticket = lock.doorway(2);
        lock.number[1].write(ticket);

        thread::scope(|s| {
            for id in [2, 1] {
                let (lock, order) = (&lock, &order);
                s.spawn(move || {
                    lock.waiting_room(id, ticket);
                    order.lock().unwrap().push(id);
                    lock.unlock(id);
                });
            }
            lock.unlock(0);
        });

        assert_eq!(order.into_inner().unwrap(), [1, 2]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_participant_panics() {
        Bakery::<2, Spin>::new().ticket(2);
    }
}
