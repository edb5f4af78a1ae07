//! A bounded FIFO queue shared by any number of participants, serialized by
//! one of the software locks.

use core::fmt;

use crate::lock::MutualExclusion;
use crate::mutex::{ClaimError, Mutex, Participant};
use crate::spsc::Queue;

/// A bounded FIFO queue of capacity `C` guarded by the lock `L`.
///
/// Unlike [`spsc::Queue`], any participant may both enqueue and dequeue:
/// every operation runs inside the critical section of `L`, so at most
/// `L::PARTICIPANTS` [`QueueHandle`]s exist at once. Full and empty are
/// reported the same way as by the lock-free queue, and never block.
///
/// [`spsc::Queue`]: crate::spsc::Queue
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use softlock::spins::Filter;
/// use softlock::LockedQueue;
///
/// let queue = LockedQueue::<u32, Filter<3>, 8>::new();
///
/// // Claim every handle up front: a handle dropped early frees its id.
/// let handles: Vec<_> = (0..3).map(|_| queue.handle().unwrap()).collect();
/// thread::scope(|s| {
///     for mut handle in handles {
///         s.spawn(move || {
///             let id = handle.id() as u32;
///             handle.enqueue(id).unwrap();
///         });
///     }
/// });
///
/// let mut handle = queue.handle().unwrap();
/// let mut drained: Vec<_> = core::iter::from_fn(|| handle.dequeue()).collect();
/// drained.sort_unstable();
/// assert_eq!(drained, [0, 1, 2]);
/// ```
pub struct LockedQueue<T, L, const C: usize> {
    inner: Mutex<Queue<T, C>, L>,
}

impl<T, L, const C: usize> LockedQueue<T, L, C> {
    /// Creates an empty queue guarded by `lock`.
    #[cfg(not(any(loom, shuttle)))]
    #[inline]
    pub const fn with_lock(lock: L) -> Self {
        Self { inner: Mutex::with_lock(lock, Queue::new()) }
    }

    /// Creates an empty queue with model checker primitives (non-const).
    #[cfg(any(loom, shuttle))]
    pub fn with_lock(lock: L) -> Self {
        Self { inner: Mutex::with_lock(lock, Queue::new()) }
    }

    /// Consumes this queue, returning the underlying lock-free queue with
    /// the items still in it.
    pub fn into_inner(self) -> Queue<T, C> {
        self.inner.into_inner()
    }
}

impl<T, L: Default, const C: usize> LockedQueue<T, L, C> {
    /// Creates an empty queue with a default constructed lock.
    pub fn new() -> Self {
        Self::with_lock(L::default())
    }
}

impl<T, L: MutualExclusion, const C: usize> LockedQueue<T, L, C> {
    /// Claims the lowest free participant id, `None` if every id is claimed.
    pub fn handle(&self) -> Option<QueueHandle<'_, T, L, C>> {
        self.inner.participant().map(|participant| QueueHandle { participant })
    }

    /// Claims participant id `id`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is out of range for `L` or already claimed.
    pub fn handle_at(&self, id: usize) -> Result<QueueHandle<'_, T, L, C>, ClaimError> {
        self.inner.participant_at(id).map(|participant| QueueHandle { participant })
    }
}

impl<T, L: Default, const C: usize> Default for LockedQueue<T, L, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, L: fmt::Debug, const C: usize> fmt::Debug for LockedQueue<T, L, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedQueue").field("inner", &self.inner).finish()
    }
}

/// One participant's access to a [`LockedQueue`].
pub struct QueueHandle<'a, T, L: MutualExclusion, const C: usize> {
    participant: Participant<'a, Queue<T, C>, L>,
}

impl<T, L: MutualExclusion, const C: usize> QueueHandle<'_, T, L, C> {
    /// The participant id this handle owns.
    pub fn id(&self) -> usize {
        self.participant.id()
    }

    /// Appends `item` to the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns `item` back if the queue is full.
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        self.participant.lock_then(|queue| queue.enqueue(item))
    }

    /// Removes the item at the front of the queue, `None` if it is empty.
    pub fn dequeue(&mut self) -> Option<T> {
        self.participant.lock_then(Queue::dequeue)
    }

    /// The number of items queued when the lock was taken.
    pub fn len(&mut self) -> usize {
        self.participant.lock_then(|queue| queue.len())
    }

    /// Returns `true` if no item was queued when the lock was taken.
    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}

impl<T, L: MutualExclusion, const C: usize> fmt::Debug for QueueHandle<'_, T, L, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle").field("id", &self.id()).finish_non_exhaustive()
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use std::thread;
    use std::vec::Vec;

    use super::LockedQueue;
    use crate::bakery::Bakery;
    use crate::mutex::ClaimError;
    use crate::relax::{Spin, Yield};
    use crate::two_thread::Peterson;

    #[test]
    fn empty_dequeue_returns_none() {
        let queue = LockedQueue::<u8, Peterson<Spin>, 2>::new();
        let mut handle = queue.handle().unwrap();
        assert!(handle.is_empty());
        assert_eq!(handle.dequeue(), None);
    }

    #[test]
    fn full_enqueue_hands_the_item_back() {
        let queue = LockedQueue::<char, Peterson<Spin>, 2>::new();
        let mut handle = queue.handle().unwrap();
        handle.enqueue('a').unwrap();
        handle.enqueue('b').unwrap();
        assert_eq!(handle.enqueue('c'), Err('c'));
        assert_eq!(handle.len(), 2);
        assert_eq!(handle.dequeue(), Some('a'));
    }

    #[test]
    fn any_participant_can_dequeue() {
        let queue = LockedQueue::<u8, Peterson<Spin>, 4>::new();
        let mut first = queue.handle().unwrap();
        let mut second = queue.handle().unwrap();
        first.enqueue(1).unwrap();
        second.enqueue(2).unwrap();
        assert_eq!(second.dequeue(), Some(1));
        assert_eq!(first.dequeue(), Some(2));
    }

    #[test]
    fn handles_are_bounded_by_the_lock() {
        let queue = LockedQueue::<u8, Peterson<Spin>, 1>::new();
        let _a = queue.handle().unwrap();
        let _b = queue.handle_at(1).unwrap();
        assert!(queue.handle().is_none());
        assert_eq!(queue.handle_at(1).unwrap_err(), ClaimError::Taken(1));
    }

    #[test]
    fn handles_claimed_up_front_keep_distinct_ids() {
        let queue = LockedQueue::<usize, Bakery<3, Yield>, 8>::new();
        let handles: Vec<_> = (0..3).map(|_| queue.handle().unwrap()).collect();
        thread::scope(|s| {
            for mut handle in handles {
                s.spawn(move || handle.enqueue(handle.id()).unwrap());
                // Let the thread finish and drop its handle before the next
                // spawn.
                thread::sleep(std::time::Duration::from_millis(5));
            }
        });
        let mut handle = queue.handle().unwrap();
        let mut drained: Vec<_> = core::iter::from_fn(|| handle.dequeue()).collect();
        drained.sort_unstable();
        assert_eq!(drained, [0, 1, 2]);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        const PER_PARTICIPANT: usize = 200;
        const N: usize = 4;
        let queue = LockedQueue::<usize, Bakery<N, Yield>, 16>::new();

        let mut handles: Vec<_> = core::iter::from_fn(|| queue.handle()).collect();
        let mut consumer = handles.pop().unwrap();

        thread::scope(|s| {
            for mut handle in handles {
                s.spawn(move || {
                    let base = handle.id() * PER_PARTICIPANT;
                    for i in base..base + PER_PARTICIPANT {
                        let mut item = i;
                        while let Err(rejected) = handle.enqueue(item) {
                            item = rejected;
                            thread::yield_now();
                        }
                    }
                });
            }

            s.spawn(move || {
                let mut seen = Vec::new();
                while seen.len() < (N - 1) * PER_PARTICIPANT {
                    match consumer.dequeue() {
                        Some(item) => seen.push(item),
                        None => thread::yield_now(),
                    }
                }
                // Items of one producer keep their relative order.
                for id in 0..N - 1 {
                    let own: Vec<_> =
                        seen.iter().copied().filter(|item| item / PER_PARTICIPANT == id).collect();
                    let expected: Vec<_> =
                        (id * PER_PARTICIPANT..(id + 1) * PER_PARTICIPANT).collect();
                    assert_eq!(own, expected);
                }
            });
        });

        assert!(queue.into_inner().is_empty());
    }
}
