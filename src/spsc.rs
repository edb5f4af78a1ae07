//! A wait-free bounded queue for one producer and one consumer.
//!
//! The queue is a ring of `N` slots and two counters. `tail` counts the items
//! ever enqueued and is only written by the producer; `head` counts the items
//! ever dequeued and is only written by the consumer. An item lives in slot
//! `counter % N`, and the queue holds `tail - head` items, never more than
//! `N`.
//!
//! The producer writes the slot before it publishes the incremented `tail`,
//! and the consumer reads the slot before it publishes the incremented
//! `head`. Seeing a counter move is therefore a promise about the slot behind
//! it: a consumer that reads a new `tail` finds the item written, and a
//! producer that reads a new `head` finds the slot vacated.
//!
//! Neither side ever waits for the other. A full queue rejects an enqueue and
//! an empty queue rejects a dequeue, both right away.
//!
//! The counters wrap around at `usize::MAX`. Lengths are computed with
//! wrapping arithmetic and stay exact; slot addressing stays exact across the
//! wrap only if `N` is a power of two, which `2^usize::BITS` enqueues are
//! needed to reach in the first place.

use core::fmt;
use core::mem::MaybeUninit;

use tracing::trace;

use crate::cfg::atomic::AtomicUsize;
use crate::cfg::cell::{UnsafeCell, UnsafeCellWith};
use crate::register::Register;

/// A bounded FIFO queue of capacity `N`, shared between exactly one producer
/// and one consumer.
///
/// With exclusive access, [`enqueue`] and [`dequeue`] can be called directly.
/// To share the queue between two threads, [`split`] it into a [`Producer`]
/// and a [`Consumer`]. The split borrows the queue mutably, so no other
/// handle can exist while the two halves are alive.
///
/// [`enqueue`]: Queue::enqueue
/// [`dequeue`]: Queue::dequeue
/// [`split`]: Queue::split
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use softlock::spsc::Queue;
///
/// let mut queue = Queue::<u32, 4>::new();
/// let (mut producer, mut consumer) = queue.split();
///
/// thread::scope(|s| {
///     s.spawn(move || {
///         for i in 0..100 {
///             let mut item = i;
///             while let Err(rejected) = producer.enqueue(item) {
///                 item = rejected;
///                 thread::yield_now();
///             }
///         }
///     });
///
///     let mut expected = 0;
///     while expected < 100 {
///         if let Some(item) = consumer.dequeue() {
///             assert_eq!(item, expected);
///             expected += 1;
///         }
///     }
/// });
/// ```
pub struct Queue<T, const N: usize> {
    head: AtomicUsize,
    tail: AtomicUsize,
    slots: [UnsafeCell<MaybeUninit<T>>; N],
}

// SAFETY: Only the observers are reachable through a shared reference. The
// slots are accessed through the producer and the consumer, which require an
// exclusive borrow to create, and items are moved across threads through
// them, so `T` must be `Send`.
unsafe impl<T: Send, const N: usize> Sync for Queue<T, N> {}

impl<T, const N: usize> Queue<T, N> {
    /// Creates an empty queue.
    ///
    /// A queue of capacity `0` fails to compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spsc::Queue;
    ///
    /// static QUEUE: Queue<u8, 16> = Queue::new();
    /// assert!(QUEUE.is_empty());
    /// ```
    #[cfg(not(any(loom, shuttle)))]
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N > 0, "queue capacity must be non-zero") };
        let slots = [const { UnsafeCell::new(MaybeUninit::uninit()) }; N];
        Self { head: AtomicUsize::new(0), tail: AtomicUsize::new(0), slots }
    }

    /// Creates an empty queue with model checker primitives (non-const).
    #[cfg(any(loom, shuttle))]
    #[must_use]
    pub fn new() -> Self {
        const { assert!(N > 0, "queue capacity must be non-zero") };
        let slots = core::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit()));
        Self { head: AtomicUsize::new(0), tail: AtomicUsize::new(0), slots }
    }

    /// The maximum number of items the queue holds.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The number of items currently queued.
    ///
    /// With the producer or the consumer running concurrently, the value may
    /// be stale by the time it is returned.
    pub fn len(&self) -> usize {
        // Read `head` first: `tail` only grows, so the difference never
        // underflows.
        let head = self.head.read();
        let tail = self.tail.read();
        tail.wrapping_sub(head).min(N)
    }

    /// Returns `true` if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the queue holds `N` items.
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Appends `item` to the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns `item` back if the queue is full.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spsc::Queue;
    ///
    /// let mut queue = Queue::<char, 1>::new();
    /// assert_eq!(queue.enqueue('a'), Ok(()));
    /// assert_eq!(queue.enqueue('b'), Err('b'));
    /// ```
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        // SAFETY: The exclusive borrow makes us the only producer.
        unsafe { self.produce(item) }
    }

    /// Removes the item at the front of the queue, `None` if it is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spsc::Queue;
    ///
    /// let mut queue = Queue::<char, 2>::new();
    /// queue.enqueue('a').unwrap();
    /// assert_eq!(queue.dequeue(), Some('a'));
    /// assert_eq!(queue.dequeue(), None);
    /// ```
    pub fn dequeue(&mut self) -> Option<T> {
        // SAFETY: The exclusive borrow makes us the only consumer.
        unsafe { self.consume() }
    }

    /// Splits the queue into its producing and its consuming half.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let queue = &*self;
        (Producer { queue }, Consumer { queue })
    }

    /// # Safety
    ///
    /// Caller must be the only thread producing into this queue.
    unsafe fn produce(&self, item: T) -> Result<(), T> {
        let tail = self.tail.read();
        let head = self.head.read();
        if tail.wrapping_sub(head) == N {
            trace!(capacity = N, "queue full, item rejected");
            return Err(item);
        }
        let slot = &self.slots[tail % N];
        // SAFETY: The slot at `tail` is vacant: the consumer published a
        // `head` past it, or never reached it, and the consumer never reads
        // at or past `tail`.
        unsafe { slot.with_mut_unchecked(|slot| _ = slot.write(item)) };
        self.tail.write(tail.wrapping_add(1));
        Ok(())
    }

    /// # Safety
    ///
    /// Caller must be the only thread consuming from this queue.
    unsafe fn consume(&self) -> Option<T> {
        let head = self.head.read();
        let tail = self.tail.read();
        if head == tail {
            trace!("queue empty, nothing to dequeue");
            return None;
        }
        let slot = &self.slots[head % N];
        // SAFETY: The producer published a `tail` past `head`, so the slot
        // was written, and the producer does not touch it again until we
        // publish a `head` past it.
        let item = unsafe { slot.with_mut_unchecked(|slot| slot.assume_init_read()) };
        self.head.write(head.wrapping_add(1));
        Some(item)
    }
}

impl<T, const N: usize> Default for Queue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for Queue<T, N> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

impl<T, const N: usize> fmt::Debug for Queue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Queue");
        d.field("capacity", &N);
        d.field("len", &self.len());
        d.finish_non_exhaustive()
    }
}

/// The producing half of a split [`Queue`].
pub struct Producer<'a, T, const N: usize> {
    queue: &'a Queue<T, N>,
}

impl<T, const N: usize> Producer<'_, T, N> {
    /// Appends `item` to the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns `item` back if the queue is full.
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        // SAFETY: At most one producer exists per split, and it is borrowed
        // mutably here.
        unsafe { self.queue.produce(item) }
    }

    /// Returns `true` if the queue holds `N` items.
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
}

impl<T, const N: usize> fmt::Debug for Producer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("queue", self.queue).finish()
    }
}

/// The consuming half of a split [`Queue`].
pub struct Consumer<'a, T, const N: usize> {
    queue: &'a Queue<T, N>,
}

impl<T, const N: usize> Consumer<'_, T, N> {
    /// Removes the item at the front of the queue, `None` if it is empty.
    pub fn dequeue(&mut self) -> Option<T> {
        // SAFETY: At most one consumer exists per split, and it is borrowed
        // mutably here.
        unsafe { self.queue.consume() }
    }

    /// Returns `true` if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T, const N: usize> fmt::Debug for Consumer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("queue", self.queue).finish()
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    use super::Queue;

    #[test]
    fn five_in_five_out() {
        let mut queue = Queue::<char, 5>::new();
        for item in ['A', 'B', 'C', 'D', 'E'] {
            assert_eq!(queue.enqueue(item), Ok(()));
        }
        assert!(queue.is_full());
        assert_eq!(queue.enqueue('F'), Err('F'));

        let drained: Vec<_> = core::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, ['A', 'B', 'C', 'D', 'E']);
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn observers_track_the_counters() {
        let mut queue = Queue::<u8, 3>::new();
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.len(), 0);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        assert_eq!(queue.len(), 2);
        assert!(!queue.is_empty() && !queue.is_full());
        queue.dequeue();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn slots_are_reused_after_wrapping() {
        let mut queue = Queue::<usize, 3>::new();
        let mut next = 0;
        for round in 0..10 {
            queue.enqueue(next).unwrap();
            queue.enqueue(next + 1).unwrap();
            assert_eq!(queue.dequeue(), Some(next), "round {round}");
            assert_eq!(queue.dequeue(), Some(next + 1), "round {round}");
            next += 2;
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn leftover_items_are_dropped_with_the_queue() {
        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let mut queue = Queue::<Counted, 4>::new();
        for _ in 0..3 {
            assert!(queue.enqueue(Counted(drops.clone())).is_ok());
        }
        drop(queue.dequeue());
        assert_eq!(drops.load(SeqCst), 1);
        drop(queue);
        assert_eq!(drops.load(SeqCst), 3);
    }

    #[test]
    fn fifo_across_threads() {
        const ITEMS: usize = 10_000;
        let mut queue = Queue::<usize, 8>::new();
        let (mut producer, mut consumer) = queue.split();

        thread::scope(|s| {
            s.spawn(move || {
                for i in 0..ITEMS {
                    let mut item = i;
                    while let Err(rejected) = producer.enqueue(item) {
                        item = rejected;
                        thread::yield_now();
                    }
                }
            });
            s.spawn(move || {
                let mut expected = 0;
                while expected < ITEMS {
                    match consumer.dequeue() {
                        Some(item) => {
                            assert_eq!(item, expected);
                            expected += 1;
                        }
                        None => thread::yield_now(),
                    }
                }
                assert!(consumer.is_empty());
            });
        });

        assert!(queue.is_empty());
    }

    #[test]
    fn full_and_empty_are_reported_by_the_halves() {
        let mut queue = Queue::<u8, 1>::new();
        let (mut producer, mut consumer) = queue.split();
        assert!(consumer.is_empty());
        assert_eq!(consumer.dequeue(), None);
        producer.enqueue(7).unwrap();
        assert!(producer.is_full());
        assert_eq!(producer.enqueue(8), Err(8));
        assert_eq!(consumer.dequeue(), Some(7));
    }
}
