use core::fmt;
#[cfg(not(loom))]
use core::ops::{Deref, DerefMut};

use displaydoc::Display;
use tracing::debug;

use crate::cfg::atomic::AtomicUsize;
use crate::cfg::cell::{UnsafeCell, UnsafeCellWith};
use crate::lock::MutualExclusion;
use crate::register::Register;

/// The error returned when a specific participant id cannot be claimed.
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq)]
pub enum ClaimError {
    /// participant id {id} is out of range, the mutex admits {participants} participants
    OutOfRange {
        /// The requested id.
        id: usize,
        /// Number of ids the mutex hands out.
        participants: usize,
    },
    /// participant id {0} is already claimed
    Taken(usize),
}

impl core::error::Error for ClaimError {}

/// A mutual exclusion primitive protecting shared data with one of the
/// software locks of this crate.
///
/// The raw locks identify callers by a participant id, and are only correct
/// if every id is used by one thread at a time and never re-entered. A
/// `Mutex` enforces both: the data is only reachable through a
/// [`Participant`] handle, each handle owns a distinct id, and locking
/// borrows the handle mutably for as long as the [`MutexGuard`] lives.
///
/// Any lock implementing [`MutualExclusion`] can be used. At most
/// `min(L::PARTICIPANTS, usize::BITS)` handles exist at once; a dropped
/// handle gives its id back.
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use softlock::spins::Bakery;
/// use softlock::Mutex;
///
/// const N: usize = 4;
/// let mutex = Mutex::<_, Bakery<N>>::new(0);
///
/// thread::scope(|s| {
///     for _ in 0..N {
///         let mut participant = mutex.participant().unwrap();
///         s.spawn(move || {
///             // The shared state can only be accessed once the lock is held.
///             *participant.lock() += 1;
///         });
///     }
/// });
///
/// assert_eq!(mutex.into_inner(), N);
/// ```
pub struct Mutex<T: ?Sized, L> {
    lock: L,
    claimed: AtomicUsize,
    data: UnsafeCell<T>,
}

// SAFETY: A `Mutex` is safe to be sent across thread boundaries as long as
// the lock and the inlined protected data `T` are also safe to be sent.
unsafe impl<T: ?Sized + Send, L: Send> Send for Mutex<T, L> {}
// SAFETY: The data is only reached through guards, guards only exist while
// a participant holds a `MutualExclusion` lock, and participant ids are
// unique. So access to `T` is serialized, but only if `T` can be sent to
// other threads.
unsafe impl<T: ?Sized + Send, L: MutualExclusion + Sync> Sync for Mutex<T, L> {}

impl<T, L> Mutex<T, L> {
    /// Creates a new mutex guarded by `lock`, ready for use.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spins::Peterson;
    /// use softlock::Mutex;
    ///
    /// static MUTEX: Mutex<i32, Peterson> = Mutex::with_lock(Peterson::new(), 0);
    /// ```
    #[cfg(not(any(loom, shuttle)))]
    #[inline]
    pub const fn with_lock(lock: L, value: T) -> Self {
        let claimed = AtomicUsize::new(0);
        let data = UnsafeCell::new(value);
        Self { lock, claimed, data }
    }

    /// Creates a new mutex with model checker primitives (non-const).
    #[cfg(any(loom, shuttle))]
    pub fn with_lock(lock: L, value: T) -> Self {
        let claimed = AtomicUsize::new(0);
        let data = UnsafeCell::new(value);
        Self { lock, claimed, data }
    }

    /// Consumes this mutex, returning the underlying data.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spins::Peterson;
    /// use softlock::Mutex;
    ///
    /// let mutex = Mutex::<_, Peterson>::new(0);
    /// assert_eq!(mutex.into_inner(), 0);
    /// ```
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T, L: Default> Mutex<T, L> {
    /// Creates a new mutex with a default constructed lock.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spins::Filter;
    /// use softlock::Mutex;
    ///
    /// let mutex = Mutex::<_, Filter<3>>::new(0);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Self::with_lock(L::default(), value)
    }
}

impl<T: ?Sized, L> Mutex<T, L> {
    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `Mutex` mutably, no actual locking needs to
    /// take place - the mutable borrow statically guarantees no locks exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spins::Peterson;
    /// use softlock::Mutex;
    ///
    /// let mut mutex = Mutex::<_, Peterson>::new(0);
    /// *mutex.get_mut() = 10;
    /// assert_eq!(*mutex.participant().unwrap().lock(), 10);
    /// ```
    #[cfg(not(loom))]
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Returns a read-only view of the lock guarding the data.
    ///
    /// The view exposes the lock's state snapshots, such as
    /// [`LockState::ticket`] and [`LockState::level`], but not its `lock`
    /// and `unlock` operations, which only participant handles may drive.
    ///
    /// ```compile_fail
    /// use softlock::spins::Peterson;
    /// use softlock::{Mutex, RawLock};
    ///
    /// let mutex = Mutex::<_, Peterson>::new(0);
    /// mutex.lock_state().unlock(0);
    /// ```
    #[inline]
    pub fn lock_state(&self) -> LockState<'_, L> {
        LockState { lock: &self.lock }
    }
}

impl<T: ?Sized, L: MutualExclusion> Mutex<T, L> {
    /// Number of ids this mutex hands out.
    const PARTICIPANTS: usize = {
        let bits = usize::BITS as usize;
        if L::PARTICIPANTS < bits {
            L::PARTICIPANTS
        } else {
            bits
        }
    };

    /// Claims the lowest free participant id.
    ///
    /// Returns `None` if every id is currently claimed.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spins::Peterson;
    /// use softlock::Mutex;
    ///
    /// let mutex = Mutex::<_, Peterson>::new(());
    /// let first = mutex.participant().unwrap();
    /// let second = mutex.participant().unwrap();
    /// assert_eq!((first.id(), second.id()), (0, 1));
    /// assert!(mutex.participant().is_none());
    ///
    /// drop(first);
    /// assert_eq!(mutex.participant().unwrap().id(), 0);
    /// ```
    pub fn participant(&self) -> Option<Participant<'_, T, L>> {
        loop {
            let claimed = self.claimed.read();
            let id = claimed.trailing_ones() as usize;
            if id >= Self::PARTICIPANTS {
                debug!(claimed, "every participant id is taken");
                return None;
            }
            if self.claimed.compare_and_set(claimed, claimed | 1 << id) {
                return Some(Participant { mutex: self, id });
            }
        }
    }

    /// Claims participant id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::OutOfRange`] if the mutex does not admit `id`
    /// and [`ClaimError::Taken`] if another handle currently owns it.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spins::Bakery;
    /// use softlock::{ClaimError, Mutex};
    ///
    /// let mutex = Mutex::<_, Bakery<3>>::new(());
    /// let participant = mutex.participant_at(2).unwrap();
    /// assert_eq!(participant.id(), 2);
    /// assert_eq!(mutex.participant_at(2).unwrap_err(), ClaimError::Taken(2));
    /// ```
    pub fn participant_at(&self, id: usize) -> Result<Participant<'_, T, L>, ClaimError> {
        let participants = Self::PARTICIPANTS;
        if id >= participants {
            return Err(ClaimError::OutOfRange { id, participants });
        }
        let bit = 1 << id;
        loop {
            let claimed = self.claimed.read();
            if claimed & bit != 0 {
                return Err(ClaimError::Taken(id));
            }
            if self.claimed.compare_and_set(claimed, claimed | bit) {
                return Ok(Participant { mutex: self, id });
            }
        }
    }

    /// Gives participant id `id` back.
    fn release(&self, id: usize) {
        let bit = 1 << id;
        loop {
            let claimed = self.claimed.read();
            if self.claimed.compare_and_set(claimed, claimed & !bit) {
                return;
            }
        }
    }
}

impl<T: Default, L: Default> Default for Mutex<T, L> {
    /// Creates a `Mutex<T, L>`, with the `Default` value for `T`.
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T, L: Default> From<T> for Mutex<T, L> {
    /// Creates a `Mutex<T, L>` from a instance of `T`.
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized, L: fmt::Debug> fmt::Debug for Mutex<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        d.field("lock", &self.lock);
        d.field("claimed", &format_args!("{:#b}", self.claimed.read()));
        d.finish_non_exhaustive()
    }
}

/// A read-only view of the lock inside a [`Mutex`].
///
/// Returned by [`Mutex::lock_state`]. Snapshots read through it are racy
/// and only meant for instrumentation.
pub struct LockState<'a, L> {
    pub(crate) lock: &'a L,
}

impl<L> Clone for LockState<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for LockState<'_, L> {}

impl<L: fmt::Debug> fmt::Debug for LockState<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.lock, f)
    }
}

/// A handle owning one participant id of a [`Mutex`].
///
/// Move it into the thread that will compete for the lock. Dropping the
/// handle gives its id back to the mutex.
pub struct Participant<'a, T: ?Sized, L: MutualExclusion> {
    mutex: &'a Mutex<T, L>,
    id: usize,
}

impl<'a, T: ?Sized, L: MutualExclusion> Participant<'a, T, L> {
    /// The participant id this handle owns.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Acquires the mutex, busy-waiting until it is able to do so.
    ///
    /// The returned guard releases the lock when dropped. It borrows this
    /// handle mutably, so the same participant cannot lock twice.
    pub fn lock(&mut self) -> MutexGuard<'_, T, L> {
        self.mutex.lock.lock(self.id);
        MutexGuard { mutex: self.mutex, id: self.id }
    }

    /// Acquires the mutex and runs `f` against the protected data, releasing
    /// the lock once `f` returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use softlock::spins::Peterson;
    /// use softlock::Mutex;
    ///
    /// let mutex = Mutex::<_, Peterson>::new(1);
    /// let mut participant = mutex.participant().unwrap();
    /// let value = participant.lock_then(|data| {
    ///     *data += 1;
    ///     *data
    /// });
    /// assert_eq!(value, 2);
    /// ```
    pub fn lock_then<F, Ret>(&mut self, f: F) -> Ret
    where
        F: FnOnce(&mut T) -> Ret,
    {
        let mut guard = self.lock();
        guard.data_with_mut(f)
    }
}

impl<'a, T: ?Sized, L: MutualExclusion> Drop for Participant<'a, T, L> {
    fn drop(&mut self) {
        self.mutex.release(self.id);
    }
}

impl<'a, T: ?Sized, L: MutualExclusion> fmt::Debug for Participant<'a, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant").field("id", &self.id).finish_non_exhaustive()
    }
}

/// An RAII implementation of a "scoped lock" of a mutex. When this structure is
/// dropped (falls out of scope), the lock will be unlocked.
///
/// The data protected by the mutex can be accessed through this guard via its
/// [`Deref`] and [`DerefMut`] implementations.
///
/// A guard can be shared between threads only if `T` can:
///
/// ```compile_fail
/// use core::cell::Cell;
///
/// use softlock::spins::Peterson;
/// use softlock::MutexGuard;
///
/// fn assert_sync<T: Sync>() {}
/// assert_sync::<MutexGuard<'static, Cell<i32>, Peterson>>();
/// ```
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized, L: MutualExclusion> {
    mutex: &'a Mutex<T, L>,
    id: usize,
}

// SAFETY: A shared guard only hands out `&T`, so sharing it between threads
// is sound as long as `T` itself is `Sync`.
unsafe impl<'a, T: ?Sized + Sync, L: MutualExclusion> Sync for MutexGuard<'a, T, L> {}

impl<'a, T: ?Sized, L: MutualExclusion> MutexGuard<'a, T, L> {
    /// Runs `f` with an immutable reference to the protected data.
    fn data_with<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&T) -> Ret,
    {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { self.mutex.data.with_unchecked(f) }
    }

    /// Runs `f` with a mutable reference to the protected data.
    fn data_with_mut<F, Ret>(&mut self, f: F) -> Ret
    where
        F: FnOnce(&mut T) -> Ret,
    {
        // SAFETY: A guard instance holds the lock locked, and we hold the
        // guard mutably.
        unsafe { self.mutex.data.with_mut_unchecked(f) }
    }
}

#[cfg(not(loom))]
impl<'a, T: ?Sized, L: MutualExclusion> Deref for MutexGuard<'a, T, L> {
    type Target = T;

    /// Dereferences the guard to access the underlying data.
    fn deref(&self) -> &T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &*self.mutex.data.get() }
    }
}

#[cfg(not(loom))]
impl<'a, T: ?Sized, L: MutualExclusion> DerefMut for MutexGuard<'a, T, L> {
    /// Mutably dereferences the guard to access the underlying data.
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: A guard instance holds the lock locked.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized + fmt::Debug, L: MutualExclusion> fmt::Debug for MutexGuard<'a, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.data_with(|data| fmt::Debug::fmt(data, f))
    }
}

impl<'a, T: ?Sized + fmt::Display, L: MutualExclusion> fmt::Display for MutexGuard<'a, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.data_with(|data| fmt::Display::fmt(data, f))
    }
}

impl<'a, T: ?Sized, L: MutualExclusion> Drop for MutexGuard<'a, T, L> {
    fn drop(&mut self) {
        self.mutex.lock.unlock(self.id);
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    // Test suite adapted from the Rust's Mutex implementation, with the
    // participant handles this crate requires.
    //
    // Copyright 2014 The Rust Project Developers.
    //
    // Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
    // http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
    // <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
    // option. This file may not be copied, modified, or distributed
    // except according to those terms.

    use std::format;
    use std::string::ToString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::{ClaimError, Mutex};
    use crate::bakery::Bakery;
    use crate::filter::Filter;
    use crate::relax::{Spin, Yield};
    use crate::test::{self, Int};
    use crate::two_thread::{LockOne, Peterson};

    type PetersonMutex<T> = Mutex<T, Peterson<Yield>>;

    #[derive(Eq, PartialEq, Debug)]
    struct NonCopy(u32);

    #[test]
    fn smoke() {
        let m = PetersonMutex::new(());
        let mut participant = m.participant().unwrap();
        drop(participant.lock());
        drop(participant.lock());
    }

    #[test]
    fn lots_and_lots_peterson() {
        test::lots_and_lots::<Peterson<Yield>>(1_000);
    }

    #[test]
    fn lots_and_lots_filter() {
        test::lots_and_lots::<Filter<3, Yield>>(500);
    }

    #[test]
    fn lots_and_lots_bakery() {
        test::lots_and_lots::<Bakery<3, Yield>>(500);
    }

    #[test]
    fn lock_one_guards_uncontended_data() {
        let m = Mutex::<Int, LockOne<Spin>>::new(0);
        let mut participant = m.participant().unwrap();
        for _ in 0..10 {
            participant.lock_then(|data| *data += 1);
        }
        drop(participant);
        assert_eq!(m.into_inner(), 10);
    }

    #[test]
    fn participants_are_bounded_and_recycled() {
        let m = Mutex::<(), Bakery<3, Spin>>::new(());
        let a = m.participant().unwrap();
        let b = m.participant().unwrap();
        let c = m.participant().unwrap();
        assert_eq!([a.id(), b.id(), c.id()], [0, 1, 2]);
        assert!(m.participant().is_none());
        drop(b);
        assert_eq!(m.participant().unwrap().id(), 1);
    }

    #[test]
    fn participant_at_reports_errors() {
        let m = Mutex::<(), Filter<2, Spin>>::new(());
        let taken = m.participant_at(1).unwrap();
        assert_eq!(m.participant_at(1).unwrap_err(), ClaimError::Taken(1));
        let err = m.participant_at(2).unwrap_err();
        assert_eq!(err, ClaimError::OutOfRange { id: 2, participants: 2 });
        assert_eq!(
            err.to_string(),
            "participant id 2 is out of range, the mutex admits 2 participants"
        );
        assert_eq!(ClaimError::Taken(1).to_string(), "participant id 1 is already claimed");
        // The lowest free id skips the one already claimed.
        assert_eq!(m.participant().unwrap().id(), 0);
        drop(taken);
    }

    #[test]
    fn participants_beyond_usize_bits_are_not_handed_out() {
        let m = Mutex::<(), Bakery<80, Spin>>::new(());
        let handles: std::vec::Vec<_> = core::iter::from_fn(|| m.participant()).collect();
        assert_eq!(handles.len(), usize::BITS as usize);
        assert!(matches!(m.participant_at(70), Err(ClaimError::OutOfRange { .. })));
    }

    #[test]
    fn lock_state_is_observable() {
        let m = Mutex::<(), Bakery<2, Spin>>::new(());
        let mut participant = m.participant_at(1).unwrap();
        let guard = participant.lock();
        assert_eq!(m.lock_state().ticket(1), 1);
        drop(guard);
        assert_eq!(m.lock_state().ticket(1), 0);

        let m = Mutex::<(), Filter<3, Spin>>::new(());
        let mut participant = m.participant_at(2).unwrap();
        let guard = participant.lock();
        assert_eq!(m.lock_state().level(2), 2);
        assert_eq!(m.lock_state().level(0), 0);
        drop(guard);
        assert_eq!(m.lock_state().level(2), 0);
    }

    #[test]
    fn lock_state_debug_matches_lock() {
        let m = PetersonMutex::new(());
        let state = m.lock_state();
        assert!(format!("{state:?}").starts_with("Peterson {"));
    }

    #[test]
    fn guards_are_sync_when_data_is() {
        fn assert_sync<T: Sync>(_: &T) {}
        let m = PetersonMutex::new(0);
        let mut participant = m.participant().unwrap();
        let guard = participant.lock();
        assert_sync(&guard);
        thread::scope(|s| {
            let shared = &guard;
            s.spawn(move || assert_eq!(**shared, 0));
            s.spawn(move || assert_eq!(**shared, 0));
        });
    }

    #[test]
    fn test_into_inner() {
        let m = PetersonMutex::new(NonCopy(10));
        assert_eq!(m.into_inner(), NonCopy(10));
    }

    #[test]
    fn test_into_inner_drop() {
        struct Foo(Arc<AtomicUsize>);
        impl Drop for Foo {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let num_drops = Arc::new(AtomicUsize::new(0));
        let m = PetersonMutex::new(Foo(num_drops.clone()));
        assert_eq!(num_drops.load(Ordering::SeqCst), 0);
        {
            let _inner = m.into_inner();
            assert_eq!(num_drops.load(Ordering::SeqCst), 0);
        }
        assert_eq!(num_drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_mut() {
        let mut m = PetersonMutex::new(NonCopy(10));
        *m.get_mut() = NonCopy(20);
        assert_eq!(m.into_inner(), NonCopy(20));
    }

    #[test]
    fn test_mutex_default_and_from() {
        let m: PetersonMutex<Int> = Default::default();
        assert_eq!(m.into_inner(), 0);
        let m = PetersonMutex::from(42);
        assert_eq!(m.into_inner(), 42);
    }

    #[test]
    fn test_guard_debug_display() {
        let value = 42;
        let m = PetersonMutex::new(value);
        let mut participant = m.participant().unwrap();
        let guard = participant.lock();
        assert_eq!(format!("{value:?}"), format!("{guard:?}"));
        assert_eq!(format!("{value}"), format!("{guard}"));
    }

    #[test]
    fn test_mutex_debug() {
        let m = PetersonMutex::new(0);
        let _participant = m.participant().unwrap();
        let debug = format!("{m:?}");
        assert!(debug.starts_with("Mutex { lock: Peterson {"));
        assert!(debug.ends_with("claimed: 0b1, .. }"));
    }

    #[test]
    fn test_lock_arc_nested() {
        // Tests nested locks and access to underlying data.
        let arc = Arc::new(PetersonMutex::new(1));
        let arc2 = Arc::new(Mutex::<_, Bakery<2, Yield>>::new(arc));
        let _t = thread::spawn(move || {
            let mut outer = arc2.participant().unwrap();
            let guard = outer.lock();
            let mut inner = guard.participant().unwrap();
            let value = *inner.lock();
            assert_eq!(value, 1);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_lock_arc_access_in_unwind() {
        let arc = Arc::new(PetersonMutex::new(1));
        let arc2 = arc.clone();
        let _ = thread::spawn(move || {
            struct Unwinder {
                i: Arc<PetersonMutex<i32>>,
            }
            impl Drop for Unwinder {
                fn drop(&mut self) {
                    *self.i.participant().unwrap().lock() += 1;
                }
            }
            let _u = Unwinder { i: arc2 };
            panic!();
        })
        .join();
        let value = *arc.participant().unwrap().lock();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_lock_unsized() {
        let m: &Mutex<[i32], Peterson<Spin>> = &Mutex::<_, Peterson<Spin>>::new([1, 2, 3]);
        let mut participant = m.participant().unwrap();
        {
            let b = &mut *participant.lock();
            b[0] = 4;
            b[2] = 5;
        }
        let comp: &[i32] = &[4, 2, 5];
        assert_eq!(&*participant.lock(), comp);
    }
}
