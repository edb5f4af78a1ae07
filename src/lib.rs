//! Software-only mutual exclusion, built from nothing but atomic loads,
//! stores and compare-and-swap on shared registers.
//!
//! This crate implements the classic constructions for coordinating threads
//! without an underlying lock primitive:
//!
//! - [`LockOne`] and [`LockTwo`], the two halves of Peterson's lock, each of
//!   which is broken on its own: `LockOne` can deadlock and `LockTwo` can let
//!   both participants in. They are kept as counterexamples.
//! - [`Peterson`], mutually exclusive and starvation free for two
//!   participants.
//! - [`Filter`], Peterson's lock generalized to `N` participants through
//!   `N - 1` levels. Deadlock free, not starvation free.
//! - [`Bakery`], Lamport's ticket lock for `N` participants. First come,
//!   first served.
//! - [`spsc::Queue`], a wait-free bounded queue for one producer and one
//!   consumer, synchronized by publishing two counters.
//!
//! [`Peterson`]: two_thread::Peterson
//! [`LockOne`]: two_thread::LockOne
//! [`LockTwo`]: two_thread::LockTwo
//! [`Filter`]: filter::Filter
//! [`Bakery`]: bakery::Bakery
//!
//! ## Participants
//!
//! Every lock coordinates a fixed set of participants identified by the ids
//! `0..N`, and the caller picks the id on each [`RawLock::lock`] and
//! [`RawLock::unlock`] call. An id must not be used by two threads at once,
//! and must not lock again before it unlocks. The raw locks trust the caller
//! with that. [`Mutex`] does not: it hands out one [`Participant`] per id, and
//! the borrow checker rules out sharing or re-entering one.
//!
//! ```
//! use std::thread;
//!
//! use softlock::spins::Peterson;
//! use softlock::Mutex;
//!
//! let mutex = Mutex::<_, Peterson>::new(0);
//!
//! thread::scope(|s| {
//!     for _ in 0..2 {
//!         let mut participant = mutex.participant().unwrap();
//!         s.spawn(move || {
//!             for _ in 0..100 {
//!                 *participant.lock() += 1;
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(mutex.into_inner(), 200);
//! ```
//!
//! Which guarantees a lock provides is encoded in marker traits:
//! [`MutualExclusion`], [`DeadlockFree`] and [`StarvationFree`]. Only locks
//! implementing `MutualExclusion` can guard a [`Mutex`].
//!
//! ## Memory ordering
//!
//! Every shared access is sequentially consistent. Peterson, Filter and
//! Bakery all store to one register and then load a different one, and that
//! store-load order is the first thing weaker orderings give up.
//!
//! ## Waiting
//!
//! All waiting is busy-waiting. What a participant does between two polls is
//! chosen by a [`Relax`] strategy, and the [`spins`], [`yields`] and
//! [`loops`] modules provide type aliases for every lock with a strategy
//! fixed.
//!
//! [`Relax`]: relax::Relax
//!
//! ## Features
//!
//! This crate does not provide any default features. Features that can be
//! enabled are:
//!
//! ### yield
//!
//! The `yield` feature requires linking to the standard library, so it is not
//! suitable for `no_std` environments. It enables the [`Yield`] and
//! [`YieldBackoff`] strategies, which call [`std::thread::yield_now`] while
//! waiting. That is the strategy to pick when participants may outnumber
//! processor cores.
//!
//! [`Yield`]: relax::Yield
//! [`YieldBackoff`]: relax::YieldBackoff
//! [`std::thread::yield_now`]: https://doc.rust-lang.org/std/thread/fn.yield_now.html

#![cfg_attr(all(not(feature = "yield"), not(test)), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod cfg;
mod lock;
mod locked;
mod mutex;

pub mod bakery;
pub mod filter;
pub mod register;
pub mod relax;
pub mod spsc;
pub mod two_thread;

pub use lock::{DeadlockFree, MutualExclusion, RawLock, StarvationFree};
pub use locked::{LockedQueue, QueueHandle};
pub use mutex::{ClaimError, LockState, Mutex, MutexGuard, Participant};

#[cfg(all(not(any(loom, shuttle)), test))]
mod test;

/// Locks that implement a `spin` relax policy.
///
/// During contention, waiting participants spin while signaling the
/// processor that they are running a busy-wait spin-loop.
pub mod spins {
    use crate::relax::Spin;
    use crate::{bakery, filter, two_thread};

    /// A [`LockOne`](two_thread::LockOne) that implements the [`Spin`] relax
    /// policy.
    pub type LockOne = two_thread::LockOne<Spin>;

    /// A [`LockTwo`](two_thread::LockTwo) that implements the [`Spin`] relax
    /// policy.
    pub type LockTwo = two_thread::LockTwo<Spin>;

    /// A [`Peterson`](two_thread::Peterson) lock that implements the [`Spin`]
    /// relax policy.
    ///
    /// # Example
    ///
    /// ```
    /// use softlock::spins::Peterson;
    /// use softlock::RawLock;
    ///
    /// let lock = Peterson::new();
    /// lock.lock(1);
    /// lock.unlock(1);
    /// ```
    pub type Peterson = two_thread::Peterson<Spin>;

    /// A [`Filter`](filter::Filter) lock that implements the [`Spin`] relax
    /// policy.
    pub type Filter<const N: usize> = filter::Filter<N, Spin>;

    /// A [`Bakery`](bakery::Bakery) lock that implements the [`Spin`] relax
    /// policy.
    pub type Bakery<const N: usize> = bakery::Bakery<N, Spin>;

    /// Locks that implement a `spin with backoff` relax policy.
    ///
    /// During contention, waiting participants perform exponential backoff
    /// while spinning, signaling the processor that they are running a
    /// busy-wait spin-loop.
    pub mod backoff {
        use crate::relax::SpinBackoff;
        use crate::{bakery, filter, two_thread};

        /// A [`LockOne`](two_thread::LockOne) that implements the
        /// [`SpinBackoff`] relax policy.
        pub type LockOne = two_thread::LockOne<SpinBackoff>;

        /// A [`LockTwo`](two_thread::LockTwo) that implements the
        /// [`SpinBackoff`] relax policy.
        pub type LockTwo = two_thread::LockTwo<SpinBackoff>;

        /// A [`Peterson`](two_thread::Peterson) lock that implements the
        /// [`SpinBackoff`] relax policy.
        pub type Peterson = two_thread::Peterson<SpinBackoff>;

        /// A [`Filter`](filter::Filter) lock that implements the
        /// [`SpinBackoff`] relax policy.
        ///
        /// # Example
        ///
        /// ```
        /// use softlock::spins::backoff::Filter;
        /// use softlock::Mutex;
        ///
        /// let mutex = Mutex::<_, Filter<4>>::new(0);
        /// let value = mutex.participant().unwrap().lock_then(|data| *data);
        /// assert_eq!(value, 0);
        /// ```
        pub type Filter<const N: usize> = filter::Filter<N, SpinBackoff>;

        /// A [`Bakery`](bakery::Bakery) lock that implements the
        /// [`SpinBackoff`] relax policy.
        pub type Bakery<const N: usize> = bakery::Bakery<N, SpinBackoff>;
    }
}

/// Locks that implement a `yield` relax policy.
///
/// During contention, waiting participants yield the current time slice to
/// the OS scheduler.
#[cfg(any(feature = "yield", loom, shuttle, test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
pub mod yields {
    use crate::relax::Yield;
    use crate::{bakery, filter, two_thread};

    /// A [`LockOne`](two_thread::LockOne) that implements the [`Yield`] relax
    /// policy.
    pub type LockOne = two_thread::LockOne<Yield>;

    /// A [`LockTwo`](two_thread::LockTwo) that implements the [`Yield`] relax
    /// policy.
    pub type LockTwo = two_thread::LockTwo<Yield>;

    /// A [`Peterson`](two_thread::Peterson) lock that implements the [`Yield`]
    /// relax policy.
    pub type Peterson = two_thread::Peterson<Yield>;

    /// A [`Filter`](filter::Filter) lock that implements the [`Yield`] relax
    /// policy.
    pub type Filter<const N: usize> = filter::Filter<N, Yield>;

    /// A [`Bakery`](bakery::Bakery) lock that implements the [`Yield`] relax
    /// policy.
    ///
    /// # Example
    ///
    /// ```
    /// use softlock::yields::Bakery;
    /// use softlock::Mutex;
    ///
    /// let mutex = Mutex::<_, Bakery<8>>::new(0);
    /// let value = mutex.participant_at(5).unwrap().lock_then(|data| *data);
    /// assert_eq!(value, 0);
    /// ```
    pub type Bakery<const N: usize> = bakery::Bakery<N, Yield>;

    /// Locks that implement a `yield with backoff` relax policy.
    ///
    /// During contention, waiting participants perform exponential backoff
    /// while spinning, up to a threshold, then yield back to the OS
    /// scheduler.
    pub mod backoff {
        use crate::relax::YieldBackoff;
        use crate::{bakery, filter, two_thread};

        /// A [`LockOne`](two_thread::LockOne) that implements the
        /// [`YieldBackoff`] relax policy.
        pub type LockOne = two_thread::LockOne<YieldBackoff>;

        /// A [`LockTwo`](two_thread::LockTwo) that implements the
        /// [`YieldBackoff`] relax policy.
        pub type LockTwo = two_thread::LockTwo<YieldBackoff>;

        /// A [`Peterson`](two_thread::Peterson) lock that implements the
        /// [`YieldBackoff`] relax policy.
        pub type Peterson = two_thread::Peterson<YieldBackoff>;

        /// A [`Filter`](filter::Filter) lock that implements the
        /// [`YieldBackoff`] relax policy.
        pub type Filter<const N: usize> = filter::Filter<N, YieldBackoff>;

        /// A [`Bakery`](bakery::Bakery) lock that implements the
        /// [`YieldBackoff`] relax policy.
        pub type Bakery<const N: usize> = bakery::Bakery<N, YieldBackoff>;
    }
}

/// Locks that implement a `loop` relax policy.
///
/// During contention, waiting participants rapidly spin without telling the
/// processor to do any power down.
pub mod loops {
    use crate::relax::Loop;
    use crate::{bakery, filter, two_thread};

    /// A [`LockOne`](two_thread::LockOne) that implements the [`Loop`] relax
    /// policy.
    pub type LockOne = two_thread::LockOne<Loop>;

    /// A [`LockTwo`](two_thread::LockTwo) that implements the [`Loop`] relax
    /// policy.
    pub type LockTwo = two_thread::LockTwo<Loop>;

    /// A [`Peterson`](two_thread::Peterson) lock that implements the [`Loop`]
    /// relax policy.
    pub type Peterson = two_thread::Peterson<Loop>;

    /// A [`Filter`](filter::Filter) lock that implements the [`Loop`] relax
    /// policy.
    pub type Filter<const N: usize> = filter::Filter<N, Loop>;

    /// A [`Bakery`](bakery::Bakery) lock that implements the [`Loop`] relax
    /// policy.
    pub type Bakery<const N: usize> = bakery::Bakery<N, Loop>;
}
