//! Shared memory cells the algorithms are built from.
//!
//! A [`Register`] is a single boolean or integer location supporting read,
//! write and compare-and-swap, every one of them sequentially consistent.
//! Peterson, Filter and Bakery all depend on a store to one register being
//! ordered before a later load of a different register in the same thread
//! (store-load ordering), which neither acquire nor release ordering on its
//! own provides. No weaker ordering is used anywhere in the locks.

use core::sync::atomic::Ordering::SeqCst;

use crate::cfg::atomic::{AtomicBool, AtomicUsize};
use crate::relax::Relax;

/// An atomic memory location with sequentially consistent accesses.
pub trait Register {
    /// The type of the value stored in this register.
    type Value: Copy + Eq;

    /// Loads the current value.
    fn read(&self) -> Self::Value;

    /// Stores `value`.
    fn write(&self, value: Self::Value);

    /// Stores `new` if the register currently holds `current`.
    ///
    /// Returns `true` if the value was replaced.
    fn compare_and_set(&self, current: Self::Value, new: Self::Value) -> bool;
}

impl Register for AtomicBool {
    type Value = bool;

    #[inline]
    fn read(&self) -> bool {
        self.load(SeqCst)
    }

    #[inline]
    fn write(&self, value: bool) {
        self.store(value, SeqCst);
    }

    #[inline]
    fn compare_and_set(&self, current: bool, new: bool) -> bool {
        self.compare_exchange(current, new, SeqCst, SeqCst).is_ok()
    }
}

impl Register for AtomicUsize {
    type Value = usize;

    #[inline]
    fn read(&self) -> usize {
        self.load(SeqCst)
    }

    #[inline]
    fn write(&self, value: usize) {
        self.store(value, SeqCst);
    }

    #[inline]
    fn compare_and_set(&self, current: usize, new: usize) -> bool {
        self.compare_exchange(current, new, SeqCst, SeqCst).is_ok()
    }
}

/// Busy-waits while `cond` returns `true`, running the relax strategy `R`
/// between two evaluations.
///
/// This is the only waiting loop in the crate: every suspension point of
/// every lock goes through it.
#[inline]
pub(crate) fn wait_while<R: Relax, F: FnMut() -> bool>(mut cond: F) {
    let mut relax = R::new();
    while cond() {
        relax.relax();
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use core::cell::Cell;

    use super::{wait_while, Register};
    use crate::cfg::atomic::{AtomicBool, AtomicUsize};
    use crate::relax::Loop;

    #[test]
    fn bool_register() {
        let flag = AtomicBool::new(false);
        assert!(!flag.read());
        flag.write(true);
        assert!(flag.read());
        assert!(!flag.compare_and_set(false, true));
        assert!(flag.compare_and_set(true, false));
        assert!(!flag.read());
    }

    #[test]
    fn usize_register() {
        let ticket = AtomicUsize::new(0);
        ticket.write(7);
        assert_eq!(ticket.read(), 7);
        assert!(!ticket.compare_and_set(6, 8));
        assert_eq!(ticket.read(), 7);
        assert!(ticket.compare_and_set(7, 8));
        assert_eq!(ticket.read(), 8);
    }

    fn flip<R: Register>(register: &R, from: R::Value, to: R::Value) -> bool {
        register.compare_and_set(from, to)
    }

    #[test]
    fn compare_and_set_matches_generic_and_concrete_calls() {
        let claimed = AtomicUsize::new(0b01);
        assert!(claimed.compare_and_set(0b01, 0b11));
        assert!(!flip(&claimed, 0b01, 0b00));
        assert!(flip(&claimed, 0b11, 0b10));
        assert_eq!(claimed.read(), 0b10);
    }

    #[test]
    fn wait_while_polls_until_false() {
        let polls = Cell::new(0);
        wait_while::<Loop, _>(|| {
            polls.set(polls.get() + 1);
            polls.get() < 5
        });
        assert_eq!(polls.get(), 5);
    }
}
