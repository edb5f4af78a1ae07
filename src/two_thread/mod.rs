//! Flag based locks for exactly two participants, ids `0` and `1`.
//!
//! All three locks keep one "I want to enter" flag per participant. They
//! differ only in the order in which a participant raises its own flag and
//! inspects the other one, and that order alone decides which guarantee
//! survives:
//!
//! | lock         | protocol                                  | mutual exclusion | deadlock free |
//! |--------------|-------------------------------------------|------------------|---------------|
//! | [`LockOne`]  | raise own flag, wait while other raised   | yes              | no            |
//! | [`LockTwo`]  | wait while other raised, raise own flag   | no               | yes           |
//! | [`Peterson`] | raise own flag, yield turn, wait          | yes              | yes, starvation free |
//!
//! [`LockOne`] and [`LockTwo`] are kept on purpose as counterexamples. Do not
//! use them to protect anything.

mod lock_one;
mod lock_two;
mod peterson;

pub use lock_one::LockOne;
pub use lock_two::LockTwo;
pub use peterson::Peterson;

use crate::cfg::atomic::AtomicBool;
use crate::lock::check_id;
use crate::register::Register;

/// Number of participants of every two-thread lock.
const PARTICIPANTS: usize = 2;

/// One "wants to enter" flag per participant. Only the owner writes its
/// flag; both participants read both.
#[derive(Debug)]
struct Flags([AtomicBool; PARTICIPANTS]);

impl Flags {
    #[cfg(not(any(loom, shuttle)))]
    const fn new() -> Self {
        Self([const { AtomicBool::new(false) }; PARTICIPANTS])
    }

    #[cfg(any(loom, shuttle))]
    fn new() -> Self {
        Self(core::array::from_fn(|_| AtomicBool::new(false)))
    }

    fn raise(&self, id: usize) {
        self.0[id].write(true);
    }

    fn lower(&self, id: usize) {
        self.0[id].write(false);
    }

    fn is_raised(&self, id: usize) -> bool {
        self.0[id].read()
    }
}

/// Returns the id of the participant competing with `id`.
#[track_caller]
#[inline]
fn other(id: usize) -> usize {
    check_id(id, PARTICIPANTS);
    1 - id
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use super::{other, Flags};

    #[test]
    fn other_participant() {
        assert_eq!(other(0), 1);
        assert_eq!(other(1), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn other_rejects_third_participant() {
        other(2);
    }

    #[test]
    fn flags_are_independent() {
        let flags = Flags::new();
        flags.raise(1);
        assert!(!flags.is_raised(0));
        assert!(flags.is_raised(1));
        flags.lower(1);
        assert!(!flags.is_raised(1));
    }
}
