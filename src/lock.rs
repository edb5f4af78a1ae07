//! The contract shared by every mutual exclusion algorithm in this crate.

/// A lock for a fixed set of participants identified by the ids
/// `0..PARTICIPANTS`.
///
/// Ids are assigned by the caller, not by the lock. Each id must be used by
/// at most one thread at a time, and a thread holding the lock under some id
/// must not call [`lock`] again with that id before the matching [`unlock`].
/// Breaking these preconditions does not cause memory unsafety, but it
/// voids every guarantee the algorithm makes. Use [`Mutex`] to have them
/// checked by the compiler instead.
///
/// Implementing `RawLock` alone does not promise mutual exclusion. That
/// promise is the [`MutualExclusion`] marker, which the deliberately broken
/// [`LockTwo`] does not carry.
///
/// [`lock`]: RawLock::lock
/// [`unlock`]: RawLock::unlock
/// [`Mutex`]: crate::Mutex
/// [`LockTwo`]: crate::two_thread::LockTwo
pub trait RawLock {
    /// Number of participants this lock coordinates.
    const PARTICIPANTS: usize;

    /// Busy-waits until the participant `id` may enter its critical section.
    ///
    /// # Panics
    ///
    /// Panics if `id >= Self::PARTICIPANTS`.
    fn lock(&self, id: usize);

    /// Leaves the critical section previously entered by participant `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= Self::PARTICIPANTS`.
    fn unlock(&self, id: usize);
}

/// Marker for locks under which at most one participant is ever between a
/// completed [`RawLock::lock`] and its matching [`RawLock::unlock`].
///
/// # Safety
///
/// [`Mutex`] hands out exclusive references to its data based on this
/// promise. An implementation that lets two participants in at once causes
/// data races.
///
/// [`Mutex`]: crate::Mutex
pub unsafe trait MutualExclusion: RawLock {}

/// Marker for locks where, if some participant is trying to enter, some
/// participant eventually enters.
pub trait DeadlockFree: MutualExclusion {}

/// Marker for locks where every participant trying to enter eventually
/// enters, given a fair scheduler.
pub trait StarvationFree: DeadlockFree {}

/// Checks that `id` names one of the `participants` of a lock.
#[track_caller]
#[inline]
pub(crate) fn check_id(id: usize, participants: usize) {
    assert!(id < participants, "participant id {id} out of range for a lock of {participants}");
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use super::check_id;

    #[test]
    fn accepts_ids_in_range() {
        check_id(0, 2);
        check_id(1, 2);
        check_id(7, 8);
    }

    #[test]
    #[should_panic(expected = "participant id 2 out of range for a lock of 2")]
    fn rejects_id_out_of_range() {
        check_id(2, 2);
    }
}
