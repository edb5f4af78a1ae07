//! Swaps the synchronization primitives for model checker ones.
//!
//! `--cfg loom` selects Loom's atomics and cells, `--cfg shuttle` selects
//! Shuttle's atomics. Everything else in the crate imports from here.

pub mod atomic {
    #[cfg(not(any(loom, shuttle)))]
    pub use core::sync::atomic::{AtomicBool, AtomicUsize};

    #[cfg(loom)]
    pub use loom::sync::atomic::{AtomicBool, AtomicUsize};

    #[cfg(all(shuttle, not(loom)))]
    pub use shuttle::sync::atomic::{AtomicBool, AtomicUsize};
}

pub mod cell {
    pub use sealed::UnsafeCellWith;

    #[cfg(not(loom))]
    pub use core::cell::UnsafeCell;

    #[cfg(loom)]
    pub use loom::cell::UnsafeCell;

    #[cfg(not(loom))]
    impl<T: ?Sized> UnsafeCellWith<T> for UnsafeCell<T> {
        unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&T) -> Ret,
        {
            // SAFETY: Caller must guarantee there are no mutable aliases.
            f(unsafe { &*self.get() })
        }

        unsafe fn with_mut_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&mut T) -> Ret,
        {
            // SAFETY: Caller must guarantee there are no aliases at all.
            f(unsafe { &mut *self.get() })
        }
    }

    #[cfg(loom)]
    impl<T: ?Sized> UnsafeCellWith<T> for UnsafeCell<T> {
        unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&T) -> Ret,
        {
            // SAFETY: Caller must guarantee there are no mutable aliases.
            self.with(|ptr| f(unsafe { &*ptr }))
        }

        unsafe fn with_mut_unchecked<F, Ret>(&self, f: F) -> Ret
        where
            F: FnOnce(&mut T) -> Ret,
        {
            // SAFETY: Caller must guarantee there are no aliases at all.
            self.with_mut(|ptr| f(unsafe { &mut *ptr }))
        }
    }

    mod sealed {
        /// A trait that extends [`UnsafeCell`] to allow running closures
        /// against its underlying data.
        ///
        /// [`UnsafeCell`]: super::UnsafeCell
        pub trait UnsafeCellWith<T: ?Sized> {
            /// Runs `f` against a shared reference borrowed from the cell.
            ///
            /// # Safety
            ///
            /// Caller must guarantee there are no mutable aliases to the
            /// underlying data.
            unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
            where
                F: FnOnce(&T) -> Ret;

            /// Runs `f` against a mutable reference borrowed from the cell.
            ///
            /// # Safety
            ///
            /// Caller must guarantee there are no other references to the
            /// underlying data for the duration of `f`.
            unsafe fn with_mut_unchecked<F, Ret>(&self, f: F) -> Ret
            where
                F: FnOnce(&mut T) -> Ret;
        }
    }
}

pub mod hint {
    #[cfg(not(any(loom, shuttle)))]
    pub use core::hint::spin_loop;

    // A model checker only makes progress on another thread if the spinning
    // thread hands control back to it.
    #[cfg(loom)]
    pub use loom::thread::yield_now as spin_loop;

    #[cfg(all(shuttle, not(loom)))]
    pub use shuttle::thread::yield_now as spin_loop;
}

#[cfg(any(feature = "yield", loom, shuttle, test))]
pub mod thread {
    #[cfg(not(any(loom, shuttle)))]
    pub use std::thread::yield_now;

    #[cfg(loom)]
    pub use loom::thread::yield_now;

    #[cfg(all(shuttle, not(loom)))]
    pub use shuttle::thread::yield_now;
}
