// The relax strategies and the exponential backoff step counter follow the
// designs of spin-rs (relax.rs) and crossbeam-utils (backoff.rs).
//
// Copyright (c) 2014 Mathijs van de Nes
// Copyright (c) 2019 The Crossbeam Project Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Strategies that determine what a waiting participant does between two
//! polls of the shared registers.
//!
//! Every algorithm in this crate waits by re-reading shared memory until its
//! exit condition holds. What happens between two reads does not change any
//! safety or liveness argument, only how much processor time and memory
//! traffic the wait costs. Locks take the strategy as a type parameter; the
//! [`spins`], [`yields`] and [`loops`] modules fix it for every lock at once.
//!
//! [`spins`]: crate::spins
//! [`yields`]: crate::yields
//! [`loops`]: crate::loops

use crate::cfg::hint;

#[cfg(any(feature = "yield", loom, shuttle, test))]
use crate::cfg::thread;

/// A trait implemented by spinning relax strategies.
pub trait Relax {
    /// Initializes the state of one waiting episode.
    fn new() -> Self;

    /// Runs once every time the wait condition is found to still hold.
    fn relax(&mut self);
}

/// Re-polls right away, telling the processor it is inside a busy-wait loop
/// through [`core::hint::spin_loop`].
///
/// The scheduler cannot tell this apart from useful work. With more
/// participants than cores, a waiter may burn a whole time slice while the
/// participant it waits for is not running; prefer [`Yield`] in that
/// situation.
#[derive(Debug)]
pub struct Spin;

impl Relax for Spin {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline(always)]
    fn relax(&mut self) {
        hint::spin_loop();
    }
}

/// Gives the rest of the time slice back to the OS scheduler before
/// re-polling.
///
/// Requires the `yield` feature, which links to the standard library.
#[cfg(any(feature = "yield", loom, shuttle, test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
#[derive(Debug)]
pub struct Yield;

#[cfg(any(feature = "yield", loom, shuttle, test))]
impl Relax for Yield {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline]
    fn relax(&mut self) {
        thread::yield_now();
    }
}

/// Re-polls right away without any processor hint.
///
/// Only useful on targets where the spin-loop hint is missing or
/// miscompiled. Use [`Spin`] otherwise.
#[derive(Debug)]
pub struct Loop;

impl Relax for Loop {
    #[inline(always)]
    fn new() -> Self {
        Self
    }

    #[inline(always)]
    fn relax(&mut self) {}
}

/// Like [`Spin`], but doubles the number of spin-loop hints issued between
/// two polls, up to `2^6` hints.
///
/// Polling less often lowers the traffic on the cache lines holding the
/// shared flags, tickets or levels. The wait condition is still re-checked
/// after every round, so the algorithm observes exactly the same states.
#[derive(Debug)]
pub struct SpinBackoff {
    step: Step,
}

impl SpinBackoff {
    const SPIN_LIMIT: u32 = 6;
}

impl Relax for SpinBackoff {
    #[inline(always)]
    fn new() -> Self {
        Self { step: Step(0) }
    }

    #[inline(always)]
    fn relax(&mut self) {
        self.step.spin_to(Self::SPIN_LIMIT);
        self.step.step_to(Self::SPIN_LIMIT);
    }
}

/// Like [`SpinBackoff`] while the wait is short, then falls back to
/// [`Yield`] once the step count passes the spin limit.
///
/// Requires the `yield` feature, which links to the standard library.
#[cfg(any(feature = "yield", loom, shuttle, test))]
#[cfg_attr(docsrs, doc(cfg(feature = "yield")))]
#[derive(Debug)]
pub struct YieldBackoff {
    step: Step,
}

#[cfg(any(feature = "yield", loom, shuttle, test))]
impl YieldBackoff {
    const SPIN_LIMIT: u32 = SpinBackoff::SPIN_LIMIT;
    const YIELD_LIMIT: u32 = 10;
}

#[cfg(any(feature = "yield", loom, shuttle, test))]
impl Relax for YieldBackoff {
    #[inline(always)]
    fn new() -> Self {
        Self { step: Step(0) }
    }

    #[inline(always)]
    fn relax(&mut self) {
        if self.step.0 <= Self::SPIN_LIMIT {
            self.step.spin_to(Self::SPIN_LIMIT);
        } else {
            thread::yield_now();
        }
        self.step.step_to(Self::YIELD_LIMIT);
    }
}

/// Number of rounds taken so far in one waiting episode.
#[derive(Debug)]
struct Step(u32);

impl Step {
    /// Issues `2^min(step, max)` spin-loop hints.
    fn spin_to(&self, max: u32) {
        for _ in 0..1u32 << self.0.min(max) {
            hint::spin_loop();
        }
    }

    /// Increments the step, saturating one past `end`.
    fn step_to(&mut self, end: u32) {
        if self.0 <= end {
            self.0 += 1;
        }
    }
}

#[cfg(all(not(any(loom, shuttle)), test))]
mod test {
    use super::{Relax, SpinBackoff, Step, YieldBackoff};

    #[test]
    fn step_saturates_one_past_end() {
        let mut step = Step(0);
        for _ in 0..100 {
            step.step_to(SpinBackoff::SPIN_LIMIT);
        }
        assert_eq!(step.0, SpinBackoff::SPIN_LIMIT + 1);
    }

    #[test]
    fn backoff_relax_advances_step() {
        let mut backoff = SpinBackoff::new();
        backoff.relax();
        backoff.relax();
        assert_eq!(backoff.step.0, 2);

        let mut backoff = YieldBackoff::new();
        for _ in 0..20 {
            backoff.relax();
        }
        assert_eq!(backoff.step.0, YieldBackoff::YIELD_LIMIT + 1);
    }
}
