// Test suite from the Rust's Mutex implementation with modifications since
// every access goes through a participant handle, and some new tests as well.
//
// Copyright 2014 The Rust Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![cfg(not(any(loom, shuttle)))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use softlock::spins::backoff::{Bakery, Filter, Peterson};
use softlock::{ClaimError, Mutex, RawLock};
use test_log::test;

#[derive(Eq, PartialEq, Debug)]
struct NonCopy(i32);

#[test]
fn smoke() {
    let m = Mutex::<_, Peterson>::new(());
    let mut participant = m.participant().unwrap();
    drop(participant.lock());
    drop(participant.lock());
}

#[test]
fn lots_and_lots() {
    static LOCK: Mutex<u32, Peterson> = Mutex::with_lock(Peterson::new(), 0);

    const ITERS: u32 = 1000;

    thread::scope(|s| {
        for _ in 0..Peterson::PARTICIPANTS {
            let mut participant = LOCK.participant().unwrap();
            s.spawn(move || {
                for _ in 0..ITERS {
                    *participant.lock() += 1;
                }
            });
        }
    });

    assert_eq!(*LOCK.participant().unwrap().lock(), ITERS * 2);
}

fn counter<L>(iters: usize)
where
    L: softlock::MutualExclusion + Default + Send + Sync,
{
    let m = Mutex::<usize, L>::new(0);
    thread::scope(|s| {
        for _ in 0..L::PARTICIPANTS {
            let mut participant = m.participant().unwrap();
            s.spawn(move || {
                for _ in 0..iters {
                    participant.lock_then(|data| *data += 1);
                }
            });
        }
    });
    assert_eq!(m.into_inner(), iters * L::PARTICIPANTS);
}

#[test]
fn filter_counter() {
    counter::<Filter<3>>(300);
}

#[test]
fn bakery_counter() {
    counter::<Bakery<3>>(300);
}

#[test]
fn ids_are_handed_out_lowest_first() {
    let m = Mutex::<(), Bakery<4>>::new(());
    let b = m.participant_at(1).unwrap();
    let a = m.participant().unwrap();
    let c = m.participant().unwrap();
    assert_eq!((a.id(), b.id(), c.id()), (0, 1, 2));
    drop(a);
    assert_eq!(m.participant().unwrap().id(), 0);
}

#[test]
fn claim_errors() {
    let m = Mutex::<(), Filter<2>>::new(());
    let _first = m.participant_at(0).unwrap();
    assert_eq!(m.participant_at(0).unwrap_err(), ClaimError::Taken(0));
    assert_eq!(
        m.participant_at(9).unwrap_err(),
        ClaimError::OutOfRange { id: 9, participants: 2 }
    );
    let err: Box<dyn std::error::Error> = Box::new(ClaimError::Taken(0));
    assert_eq!(err.to_string(), "participant id 0 is already claimed");
}

#[test]
fn test_into_inner() {
    let m = Mutex::<_, Peterson>::new(NonCopy(10));
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
    let m = Mutex::<_, Peterson>::new(Foo(num_drops.clone()));
    assert_eq!(num_drops.load(Ordering::SeqCst), 0);
    {
        let _inner = m.into_inner();
        assert_eq!(num_drops.load(Ordering::SeqCst), 0);
    }
    assert_eq!(num_drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_get_mut() {
    let mut m = Mutex::<_, Peterson>::new(NonCopy(10));
    *m.get_mut() = NonCopy(20);
    assert_eq!(m.into_inner(), NonCopy(20));
}

#[test]
fn strict_alternation_through_shared_turn() {
    // Two participants alternate strictly through a shared turn counter.
    let m = Arc::new(Mutex::<_, Peterson>::new(0_u32));
    const ROUNDS: u32 = 100;
    let handles: Vec<_> = (0..2)
        .map(|parity| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                let mut participant = m.participant().unwrap();
                let mut done = 0;
                while done < ROUNDS {
                    let mut turn = participant.lock();
                    if *turn % 2 == parity {
                        *turn += 1;
                        done += 1;
                    }
                    drop(turn);
                    thread::yield_now();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*m.participant().unwrap().lock(), 2 * ROUNDS);
}

#[test]
fn test_lock_arc_access_in_unwind() {
    let arc = Arc::new(Mutex::<_, Peterson>::new(1));
    let arc2 = arc.clone();
    let _ = thread::spawn(move || {
        struct Unwinder {
            i: Arc<Mutex<i32, Peterson>>,
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
    let lock = *arc.participant().unwrap().lock();
    assert_eq!(lock, 2);
}

#[test]
fn test_lock_unsized() {
    let m: &Mutex<[i32], Peterson> = &Mutex::<_, Peterson>::new([1, 2, 3]);
    let mut participant = m.participant().unwrap();
    {
        let b = &mut *participant.lock();
        b[0] = 4;
        b[2] = 5;
    }
    let comp: &[i32] = &[4, 2, 5];
    assert_eq!(&*participant.lock(), comp);
}
