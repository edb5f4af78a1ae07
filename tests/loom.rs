//! Exhaustive interleaving checks of the SPSC queue with Loom.
//!
//! Run with `RUSTFLAGS="--cfg loom" cargo test --test loom --release`.

#![cfg(loom)]

use loom::thread;
use softlock::spsc::{Consumer, Producer, Queue};

/// Leaks a fresh queue so its halves can move into `'static` threads.
fn split<const N: usize>() -> (Producer<'static, usize, N>, Consumer<'static, usize, N>) {
    let queue: &'static mut Queue<usize, N> = Box::leak(Box::new(Queue::new()));
    queue.split()
}

#[test]
fn items_arrive_once_and_in_order() {
    loom::model(|| {
        let (mut producer, mut consumer) = split::<2>();

        let handle = thread::spawn(move || {
            for i in 0..3 {
                while producer.enqueue(i).is_err() {
                    thread::yield_now();
                }
            }
        });

        for expected in 0..3 {
            loop {
                if let Some(item) = consumer.dequeue() {
                    assert_eq!(item, expected);
                    break;
                }
                thread::yield_now();
            }
        }
        assert_eq!(consumer.dequeue(), None);

        handle.join().unwrap();
    });
}

#[test]
fn full_and_empty_never_block() {
    loom::model(|| {
        let (mut producer, mut consumer) = split::<1>();

        let handle = thread::spawn(move || {
            let first = producer.enqueue(1).is_ok();
            let second = producer.enqueue(2).is_ok();
            (first, second)
        });

        let taken = consumer.dequeue();
        let (first, second) = handle.join().unwrap();

        assert!(first);
        match taken {
            // The consumer ran before anything was published.
            None => assert!(!second),
            // The slot was freed, so the second item may or may not fit.
            Some(item) => {
                assert_eq!(item, 1);
                assert_eq!(consumer.dequeue(), second.then_some(2));
            }
        }
    });
}
