#![cfg(not(any(loom, shuttle)))]

use std::thread;

use softlock::spins::{Bakery, Peterson};
use softlock::spsc::Queue;
use softlock::LockedQueue;
use test_log::test;

#[test]
fn capacity_five_rejects_the_sixth_item() {
    let mut queue = Queue::<char, 5>::new();
    for item in "ABCDE".chars() {
        assert_eq!(queue.enqueue(item), Ok(()));
    }
    assert_eq!(queue.enqueue('F'), Err('F'));
    let drained: String = std::iter::from_fn(|| queue.dequeue()).collect();
    assert_eq!(drained, "ABCDE");
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn pipeline_delivers_every_item_once_in_order() {
    const ITEMS: u64 = 50_000;
    let mut queue = Queue::<u64, 32>::new();
    let (mut producer, mut consumer) = queue.split();

    let sum = thread::scope(|s| {
        s.spawn(move || {
            for i in 0..ITEMS {
                let mut item = i;
                while let Err(rejected) = producer.enqueue(item) {
                    item = rejected;
                    thread::yield_now();
                }
            }
        });

        let consumer = s.spawn(move || {
            let (mut next, mut sum) = (0, 0);
            while next < ITEMS {
                if let Some(item) = consumer.dequeue() {
                    assert_eq!(item, next);
                    sum += item;
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
            sum
        });
        consumer.join().unwrap()
    });

    assert_eq!(sum, ITEMS * (ITEMS - 1) / 2);
    assert!(queue.is_empty());
}

#[test]
fn boxed_items_survive_the_ring() {
    let mut queue = Queue::<Box<str>, 2>::new();
    for round in 0..5 {
        queue.enqueue(format!("item {round}").into()).unwrap();
        assert_eq!(&*queue.dequeue().unwrap(), format!("item {round}"));
    }
}

#[test]
fn locked_queue_between_two_participants() {
    const ITEMS: usize = 2_000;
    let queue = LockedQueue::<usize, Peterson, 4>::new();
    let mut producer = queue.handle().unwrap();
    let mut consumer = queue.handle().unwrap();

    thread::scope(|s| {
        s.spawn(move || {
            for i in 0..ITEMS {
                while producer.enqueue(i).is_err() {
                    thread::yield_now();
                }
            }
        });
        s.spawn(move || {
            for expected in 0..ITEMS {
                loop {
                    match consumer.dequeue() {
                        Some(item) => {
                            assert_eq!(item, expected);
                            break;
                        }
                        None => thread::yield_now(),
                    }
                }
            }
        });
    });
}

#[test]
fn locked_queue_with_many_participants() {
    const N: usize = 5;
    let queue = LockedQueue::<usize, Bakery<N>, 64>::new();

    let handles: Vec<_> = (0..N).map(|_| queue.handle().unwrap()).collect();
    thread::scope(|s| {
        for mut handle in handles {
            s.spawn(move || {
                for _ in 0..10 {
                    handle.enqueue(handle.id()).unwrap();
                }
            });
        }
    });

    let mut counts = [0; N];
    let mut handle = queue.handle().unwrap();
    while let Some(id) = handle.dequeue() {
        counts[id] += 1;
    }
    assert_eq!(counts, [10; N]);
}
