use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Bencher, Criterion};
use softlock::spins::{Bakery, Filter, Peterson};
use softlock::spsc::Queue;
use softlock::{LockedQueue, Mutex, MutualExclusion, RawLock};

fn gen_lock_unlock<L: RawLock + Default>(bencher: &mut Bencher) {
    let lock = L::default();
    bencher.iter(|| {
        lock.lock(black_box(0));
        lock.unlock(0);
    });
}

fn gen_mutex_lock_unlock<L: MutualExclusion + Default>(bencher: &mut Bencher) {
    let mutex = Mutex::<u32, L>::new(0);
    let mut participant = mutex.participant().unwrap();
    bencher.iter(|| {
        let mut guard = participant.lock();
        *guard = guard.wrapping_add(1);
        drop(guard);
    });
}

fn gen_mutex_write_contention<L>(bencher: &mut Bencher)
where
    L: MutualExclusion + Default + Send + Sync,
{
    let mutex = Mutex::<u32, L>::new(0);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let mut rival = mutex.participant().unwrap();
        let done = &done;
        s.spawn(move || {
            while !done.load(Ordering::Relaxed) {
                for _ in 0..1000 {
                    let mut m = rival.lock();
                    *m = m.wrapping_add(1);
                    drop(m);
                }
            }
        });

        let mut participant = mutex.participant().unwrap();
        bencher.iter(|| {
            let mut m = participant.lock();
            *m = m.wrapping_add(1);
            drop(m);
        });
        done.store(true, Ordering::Relaxed);
    });
}

fn lock_unlock(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("lock_unlock");
    group.bench_function("peterson", gen_lock_unlock::<Peterson>);
    group.bench_function("filter_4", gen_lock_unlock::<Filter<4>>);
    group.bench_function("filter_16", gen_lock_unlock::<Filter<16>>);
    group.bench_function("bakery_4", gen_lock_unlock::<Bakery<4>>);
    group.bench_function("bakery_16", gen_lock_unlock::<Bakery<16>>);
    group.finish();
}

fn mutex(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("mutex");
    group.bench_function("peterson", gen_mutex_lock_unlock::<Peterson>);
    group.bench_function("bakery_4", gen_mutex_lock_unlock::<Bakery<4>>);
    group.bench_function("peterson_write_contention", gen_mutex_write_contention::<Peterson>);
    group.bench_function("filter_write_contention", gen_mutex_write_contention::<Filter<2>>);
    group.bench_function("bakery_write_contention", gen_mutex_write_contention::<Bakery<2>>);
    group.finish();
}

fn queue(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("queue");

    group.bench_function("spsc_round_trip", |bencher| {
        let mut queue = Queue::<u64, 64>::new();
        bencher.iter(|| {
            let _ = queue.enqueue(black_box(1));
            queue.dequeue()
        });
    });

    group.bench_function("locked_round_trip", |bencher| {
        let queue = LockedQueue::<u64, Peterson, 64>::new();
        let mut handle = queue.handle().unwrap();
        bencher.iter(|| {
            let _ = handle.enqueue(black_box(1));
            handle.dequeue()
        });
    });

    group.bench_function("spsc_pipeline_1k", |bencher| {
        let mut queue = Queue::<u64, 64>::new();
        bencher.iter(|| {
            let (mut producer, mut consumer) = queue.split();
            thread::scope(|s| {
                s.spawn(move || {
                    for i in 0..1000 {
                        while producer.enqueue(i).is_err() {
                            std::hint::spin_loop();
                        }
                    }
                });
                let mut received = 0;
                while received < 1000 {
                    if let Some(item) = consumer.dequeue() {
                        black_box(item);
                        received += 1;
                    }
                }
            });
        });
    });

    group.finish();
}

criterion_group!(benches, lock_unlock, mutex, queue);
criterion_main!(benches);
