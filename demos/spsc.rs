//! A producer and a consumer exchange items through a small wait-free queue.

use std::thread;
use std::time::Duration;

use softlock::spsc::Queue;
use tracing_subscriber::EnvFilter;

const ITEMS: u32 = 20;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("softlock=trace"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut queue = Queue::<u32, 4>::new();
    let (mut producer, mut consumer) = queue.split();

    thread::scope(|s| {
        s.spawn(move || {
            for i in 0..ITEMS {
                let mut item = i;
                while let Err(rejected) = producer.enqueue(item) {
                    item = rejected;
                    thread::sleep(Duration::from_millis(1));
                }
                println!("produced {i}");
            }
        });

        s.spawn(move || {
            let mut received = 0;
            while received < ITEMS {
                match consumer.dequeue() {
                    Some(item) => {
                        println!("consumed {item}");
                        received += 1;
                        // A slow consumer makes the queue fill up.
                        thread::sleep(Duration::from_millis(3));
                    }
                    None => thread::yield_now(),
                }
            }
        });
    });

    println!("left in queue: {}", queue.len());
}
