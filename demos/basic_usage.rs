//! Basic work queue usage example
//!
//! Demonstrates creating queue types, submitting work, head insertion and
//! statistics reporting.
//!
//! Run with: cargo run --example basic_usage

use std::thread;
use std::time::Duration;
use worker_queue_system::prelude::*;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Worker Queue System - Basic Usage Example ===\n");

    let registry = QueueRegistry::new();

    println!("1. Creating Critical (4 threads) and Delayed (1 thread, pinned to CPU 0)");
    registry.create(QueueType::Critical, 4)?;
    registry.create_with_affinity(QueueType::Delayed, 1, CpuMask::single(0))?;

    println!("\n2. Submitting work to Critical:");
    let mut handles = Vec::new();
    for i in 0..10 {
        let item = WorkItem::from_fn(move || {
            println!(
                "  Item {} executing on {:?}",
                i,
                thread::current().name().unwrap_or("unnamed")
            );
            thread::sleep(Duration::from_millis(20));
        });
        handles.push(item.handle());
        registry.enqueue(QueueType::Critical, item)?;
    }

    println!("\n3. Bumping an urgent item ahead of the Delayed queue:");
    registry.enqueue(
        QueueType::Delayed,
        WorkItem::from_fn(|| thread::sleep(Duration::from_millis(50))),
    )?;
    registry.enqueue(QueueType::Delayed, WorkItem::from_fn(|| println!("  routine flush")))?;
    let urgent = WorkItem::from_fn(|| println!("  urgent flush"));
    let urgent_handle = urgent.handle();
    registry.enqueue_to_head(QueueType::Delayed, urgent)?;

    for handle in handles.iter().chain(std::iter::once(&urgent_handle)) {
        handle.wait_timeout(Duration::from_secs(5));
    }
    println!(
        "   Urgent item waited {:?} in the queue",
        registry.query_queue_time(&urgent_handle)
    );

    println!("\n4. Statistics:");
    let queue = registry.queue_statistics(QueueType::Critical)?;
    println!(
        "   Critical: {} serviced, max wait {:?}, max length {}",
        queue.total_serviced, queue.max_wait_time, queue.max_queue_length
    );
    for stats in registry.per_thread_statistics(QueueType::Critical)? {
        println!(
            "   Worker {}: {} tasks, max task {:?}, max idle {:?}",
            stats.worker_id, stats.tasks_executed, stats.max_time_on_task, stats.max_idle_time
        );
    }

    let mut buffer = [0u8; ThreadStatistics::LAYOUT_SIZE];
    registry.query_thread_statistics(QueueType::Critical, &mut buffer)?;
    let decoded = ThreadStatistics::from_bytes(&buffer)?;
    println!("   Decoded aggregate: {} tasks on {} threads", decoded.tasks_executed, decoded.thread_count);

    println!("\n5. Summary:");
    let mut report = String::new();
    if registry.summary("basic_usage", &mut report).is_ok() {
        print!("{}", report);
    }

    println!("\n6. Destroying all queue types...");
    registry.destroy_all()?;
    println!(
        "   All worker threads destroyed: {}",
        registry.have_all_worker_threads_been_destroyed()
    );

    Ok(())
}
