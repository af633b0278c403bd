//! Integration tests for the queue registry lifecycle, ordering and statistics

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use worker_queue_system::platform::{AffinityProvider, NoAffinity};
use worker_queue_system::prelude::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn registry() -> QueueRegistry {
    init_logging();
    QueueRegistry::builder().affinity_provider(NoAffinity).build()
}

/// Occupies a single-thread pool until released.
struct Gate {
    release: Sender<()>,
    handle: WorkItemHandle,
}

impl Gate {
    fn block(registry: &QueueRegistry, queue_type: QueueType) -> Self {
        let (started_tx, started_rx) = bounded::<()>(1);
        let (release_tx, release_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let item = WorkItem::new(ClosureRoutine::with_name(
            move || {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            },
            "gate",
        ));
        let handle = item.handle();
        registry.enqueue(queue_type, item).expect("Failed to enqueue gate");
        started_rx
            .recv_timeout(TIMEOUT)
            .expect("Gate routine never started");
        Gate {
            release: release_tx,
            handle,
        }
    }

    fn open(self) -> WorkItemHandle {
        let _ = self.release.send(());
        self.handle
    }
}

fn recording_item(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> WorkItem {
    let log = Arc::clone(log);
    WorkItem::from_fn(move || log.lock().push(label))
}

#[test]
fn test_create_destroy_recreate_every_type() {
    let registry = registry();

    for queue_type in QueueType::ALL.into_iter().filter(|t| !t.is_reserved()) {
        registry.create(queue_type, 1).expect("Failed to create queue type");
        registry.destroy(queue_type).expect("Destroy never fails");
        assert!(registry.have_worker_threads_been_destroyed(queue_type));
        assert_eq!(registry.state(queue_type), QueueState::Destroyed);

        registry.create(queue_type, 1).expect("Recreate after destroy failed");
        assert_eq!(registry.state(queue_type), QueueState::Active);
    }

    assert!(!registry.have_all_worker_threads_been_destroyed());
    registry.destroy_all().expect("Destroy never fails");
    assert!(registry.have_all_worker_threads_been_destroyed());
}

#[test]
fn test_create_on_active_type_leaves_pool_untouched() {
    let registry = registry();
    registry.create(QueueType::Normal, 2).unwrap();

    let item = WorkItem::from_fn(|| {});
    let handle = item.handle();
    registry.enqueue(QueueType::Normal, item).unwrap();
    assert!(handle.wait_timeout(TIMEOUT));

    let queue_before = registry.queue_statistics(QueueType::Normal).unwrap();
    let err = registry.create(QueueType::Normal, 5).unwrap_err();
    assert!(matches!(
        err,
        WorkQueueError::AlreadyExists {
            queue_type: QueueType::Normal,
            thread_count: 2
        }
    ));

    assert_eq!(registry.per_thread_statistics(QueueType::Normal).unwrap().len(), 2);
    assert_eq!(registry.thread_statistics(QueueType::Normal).unwrap().thread_count, 2);
    assert_eq!(registry.queue_statistics(QueueType::Normal).unwrap(), queue_before);
}

#[test]
fn test_zero_threads_is_resource_exhausted() {
    let registry = registry();
    let err = registry.create(QueueType::Delayed, 0).unwrap_err();
    assert!(matches!(err, WorkQueueError::ResourceExhausted { .. }));
    assert_eq!(registry.state(QueueType::Delayed), QueueState::Uninitialized);
}

#[test]
fn test_n_items_all_serviced() {
    let registry = registry();
    registry.create(QueueType::Background, 4).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..100)
        .map(|_| {
            let counter = Arc::clone(&counter);
            let item = WorkItem::from_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let handle = item.handle();
            registry.enqueue(QueueType::Background, item).unwrap();
            handle
        })
        .collect();

    for handle in &handles {
        assert!(handle.wait_timeout(TIMEOUT));
    }

    assert_eq!(counter.load(Ordering::SeqCst), 100);
    let stats = registry.queue_statistics(QueueType::Background).unwrap();
    assert_eq!(stats.total_serviced, 100);
    assert_eq!(stats.total_enqueued, 100);
    assert_eq!(registry.query_queue_depth(QueueType::Background).unwrap(), 0);
    assert_eq!(
        registry.thread_statistics(QueueType::Background).unwrap().tasks_executed,
        100
    );
}

#[test]
fn test_tail_items_run_in_order_on_single_thread() {
    let registry = registry();
    registry.create(QueueType::Custom1, 1).unwrap();

    let a = WorkItem::from_fn(|| thread::sleep(Duration::from_millis(20)));
    let b = WorkItem::from_fn(|| {});
    let (a_handle, b_handle) = (a.handle(), b.handle());

    registry.enqueue(QueueType::Custom1, a).unwrap();
    registry.enqueue(QueueType::Custom1, b).unwrap();
    assert!(b_handle.wait_timeout(TIMEOUT));

    let a_end = a_handle.end_time().expect("A finished");
    let b_start = b_handle.start_time().expect("B started");
    assert!(a_end <= b_start);
}

#[test]
fn test_head_item_runs_before_queued_items() {
    let registry = registry();
    registry.create(QueueType::HyperCritical, 1).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let gate = Gate::block(&registry, QueueType::HyperCritical);
    registry
        .enqueue(QueueType::HyperCritical, recording_item(&log, "A"))
        .unwrap();
    let b = recording_item(&log, "B");
    let b_handle = b.handle();
    registry.enqueue(QueueType::HyperCritical, b).unwrap();
    registry
        .enqueue_to_head(QueueType::HyperCritical, recording_item(&log, "H"))
        .unwrap();

    assert_eq!(registry.query_queue_depth(QueueType::HyperCritical).unwrap(), 3);
    gate.open();
    assert!(b_handle.wait_timeout(TIMEOUT));

    assert_eq!(*log.lock(), vec!["H", "A", "B"]);
    assert_eq!(registry.query_queue_depth(QueueType::HyperCritical).unwrap(), 0);
}

#[test]
fn test_queue_depth_tracks_submitted_minus_dequeued() {
    let registry = registry();
    registry.create(QueueType::Custom4, 1).unwrap();

    let gate = Gate::block(&registry, QueueType::Custom4);
    let mut handles = Vec::new();
    for expected in 1..=6 {
        let item = WorkItem::from_fn(|| {});
        handles.push(item.handle());
        registry.enqueue(QueueType::Custom4, item).unwrap();
        assert_eq!(registry.query_queue_depth(QueueType::Custom4).unwrap(), expected);
    }

    let stats = registry.queue_statistics(QueueType::Custom4).unwrap();
    assert_eq!(stats.current_depth, 6);
    assert!(stats.max_queue_length >= 6);
    // The gate itself was dequeued.
    assert_eq!(stats.total_serviced, 1);

    gate.open();
    for handle in &handles {
        assert!(handle.wait_timeout(TIMEOUT));
    }
    assert_eq!(registry.query_queue_depth(QueueType::Custom4).unwrap(), 0);
    assert!(registry.queue_statistics(QueueType::Custom4).unwrap().max_queue_length >= 6);
}

#[test]
fn test_critical_two_threads_five_sleeping_items() {
    let registry = registry();
    registry.create(QueueType::Critical, 2).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    let mut max_depth_seen = 0;
    for _ in 0..5 {
        let counter = Arc::clone(&counter);
        let item = WorkItem::from_fn(move || {
            thread::sleep(Duration::from_millis(10));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handles.push(item.handle());
        registry.enqueue(QueueType::Critical, item).unwrap();
        max_depth_seen = max_depth_seen.max(registry.query_queue_depth(QueueType::Critical).unwrap());
    }

    for handle in &handles {
        assert!(handle.wait_timeout(TIMEOUT));
        assert!(handle.run_time() >= Duration::from_millis(10));
    }

    assert_eq!(counter.load(Ordering::SeqCst), 5);
    let stats = registry.queue_statistics(QueueType::Critical).unwrap();
    assert_eq!(stats.total_serviced, 5);
    assert!(stats.total_wait_time >= stats.max_wait_time);
    assert!(stats.max_queue_length >= max_depth_seen);

    let threads = registry.thread_statistics(QueueType::Critical).unwrap();
    assert_eq!(threads.thread_count, 2);
    assert_eq!(threads.tasks_executed, 5);
    assert!(threads.max_time_on_task >= Duration::from_millis(10));
    assert!(threads.total_time_on_tasks >= Duration::from_millis(50));
}

#[test]
fn test_queue_time_reported_after_dequeue() {
    let registry = registry();
    registry.create(QueueType::Custom6, 1).unwrap();

    let gate = Gate::block(&registry, QueueType::Custom6);
    let item = WorkItem::from_fn(|| {});
    let handle = item.handle();
    registry.enqueue(QueueType::Custom6, item).unwrap();

    assert_eq!(registry.query_queue_time(&handle), Duration::ZERO);
    thread::sleep(Duration::from_millis(20));
    gate.open();

    assert!(handle.wait_timeout(TIMEOUT));
    assert!(registry.query_queue_time(&handle) >= Duration::from_millis(20));
    let stats = registry.queue_statistics(QueueType::Custom6).unwrap();
    assert!(stats.max_wait_time >= Duration::from_millis(20));
}

#[test]
fn test_thread_statistics_short_buffer_untouched() {
    let registry = registry();
    registry.create(QueueType::SuperCritical, 3).unwrap();

    let mut short = vec![0x5Au8; ThreadStatistics::LAYOUT_SIZE - 1];
    let err = registry
        .query_thread_statistics(QueueType::SuperCritical, &mut short)
        .unwrap_err();
    assert!(matches!(err, WorkQueueError::BufferTooSmall { .. }));
    assert!(short.iter().all(|b| *b == 0x5A));

    let mut exact = vec![0u8; ThreadStatistics::LAYOUT_SIZE];
    let written = registry
        .query_thread_statistics(QueueType::SuperCritical, &mut exact)
        .unwrap();
    assert_eq!(written, ThreadStatistics::LAYOUT_SIZE);
    assert_eq!(ThreadStatistics::from_bytes(&exact).unwrap().thread_count, 3);
}

#[test]
fn test_destroy_finishes_running_item_and_discards_queued() {
    let registry = registry();
    registry.create(QueueType::Delayed, 1).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let gate = Gate::block(&registry, QueueType::Delayed);
    for _ in 0..3 {
        let ran = Arc::clone(&ran);
        registry
            .enqueue(
                QueueType::Delayed,
                WorkItem::from_fn(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    thread::scope(|scope| {
        let destroyer = scope.spawn(|| registry.destroy(QueueType::Delayed));

        let deadline = Instant::now() + TIMEOUT;
        while registry.state(QueueType::Delayed) != QueueState::Draining {
            assert!(Instant::now() < deadline, "destroy never started draining");
            thread::sleep(Duration::from_millis(1));
        }

        assert!(!registry.have_worker_threads_been_destroyed(QueueType::Delayed));
        let rejected = registry.enqueue(QueueType::Delayed, WorkItem::from_fn(|| {}));
        assert!(matches!(rejected, Err(WorkQueueError::QueueNotActive { .. })));

        let gate_handle = gate.open();
        destroyer
            .join()
            .expect("destroyer panicked")
            .expect("destroy never fails");
        assert!(gate_handle.is_complete());
    });

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(registry.state(QueueType::Delayed), QueueState::Destroyed);
    assert!(matches!(
        registry.query_queue_depth(QueueType::Delayed),
        Err(WorkQueueError::NotFound { .. })
    ));
}

#[test]
fn test_panicking_routine_does_not_kill_worker() {
    let registry = registry();
    registry.create(QueueType::Custom7, 1).unwrap();

    let bad = WorkItem::from_fn(|| panic!("routine failure"));
    let bad_handle = bad.handle();
    registry.enqueue(QueueType::Custom7, bad).unwrap();
    assert!(bad_handle.wait_timeout(TIMEOUT));

    let good = WorkItem::from_fn(|| {});
    let good_handle = good.handle();
    registry.enqueue(QueueType::Custom7, good).unwrap();
    assert!(good_handle.wait_timeout(TIMEOUT));

    assert_eq!(registry.thread_statistics(QueueType::Custom7).unwrap().tasks_executed, 2);
}

/// Binds successfully until `fail_on` binds have been attempted.
#[derive(Debug)]
struct FlakyAffinity {
    attempts: AtomicUsize,
    fail_on: usize,
}

impl AffinityProvider for FlakyAffinity {
    fn supports_affinity(&self) -> bool {
        true
    }

    fn bind_current_thread(&self, _mask: CpuMask) -> io::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.fail_on {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "bind refused"))
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_partial_thread_start_failure_leaves_nothing_active() {
    init_logging();
    let registry = QueueRegistry::builder()
        .affinity_provider(FlakyAffinity {
            attempts: AtomicUsize::new(0),
            fail_on: 3,
        })
        .build();

    let config = PoolConfig::new(4)
        .with_affinity(CpuMask::single(0))
        .require_affinity();
    let err = registry
        .create_with_config(QueueType::RealTime, config)
        .unwrap_err();

    match &err {
        WorkQueueError::ResourceExhausted {
            requested,
            started,
            source,
            ..
        } => {
            assert_eq!(*requested, 4);
            assert_eq!(*started, 2);
            assert_eq!(
                source.as_ref().map(io::Error::kind),
                Some(io::ErrorKind::PermissionDenied)
            );
        }
        other => panic!("expected ResourceExhausted, got {:?}", other),
    }

    assert_eq!(registry.state(QueueType::RealTime), QueueState::Uninitialized);
    assert!(registry.have_worker_threads_been_destroyed(QueueType::RealTime));
    assert!(matches!(
        registry.enqueue(QueueType::RealTime, WorkItem::from_fn(|| {})),
        Err(WorkQueueError::QueueNotActive { .. })
    ));
}

#[test]
fn test_unsupported_affinity_falls_back_to_unbound() {
    let registry = registry();
    registry
        .create_with_affinity(QueueType::Normal, 2, CpuMask::single(0))
        .expect("Best-effort affinity must not fail creation");

    let item = WorkItem::from_fn(|| {});
    let handle = item.handle();
    registry.enqueue(QueueType::Normal, item).unwrap();
    assert!(handle.wait_timeout(TIMEOUT));

    let summaries = registry.queue_summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].affinity, Some(CpuMask::single(0)));
}

#[test]
fn test_types_are_independent() {
    let registry = registry();

    thread::scope(|scope| {
        for queue_type in [QueueType::Critical, QueueType::Normal, QueueType::Custom0] {
            let registry = &registry;
            scope.spawn(move || {
                registry.create(queue_type, 2).expect("Failed to create queue type");
            });
        }
    });
    assert_eq!(
        registry.active_queue_types(),
        vec![QueueType::Critical, QueueType::Normal, QueueType::Custom0]
    );

    registry.destroy(QueueType::Normal).unwrap();
    let item = WorkItem::from_fn(|| {});
    let handle = item.handle();
    registry.enqueue(QueueType::Critical, item).unwrap();
    assert!(handle.wait_timeout(TIMEOUT));
    assert_eq!(
        registry.active_queue_types(),
        vec![QueueType::Critical, QueueType::Custom0]
    );
}

#[test]
fn test_log_summary_does_not_disturb_pools() {
    let registry = registry();
    registry.create(QueueType::Critical, 1).unwrap();
    registry.log_summary("integration");
    assert_eq!(registry.state(QueueType::Critical), QueueState::Active);
}

#[test]
fn test_routine_can_destroy_its_own_queue_type() {
    let registry = Arc::new(registry());
    registry.create(QueueType::Normal, 2).unwrap();

    let (done_tx, done_rx) = bounded::<bool>(1);
    let inner = Arc::clone(&registry);
    registry
        .enqueue(
            QueueType::Normal,
            WorkItem::from_fn(move || {
                let destroyed = inner.destroy(QueueType::Normal).is_ok();
                let _ = done_tx.send(destroyed);
            }),
        )
        .unwrap();

    assert!(done_rx.recv_timeout(TIMEOUT).expect("Routine never returned from destroy"));
    assert_eq!(registry.state(QueueType::Normal), QueueState::Destroyed);
    assert!(registry.have_worker_threads_been_destroyed(QueueType::Normal));

    registry.create(QueueType::Normal, 1).expect("Recreate after self-destroy failed");
    let item = WorkItem::from_fn(|| {});
    let handle = item.handle();
    registry.enqueue(QueueType::Normal, item).unwrap();
    assert!(handle.wait_timeout(TIMEOUT));
}

#[test]
fn test_max_queue_length_resets_on_recreate() {
    let registry = registry();
    registry.create(QueueType::Custom3, 1).unwrap();

    let gate = Gate::block(&registry, QueueType::Custom3);
    for _ in 0..5 {
        registry
            .enqueue(QueueType::Custom3, WorkItem::from_fn(|| {}))
            .unwrap();
    }
    assert!(registry.queue_statistics(QueueType::Custom3).unwrap().max_queue_length >= 5);

    gate.open();
    registry.destroy(QueueType::Custom3).unwrap();
    registry.create(QueueType::Custom3, 1).unwrap();

    let stats = registry.queue_statistics(QueueType::Custom3).unwrap();
    assert_eq!(stats.max_queue_length, 0);
    assert_eq!(stats.total_enqueued, 0);
    assert_eq!(stats.total_serviced, 0);
}

#[test]
fn test_max_idle_time_measured_by_worker_loop() {
    let registry = registry();
    registry.create(QueueType::Background, 1).unwrap();

    // Idle from thread start to the first task
    thread::sleep(Duration::from_millis(30));
    let first = WorkItem::from_fn(|| {});
    let first_handle = first.handle();
    registry.enqueue(QueueType::Background, first).unwrap();
    assert!(first_handle.wait_timeout(TIMEOUT));

    let after_first = registry.thread_statistics(QueueType::Background).unwrap();
    assert!(after_first.max_idle_time >= Duration::from_millis(30));

    // Idle between two tasks
    thread::sleep(Duration::from_millis(60));
    let second = WorkItem::from_fn(|| {});
    let second_handle = second.handle();
    registry.enqueue(QueueType::Background, second).unwrap();
    assert!(second_handle.wait_timeout(TIMEOUT));

    let gap = second_handle
        .start_time()
        .expect("second started")
        .duration_since(first_handle.end_time().expect("first finished"));
    let after_second = registry.thread_statistics(QueueType::Background).unwrap();
    assert!(gap >= Duration::from_millis(60));
    assert!(after_second.max_idle_time >= Duration::from_millis(60));
    assert!(after_second.max_idle_time >= gap);
    assert_eq!(after_second.tasks_executed, 2);
}
