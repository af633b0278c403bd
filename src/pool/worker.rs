//! Worker thread implementation

use crate::core::QueueType;
use crate::platform::{AffinityPolicy, AffinityProvider, Clock, CpuMask};
use crate::pool::stats::ThreadStats;
use crate::queue::{Dequeued, WorkQueue};
use crossbeam_utils::CachePadded;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Statistics for a worker thread.
///
/// Written only by the owning worker; readers take relaxed loads, so a
/// snapshot may mix values from consecutive tasks.
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    woke_with_work: AtomicU64,
    woke_without_work: AtomicU64,
    tasks_executed: AtomicU64,
    total_time_on_tasks_ns: AtomicU64,
    max_time_on_task_ns: AtomicU64,
    max_idle_time_ns: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a wake-up that found an item
    pub fn record_woke_with_work(&self) {
        self.woke_with_work.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a wake-up that found nothing to do
    pub fn record_woke_without_work(&self) {
        self.woke_without_work.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished routine and the idle gap that preceded it
    pub fn record_task(&self, duration: Duration, idle: Duration) {
        let duration = nanos(duration);
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.total_time_on_tasks_ns
            .fetch_add(duration, Ordering::Relaxed);
        self.max_time_on_task_ns
            .fetch_max(duration, Ordering::Relaxed);
        self.max_idle_time_ns
            .fetch_max(nanos(idle), Ordering::Relaxed);
    }

    /// Get total routines executed
    pub fn tasks_executed(&self) -> u64 {
        self.tasks_executed.load(Ordering::Relaxed)
    }

    /// Copy the counters out
    pub fn snapshot(&self, worker_id: usize) -> ThreadStats {
        ThreadStats {
            worker_id,
            woke_with_work: self.woke_with_work.load(Ordering::Relaxed),
            woke_without_work: self.woke_without_work.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            total_time_on_tasks: Duration::from_nanos(
                self.total_time_on_tasks_ns.load(Ordering::Relaxed),
            ),
            max_time_on_task: Duration::from_nanos(self.max_time_on_task_ns.load(Ordering::Relaxed)),
            max_idle_time: Duration::from_nanos(self.max_idle_time_ns.load(Ordering::Relaxed)),
        }
    }
}

/// Everything a worker thread needs to run.
#[derive(Clone, Debug)]
pub(crate) struct WorkerContext {
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) affinity_provider: Arc<dyn AffinityProvider>,
    pub(crate) affinity: Option<CpuMask>,
    pub(crate) affinity_policy: AffinityPolicy,
    pub(crate) idle_wake_interval: Option<Duration>,
    pub(crate) thread_name_prefix: String,
}

/// A worker thread bound to one work queue
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    queue_type: QueueType,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<CachePadded<WorkerStats>>,
}

impl Worker {
    /// Spawn a worker and wait until it is bound and about to serve.
    ///
    /// Returns once the thread has applied its CPU mask. If binding fails
    /// under [`AffinityPolicy::Required`] the thread exits and is joined
    /// before the error is returned.
    pub(crate) fn spawn(id: usize, context: WorkerContext) -> io::Result<Self> {
        let queue_type = context.queue.queue_type();
        let stats = Arc::new(CachePadded::new(WorkerStats::new()));
        let stats_clone = Arc::clone(&stats);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<io::Result<()>>(1);

        let thread = thread::Builder::new()
            .name(format!(
                "{}-{}-{}",
                context.thread_name_prefix,
                queue_type.name(),
                id
            ))
            .spawn(move || {
                let bound = Self::bind(id, &context);
                let proceed = bound.is_ok();
                // The spawner is blocked on this channel until it hears back.
                let _ = ready_tx.send(bound);
                if proceed {
                    Self::run(id, &context, &stats_clone);
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                id,
                queue_type,
                thread: Some(thread),
                stats,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(io::Error::other(format!(
                    "worker #{} exited before reporting ready",
                    id
                )))
            }
        }
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Queue type this worker serves
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// ID of the OS thread, until joined
    pub fn thread_id(&self) -> Option<thread::ThreadId> {
        self.thread.as_ref().map(|thread| thread.thread().id())
    }

    /// Get worker statistics
    pub fn stats(&self) -> ThreadStats {
        self.stats.snapshot(self.id)
    }

    /// Join the worker thread.
    ///
    /// The queue must already be shut down or this blocks forever.
    pub(crate) fn join(mut self) -> thread::Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }

    fn bind(id: usize, context: &WorkerContext) -> io::Result<()> {
        let Some(mask) = context.affinity else {
            return Ok(());
        };

        let result = if context.affinity_provider.supports_affinity() {
            context.affinity_provider.bind_current_thread(mask)
        } else {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "thread affinity is not supported on this platform",
            ))
        };

        match (result, context.affinity_policy) {
            (Ok(()), _) => {
                log::debug!(
                    "Pinned {} worker #{} to CPU mask {}",
                    context.queue.queue_type(),
                    id,
                    mask
                );
                Ok(())
            }
            (Err(e), AffinityPolicy::IfSupported) => {
                log::warn!(
                    "Failed to set CPU affinity {} for {} worker #{}: {}",
                    mask,
                    context.queue.queue_type(),
                    id,
                    e
                );
                Ok(())
            }
            (Err(e), AffinityPolicy::Required) => Err(e),
        }
    }

    /// Main worker loop
    ///
    /// Dequeue, run, record; until the queue shuts down.
    #[allow(unused_variables)]
    fn run(id: usize, context: &WorkerContext, stats: &WorkerStats) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(
            Level::DEBUG,
            "worker",
            id = id,
            queue_type = context.queue.queue_type().name()
        );
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        log::debug!("{} worker #{} started", context.queue.queue_type(), id);

        let clock = &context.clock;
        let mut idle_since = clock.now();

        loop {
            match context.queue.dequeue(context.idle_wake_interval) {
                Dequeued::Work { mut item, wait } => {
                    stats.record_woke_with_work();

                    #[cfg(feature = "tracing")]
                    let job_span = span!(Level::DEBUG, "work_item", routine = item.name());
                    #[cfg(feature = "tracing")]
                    let _job_guard = job_span.enter();

                    let started = clock.now();
                    item.stamp_started(started);

                    // The outcome belongs to the routine; a panic only ends this item.
                    let _ = catch_unwind(AssertUnwindSafe(|| item.run()));

                    let finished = clock.now();
                    item.stamp_finished(finished);

                    let duration = finished.saturating_duration_since(started);
                    stats.record_task(duration, started.saturating_duration_since(idle_since));
                    idle_since = finished;

                    #[cfg(feature = "tracing")]
                    crate::tracing::metrics::record_completion(wait, duration);
                }
                Dequeued::Idle => {
                    stats.record_woke_without_work();
                }
                Dequeued::Shutdown => {
                    stats.record_woke_without_work();
                    #[cfg(feature = "tracing")]
                    debug!(
                        tasks_executed = stats.tasks_executed(),
                        "worker shutting down"
                    );
                    break;
                }
            }
        }

        log::debug!(
            "{} worker #{} exiting after {} tasks",
            context.queue.queue_type(),
            id,
            stats.tasks_executed()
        );
    }
}
