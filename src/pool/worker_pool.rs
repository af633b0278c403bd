//! The pool of worker threads serving one queue type

use crate::core::{QueueType, Result, WorkQueueError};
use crate::platform::{AffinityProvider, Clock, CpuMask};
use crate::pool::config::PoolConfig;
use crate::pool::stats::{ThreadStatistics, ThreadStats};
use crate::pool::worker::{Worker, WorkerContext};
use crate::queue::{QueueStats, WorkQueue};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread;

/// A fixed set of worker threads draining one [`WorkQueue`].
///
/// # Shutdown Mechanism
///
/// [`shutdown`](Self::shutdown) sets the queue's shutdown flag, drops every
/// item still queued and joins the workers. A routine that is already
/// running finishes first; nothing queued behind it runs.
pub struct WorkerPool {
    queue_type: QueueType,
    config: PoolConfig,
    queue: Arc<WorkQueue>,
    workers: RwLock<Vec<Worker>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("queue_type", &self.queue_type)
            .field("config", &self.config)
            .field("queue", &self.queue)
            .field("live_workers", &self.workers.read().len())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `config.thread_count` workers against a fresh queue.
    ///
    /// Either every worker starts or none is left running: on a partial
    /// failure the workers already started are stopped and joined before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// - `WorkQueueError::InvalidConfig` - the configuration is malformed
    /// - `WorkQueueError::ResourceExhausted` - zero threads requested, or a
    ///   thread could not be spawned or bound to its CPU mask
    pub(crate) fn start(
        queue_type: QueueType,
        config: PoolConfig,
        clock: Arc<dyn Clock>,
        affinity_provider: Arc<dyn AffinityProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let requested = config.thread_count;
        if requested == 0 {
            return Err(WorkQueueError::resource_exhausted(
                queue_type,
                0,
                0,
                "thread count must be greater than 0",
            ));
        }

        let queue = Arc::new(WorkQueue::new(queue_type, Arc::clone(&clock)));
        let context = WorkerContext {
            queue: Arc::clone(&queue),
            clock,
            affinity_provider,
            affinity: config.affinity,
            affinity_policy: config.affinity_policy,
            idle_wake_interval: config.idle_wake_interval,
            thread_name_prefix: config.thread_name_prefix.clone(),
        };

        let mut workers = Vec::with_capacity(requested);
        for id in 0..requested {
            match Worker::spawn(id, context.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    let started = workers.len();
                    log::warn!(
                        "Failed to start {} worker #{} ({}/{} running), stopping pool: {}",
                        queue_type,
                        id,
                        started,
                        requested,
                        e
                    );
                    queue.shutdown();
                    Self::join_all(queue_type, workers);
                    return Err(WorkQueueError::resource_exhausted_with_source(
                        queue_type,
                        requested,
                        started,
                        "failed to start worker thread",
                        e,
                    ));
                }
            }
        }

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_start(queue_type, requested);

        Ok(Self {
            queue_type,
            config,
            queue,
            workers: RwLock::new(workers),
        })
    }

    /// Queue type this pool serves
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// The queue the workers drain
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Number of worker threads the pool was started with
    pub fn thread_count(&self) -> usize {
        self.config.thread_count
    }

    /// CPU mask the workers were bound to
    pub fn affinity(&self) -> Option<CpuMask> {
        self.config.affinity
    }

    /// Snapshot of every live worker's counters
    pub fn thread_stats(&self) -> Vec<ThreadStats> {
        self.workers.read().iter().map(Worker::stats).collect()
    }

    /// Counters aggregated over every live worker
    pub fn thread_statistics(&self) -> ThreadStatistics {
        ThreadStatistics::aggregate(&self.thread_stats())
    }

    /// Queue statistics
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Stop accepting work, drop queued items and join every worker.
    ///
    /// Returns the number of queued items that were dropped. Calling this
    /// again is a no-op returning zero.
    pub fn shutdown(&self) -> usize {
        let discarded = self.queue.shutdown();
        let discarded_count = discarded.len();
        if discarded_count > 0 {
            log::debug!(
                "Discarded {} queued items from {}",
                discarded_count,
                self.queue_type
            );
        }
        drop(discarded);

        let workers = std::mem::take(&mut *self.workers.write());
        Self::join_all(self.queue_type, workers);

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_shutdown(self.queue_type, discarded_count);

        discarded_count
    }

    /// Join every worker except the calling thread.
    ///
    /// A routine may destroy its own queue type; its worker cannot join
    /// itself and exits on its own once the routine returns.
    fn join_all(queue_type: QueueType, workers: Vec<Worker>) {
        let current = thread::current().id();
        for worker in workers {
            let id = worker.id();
            if worker.thread_id() == Some(current) {
                log::debug!(
                    "{} worker #{} is shutting down its own pool; left to exit after its routine",
                    queue_type,
                    id
                );
                continue;
            }
            if worker.join().is_err() {
                log::error!("{} worker #{} panicked outside a work item", queue_type, id);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.get_mut().is_empty() {
            self.shutdown();
        }
    }
}
