//! The queue registry: the public lifecycle and query API.
//!
//! A [`QueueRegistry`] owns one slot per [`QueueType`]. Each slot holds at
//! most one [`WorkerPool`] and moves through
//! `Uninitialized -> Active -> Draining -> Destroyed`; a destroyed slot can
//! be created again. Lifecycle calls on one slot are serialised by a
//! per-slot mutex and never block calls on other slots.
//!
//! # Example
//!
//! ```rust
//! use worker_queue_system::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let registry = QueueRegistry::new();
//! registry.create(QueueType::Critical, 2)?;
//!
//! let item = WorkItem::from_fn(|| println!("flushing"));
//! let handle = item.handle();
//! registry.enqueue(QueueType::Critical, item)?;
//!
//! assert!(handle.wait_timeout(Duration::from_secs(5)));
//! assert_eq!(registry.queue_statistics(QueueType::Critical)?.total_serviced, 1);
//!
//! registry.destroy(QueueType::Critical)?;
//! assert!(registry.have_worker_threads_been_destroyed(QueueType::Critical));
//! # Ok(())
//! # }
//! ```

mod summary;

pub use summary::QueueSummary;

use crate::core::{QueueType, Result, WorkItem, WorkItemHandle, WorkQueueError};
use crate::platform::{AffinityProvider, Clock, CpuMask, MonotonicClock, SystemAffinity};
use crate::pool::{PoolConfig, ThreadStatistics, ThreadStats, WorkerPool};
use crate::queue::QueueStats;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle state of one queue type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum QueueState {
    /// Never created.
    Uninitialized,
    /// Worker threads are running and the queue accepts work.
    Active,
    /// Destroy in progress: the queue rejects work and threads are exiting.
    Draining,
    /// All threads joined; may be created again.
    Destroyed,
}

enum SlotState {
    Uninitialized,
    Active(WorkerPool),
    Draining,
    Destroyed,
}

impl SlotState {
    fn public(&self) -> QueueState {
        match self {
            Self::Uninitialized => QueueState::Uninitialized,
            Self::Active(_) => QueueState::Active,
            Self::Draining => QueueState::Draining,
            Self::Destroyed => QueueState::Destroyed,
        }
    }
}

struct Slot {
    lifecycle: Mutex<()>,
    state: RwLock<SlotState>,
}

impl Slot {
    fn new() -> Self {
        Self {
            lifecycle: Mutex::new(()),
            state: RwLock::new(SlotState::Uninitialized),
        }
    }
}

/// Builder for a [`QueueRegistry`] with injected platform capabilities.
///
/// # Example
///
/// ```rust
/// use worker_queue_system::platform::{MonotonicClock, NoAffinity};
/// use worker_queue_system::QueueRegistry;
///
/// let registry = QueueRegistry::builder()
///     .clock(MonotonicClock)
///     .affinity_provider(NoAffinity)
///     .build();
/// assert!(registry.have_all_worker_threads_been_destroyed());
/// ```
#[derive(Debug)]
pub struct RegistryBuilder {
    clock: Arc<dyn Clock>,
    affinity_provider: Arc<dyn AffinityProvider>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(MonotonicClock),
            affinity_provider: Arc::new(SystemAffinity),
        }
    }
}

impl RegistryBuilder {
    /// Use `clock` for every timestamp
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use `provider` to bind worker threads
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn affinity_provider<A: AffinityProvider + 'static>(mut self, provider: A) -> Self {
        self.affinity_provider = Arc::new(provider);
        self
    }

    /// Build the registry; every queue type starts uninitialised
    pub fn build(self) -> QueueRegistry {
        QueueRegistry {
            slots: std::array::from_fn(|_| Slot::new()),
            clock: self.clock,
            affinity_provider: self.affinity_provider,
        }
    }
}

/// Table of queue types, each backed by zero or one worker pool.
///
/// Dropping the registry destroys every active queue type.
pub struct QueueRegistry {
    slots: [Slot; QueueType::COUNT],
    clock: Arc<dyn Clock>,
    affinity_provider: Arc<dyn AffinityProvider>,
}

impl fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("active", &self.active_queue_types())
            .field("clock", &self.clock)
            .field("affinity_provider", &self.affinity_provider)
            .finish()
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueRegistry {
    /// Create a registry using the monotonic clock and system affinity
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a registry builder
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    fn slot(&self, queue_type: QueueType) -> &Slot {
        &self.slots[queue_type.index()]
    }

    /// Start `thread_count` unbound workers for `queue_type`.
    ///
    /// # Errors
    ///
    /// - `WorkQueueError::InvalidType` - `queue_type` is reserved
    /// - `WorkQueueError::AlreadyExists` - the type already has a pool
    /// - `WorkQueueError::ResourceExhausted` - `thread_count` is zero or a
    ///   thread could not be started
    pub fn create(&self, queue_type: QueueType, thread_count: usize) -> Result<()> {
        self.create_with_config(queue_type, PoolConfig::new(thread_count))
    }

    /// Start `thread_count` workers for `queue_type`, each bound to `mask`.
    ///
    /// Binding follows the default [`AffinityPolicy`]: where the platform
    /// cannot bind, workers run unbound and a warning is logged.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create), plus `WorkQueueError::InvalidConfig`
    /// for an empty mask.
    ///
    /// [`AffinityPolicy`]: crate::platform::AffinityPolicy
    pub fn create_with_affinity(
        &self,
        queue_type: QueueType,
        thread_count: usize,
        mask: CpuMask,
    ) -> Result<()> {
        self.create_with_config(queue_type, PoolConfig::new(thread_count).with_affinity(mask))
    }

    /// Start a pool for `queue_type` from a full configuration.
    ///
    /// The pool is published only once every worker is running. If a
    /// thread fails to start, those already started are stopped and joined
    /// and the slot keeps its previous state.
    ///
    /// # Errors
    ///
    /// As [`create_with_affinity`](Self::create_with_affinity).
    pub fn create_with_config(&self, queue_type: QueueType, config: PoolConfig) -> Result<()> {
        queue_type.ensure_creatable()?;
        config.validate()?;

        let slot = self.slot(queue_type);
        let _lifecycle = slot.lifecycle.lock();

        if let SlotState::Active(pool) = &*slot.state.read() {
            return Err(WorkQueueError::already_exists(
                queue_type,
                pool.thread_count(),
            ));
        }

        let thread_count = config.thread_count;
        let affinity = config.affinity;
        let pool = WorkerPool::start(
            queue_type,
            config,
            Arc::clone(&self.clock),
            Arc::clone(&self.affinity_provider),
        )?;
        *slot.state.write() = SlotState::Active(pool);

        match affinity {
            Some(mask) => log::info!(
                "Created {} with {} worker threads (affinity {})",
                queue_type,
                thread_count,
                mask
            ),
            None => log::info!("Created {} with {} worker threads", queue_type, thread_count),
        }
        Ok(())
    }

    /// Shut down `queue_type` and join its workers.
    ///
    /// Items still queued are dropped; a routine already running finishes
    /// first. Destroying a type that is not active is a no-op. Always
    /// returns `Ok`: teardown problems are logged, not returned.
    pub fn destroy(&self, queue_type: QueueType) -> Result<()> {
        let slot = self.slot(queue_type);
        let _lifecycle = slot.lifecycle.lock();

        let pool = {
            let mut state = slot.state.write();
            match std::mem::replace(&mut *state, SlotState::Draining) {
                SlotState::Active(pool) => pool,
                previous => {
                    *state = previous;
                    return Ok(());
                }
            }
        };

        let discarded = pool.shutdown();
        let serviced = pool.queue_stats().total_serviced;
        drop(pool);

        *slot.state.write() = SlotState::Destroyed;
        log::info!(
            "Destroyed {} ({} items serviced, {} discarded)",
            queue_type,
            serviced,
            discarded
        );
        Ok(())
    }

    /// Destroy every active queue type.
    pub fn destroy_all(&self) -> Result<()> {
        for queue_type in QueueType::ALL {
            self.destroy(queue_type)?;
        }
        Ok(())
    }

    /// Append `item` to the tail of `queue_type`'s queue.
    ///
    /// # Errors
    ///
    /// Returns `WorkQueueError::QueueNotActive` if the type is not active;
    /// the item is dropped without running.
    pub fn enqueue(&self, queue_type: QueueType, item: WorkItem) -> Result<()> {
        match &*self.slot(queue_type).state.read() {
            SlotState::Active(pool) => pool.queue().enqueue(item),
            _ => Err(WorkQueueError::queue_not_active(queue_type)),
        }
    }

    /// Insert `item` at the head of `queue_type`'s queue, ahead of
    /// everything already queued.
    ///
    /// # Errors
    ///
    /// As [`enqueue`](Self::enqueue).
    pub fn enqueue_to_head(&self, queue_type: QueueType, item: WorkItem) -> Result<()> {
        match &*self.slot(queue_type).state.read() {
            SlotState::Active(pool) => pool.queue().enqueue_to_head(item),
            _ => Err(WorkQueueError::queue_not_active(queue_type)),
        }
    }

    fn with_active<T>(&self, queue_type: QueueType, f: impl FnOnce(&WorkerPool) -> T) -> Result<T> {
        match &*self.slot(queue_type).state.read() {
            SlotState::Active(pool) => Ok(f(pool)),
            _ => Err(WorkQueueError::not_found(queue_type)),
        }
    }

    /// Number of items waiting in `queue_type`'s queue.
    ///
    /// # Errors
    ///
    /// Returns `WorkQueueError::NotFound` if the type is not active.
    pub fn query_queue_depth(&self, queue_type: QueueType) -> Result<usize> {
        self.with_active(queue_type, |pool| pool.queue().len())
    }

    /// Time the item behind `handle` spent queued; zero until dequeued.
    pub fn query_queue_time(&self, handle: &WorkItemHandle) -> Duration {
        handle.queue_time()
    }

    /// Write aggregated thread statistics for `queue_type` into `buffer`.
    ///
    /// The encoding is [`ThreadStatistics::LAYOUT_SIZE`] bytes; returns the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// - `WorkQueueError::NotFound` - the type is not active
    /// - `WorkQueueError::BufferTooSmall` - `buffer` is shorter than the
    ///   layout; nothing is written
    pub fn query_thread_statistics(&self, queue_type: QueueType, buffer: &mut [u8]) -> Result<usize> {
        self.thread_statistics(queue_type)?.write_to(buffer)
    }

    /// Aggregated thread statistics for `queue_type`.
    ///
    /// # Errors
    ///
    /// Returns `WorkQueueError::NotFound` if the type is not active.
    pub fn thread_statistics(&self, queue_type: QueueType) -> Result<ThreadStatistics> {
        self.with_active(queue_type, WorkerPool::thread_statistics)
    }

    /// Statistics of each worker thread of `queue_type`.
    ///
    /// # Errors
    ///
    /// Returns `WorkQueueError::NotFound` if the type is not active.
    pub fn per_thread_statistics(&self, queue_type: QueueType) -> Result<Vec<ThreadStats>> {
        self.with_active(queue_type, WorkerPool::thread_stats)
    }

    /// Queue statistics for `queue_type`.
    ///
    /// # Errors
    ///
    /// Returns `WorkQueueError::NotFound` if the type is not active.
    pub fn queue_statistics(&self, queue_type: QueueType) -> Result<QueueStats> {
        self.with_active(queue_type, WorkerPool::queue_stats)
    }

    /// Whether `queue_type` has no running worker threads.
    ///
    /// Advisory: a concurrent create or destroy may change the answer as
    /// soon as it is returned.
    pub fn have_worker_threads_been_destroyed(&self, queue_type: QueueType) -> bool {
        matches!(
            self.state(queue_type),
            QueueState::Uninitialized | QueueState::Destroyed
        )
    }

    /// Whether no queue type has running worker threads. Advisory.
    pub fn have_all_worker_threads_been_destroyed(&self) -> bool {
        QueueType::ALL
            .into_iter()
            .all(|queue_type| self.have_worker_threads_been_destroyed(queue_type))
    }

    /// Lifecycle state of `queue_type`.
    pub fn state(&self, queue_type: QueueType) -> QueueState {
        self.slot(queue_type).state.read().public()
    }

    /// Queue types that currently have an active pool, in slot order.
    pub fn active_queue_types(&self) -> Vec<QueueType> {
        QueueType::ALL
            .into_iter()
            .filter(|queue_type| self.state(*queue_type) == QueueState::Active)
            .collect()
    }
}

impl Drop for QueueRegistry {
    fn drop(&mut self) {
        let _ = self.destroy_all();
    }
}
