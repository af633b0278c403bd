//! The work queue behind each active queue type.
//!
//! A [`WorkQueue`] owns an ordered sequence of [`WorkItem`]s, a mutex and
//! condition variable that worker threads block on, a shutdown flag and the
//! queue's [`QueueStats`]. Items are normally appended at the tail; an item
//! inserted at the head is handed out before everything already queued.
//!
//! ```rust
//! use std::sync::Arc;
//! use worker_queue_system::platform::MonotonicClock;
//! use worker_queue_system::queue::WorkQueue;
//! use worker_queue_system::{QueueType, WorkItem};
//!
//! let queue = WorkQueue::new(QueueType::Normal, Arc::new(MonotonicClock));
//! queue.enqueue(WorkItem::from_fn(|| {})).unwrap();
//! queue.enqueue_to_head(WorkItem::from_fn(|| {})).unwrap();
//! assert_eq!(queue.len(), 2);
//! assert_eq!(queue.stats().max_queue_length, 2);
//! ```

mod stats;

pub use stats::QueueStats;

use crate::core::{QueueType, Result, WorkItem, WorkQueueError};
use crate::platform::Clock;
use parking_lot::{Condvar, Mutex};
use stats::QueueCounters;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a worker's wait on the queue.
#[derive(Debug)]
pub(crate) enum Dequeued {
    /// An item to run, with the time it spent queued.
    Work {
        /// The item
        item: WorkItem,
        /// Time between enqueue and dequeue
        wait: Duration,
    },
    /// Woke up to an empty queue without shutdown.
    Idle,
    /// The queue is shutting down.
    Shutdown,
}

struct QueueState {
    items: VecDeque<WorkItem>,
    counters: QueueCounters,
    shutdown: bool,
}

/// A FIFO of work items with head insertion, served by one worker pool.
pub struct WorkQueue {
    queue_type: QueueType,
    state: Mutex<QueueState>,
    available: Condvar,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WorkQueue")
            .field("queue_type", &self.queue_type)
            .field("depth", &state.items.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

impl WorkQueue {
    /// Creates an empty queue.
    pub fn new(queue_type: QueueType, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue_type,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                counters: QueueCounters::default(),
                shutdown: false,
            }),
            available: Condvar::new(),
            clock,
        }
    }

    /// Queue type this queue serves.
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Appends an item at the tail and wakes one worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError::QueueNotActive`] once the queue has been shut
    /// down. The item is dropped.
    pub fn enqueue(&self, item: WorkItem) -> Result<()> {
        self.push(item, false)
    }

    /// Inserts an item at the head and wakes one worker.
    ///
    /// The item runs before every item already queued.
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError::QueueNotActive`] once the queue has been shut
    /// down. The item is dropped.
    pub fn enqueue_to_head(&self, item: WorkItem) -> Result<()> {
        self.push(item, true)
    }

    fn push(&self, mut item: WorkItem, at_head: bool) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.shutdown {
                return Err(WorkQueueError::queue_not_active(self.queue_type));
            }

            item.stamp_enqueued(self.clock.now());
            if at_head {
                state.items.push_front(item);
            } else {
                state.items.push_back(item);
            }
            let depth = state.items.len();
            state.counters.record_enqueue(depth);

            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_enqueue(self.queue_type, depth, at_head);
        }

        self.available.notify_one();
        Ok(())
    }

    /// Waits for the next item.
    ///
    /// Blocks until an item is queued or the queue shuts down. With
    /// `idle_wake` set, an empty wait also ends after that long. Service
    /// statistics for the returned item are recorded under the queue lock.
    pub(crate) fn dequeue(&self, idle_wake: Option<Duration>) -> Dequeued {
        let mut state = self.state.lock();

        if !state.shutdown && state.items.is_empty() {
            match idle_wake {
                Some(interval) => {
                    self.available.wait_for(&mut state, interval);
                }
                None => self.available.wait(&mut state),
            }
        }

        if state.shutdown {
            return Dequeued::Shutdown;
        }

        match state.items.pop_front() {
            Some(item) => {
                let now = self.clock.now();
                let wait = item
                    .enqueued_at()
                    .map(|enqueued| now.saturating_duration_since(enqueued))
                    .unwrap_or_default();
                state.counters.record_service(wait);
                Dequeued::Work { item, wait }
            }
            None => Dequeued::Idle,
        }
    }

    /// Stops accepting work and wakes every waiting worker.
    ///
    /// Items still queued are removed and returned so the caller can drop
    /// them outside the lock. Calling this twice returns nothing the second
    /// time.
    pub fn shutdown(&self) -> Vec<WorkItem> {
        let discarded: Vec<WorkItem> = {
            let mut state = self.state.lock();
            state.shutdown = true;
            let discarded: Vec<WorkItem> = state.items.drain(..).collect();
            state.counters.record_discard(discarded.len());
            discarded
        };

        self.available.notify_all();
        discarded
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Snapshot of the queue statistics.
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        state.counters.snapshot(self.queue_type, state.items.len())
    }
}
