//! Per-queue statistics.
//!
//! [`QueueCounters`] lives inside the queue lock and is updated on every
//! enqueue and dequeue; [`QueueStats`] is the copy handed to callers.

use crate::core::QueueType;
use serde::Serialize;
use std::time::Duration;

/// Snapshot of a work queue's statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Queue type the statistics belong to.
    pub queue_type: QueueType,

    /// Items handed to a worker.
    pub total_serviced: u64,

    /// Items accepted by the queue.
    pub total_enqueued: u64,

    /// Items dropped because the queue was destroyed before they ran.
    pub total_discarded: u64,

    /// Sum of the time every serviced item spent queued.
    pub total_wait_time: Duration,

    /// Longest time a serviced item spent queued.
    pub max_wait_time: Duration,

    /// Deepest the queue has been since it was created.
    pub max_queue_length: usize,

    /// Depth at the time of the snapshot.
    pub current_depth: usize,
}

impl QueueStats {
    /// Average time a serviced item spent queued.
    pub fn avg_wait_time(&self) -> Duration {
        if self.total_serviced == 0 {
            Duration::ZERO
        } else {
            // Saturate rather than truncate the divisor on absurd counts.
            self.total_wait_time / u32::try_from(self.total_serviced).unwrap_or(u32::MAX)
        }
    }
}

/// Running counters guarded by the queue lock.
#[derive(Debug, Default)]
pub(crate) struct QueueCounters {
    total_serviced: u64,
    total_enqueued: u64,
    total_discarded: u64,
    total_wait_time: Duration,
    max_wait_time: Duration,
    max_queue_length: usize,
}

impl QueueCounters {
    pub(crate) fn record_enqueue(&mut self, depth_after: usize) {
        self.total_enqueued += 1;
        self.max_queue_length = self.max_queue_length.max(depth_after);
    }

    pub(crate) fn record_service(&mut self, wait: Duration) {
        self.total_serviced += 1;
        self.total_wait_time += wait;
        self.max_wait_time = self.max_wait_time.max(wait);
    }

    pub(crate) fn record_discard(&mut self, count: usize) {
        self.total_discarded += count as u64;
    }

    pub(crate) fn snapshot(&self, queue_type: QueueType, current_depth: usize) -> QueueStats {
        QueueStats {
            queue_type,
            total_serviced: self.total_serviced,
            total_enqueued: self.total_enqueued,
            total_discarded: self.total_discarded,
            total_wait_time: self.total_wait_time,
            max_wait_time: self.max_wait_time,
            max_queue_length: self.max_queue_length,
            current_depth,
        }
    }
}
