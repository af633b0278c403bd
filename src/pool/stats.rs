//! Per-thread statistics snapshots and their per-queue aggregate.

use crate::core::{Result, WorkQueueError};
use serde::Serialize;
use std::time::Duration;

/// Snapshot of one worker thread's counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ThreadStats {
    /// Worker index within its pool.
    pub worker_id: usize,

    /// Wake-ups that found an item to run.
    pub woke_with_work: u64,

    /// Wake-ups that found no item (idle interval, spurious wake or shutdown).
    pub woke_without_work: u64,

    /// Routines run to completion.
    pub tasks_executed: u64,

    /// Time spent inside routines.
    pub total_time_on_tasks: Duration,

    /// Longest single routine.
    pub max_time_on_task: Duration,

    /// Longest gap between routines, or from thread start to the first one.
    pub max_idle_time: Duration,
}

/// Thread statistics aggregated over every worker of one queue type.
///
/// Counters are summed; maxima are the maximum over all threads. The
/// aggregate has a fixed little-endian layout of
/// [`LAYOUT_SIZE`](Self::LAYOUT_SIZE) bytes for callers that supply their own
/// buffer: seven `u64` fields in declaration order, durations in nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ThreadStatistics {
    /// Number of worker threads aggregated.
    pub thread_count: u64,

    /// Sum of [`ThreadStats::woke_with_work`].
    pub woke_with_work: u64,

    /// Sum of [`ThreadStats::woke_without_work`].
    pub woke_without_work: u64,

    /// Sum of [`ThreadStats::tasks_executed`].
    pub tasks_executed: u64,

    /// Sum of [`ThreadStats::total_time_on_tasks`].
    pub total_time_on_tasks: Duration,

    /// Maximum of [`ThreadStats::max_time_on_task`].
    pub max_time_on_task: Duration,

    /// Maximum of [`ThreadStats::max_idle_time`].
    pub max_idle_time: Duration,
}

const FIELD_SIZE: usize = std::mem::size_of::<u64>();

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl ThreadStatistics {
    /// Bytes needed to hold the encoded aggregate.
    pub const LAYOUT_SIZE: usize = 7 * FIELD_SIZE;

    /// Aggregates per-thread snapshots.
    pub fn aggregate<'a>(threads: impl IntoIterator<Item = &'a ThreadStats>) -> Self {
        threads
            .into_iter()
            .fold(ThreadStatistics::default(), |mut total, thread| {
                total.thread_count += 1;
                total.woke_with_work += thread.woke_with_work;
                total.woke_without_work += thread.woke_without_work;
                total.tasks_executed += thread.tasks_executed;
                total.total_time_on_tasks += thread.total_time_on_tasks;
                total.max_time_on_task = total.max_time_on_task.max(thread.max_time_on_task);
                total.max_idle_time = total.max_idle_time.max(thread.max_idle_time);
                total
            })
    }

    /// Average time per executed routine.
    pub fn avg_time_on_task(&self) -> Duration {
        if self.tasks_executed == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(duration_to_nanos(self.total_time_on_tasks) / self.tasks_executed)
        }
    }

    fn fields(&self) -> [u64; 7] {
        [
            self.thread_count,
            self.woke_with_work,
            self.woke_without_work,
            self.tasks_executed,
            duration_to_nanos(self.total_time_on_tasks),
            duration_to_nanos(self.max_time_on_task),
            duration_to_nanos(self.max_idle_time),
        ]
    }

    /// Encodes into the start of `buffer`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError::BufferTooSmall`] if `buffer` is shorter than
    /// [`LAYOUT_SIZE`](Self::LAYOUT_SIZE); the buffer is left untouched.
    pub fn write_to(&self, buffer: &mut [u8]) -> Result<usize> {
        if buffer.len() < Self::LAYOUT_SIZE {
            return Err(WorkQueueError::buffer_too_small(
                Self::LAYOUT_SIZE,
                buffer.len(),
            ));
        }

        for (chunk, value) in buffer[..Self::LAYOUT_SIZE]
            .chunks_exact_mut(FIELD_SIZE)
            .zip(self.fields())
        {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(Self::LAYOUT_SIZE)
    }

    /// Decodes an aggregate written by [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError::BufferTooSmall`] if `buffer` is shorter than
    /// [`LAYOUT_SIZE`](Self::LAYOUT_SIZE).
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LAYOUT_SIZE {
            return Err(WorkQueueError::buffer_too_small(
                Self::LAYOUT_SIZE,
                buffer.len(),
            ));
        }

        let mut fields = [0u64; 7];
        for (value, chunk) in fields
            .iter_mut()
            .zip(buffer[..Self::LAYOUT_SIZE].chunks_exact(FIELD_SIZE))
        {
            let mut bytes = [0u8; FIELD_SIZE];
            bytes.copy_from_slice(chunk);
            *value = u64::from_le_bytes(bytes);
        }

        Ok(Self {
            thread_count: fields[0],
            woke_with_work: fields[1],
            woke_without_work: fields[2],
            tasks_executed: fields[3],
            total_time_on_tasks: Duration::from_nanos(fields[4]),
            max_time_on_task: Duration::from_nanos(fields[5]),
            max_idle_time: Duration::from_nanos(fields[6]),
        })
    }
}
