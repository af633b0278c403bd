//! Human-readable and JSON reports of the active queue types

use super::{QueueRegistry, SlotState};
use crate::core::QueueType;
use crate::platform::CpuMask;
use crate::pool::{ThreadStatistics, ThreadStats};
use crate::queue::QueueStats;
use serde::Serialize;
use std::fmt::{self, Write};

/// Point-in-time report for one active queue type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    /// The queue type
    pub queue_type: QueueType,
    /// Worker threads in the pool
    pub thread_count: usize,
    /// CPU mask the workers were bound to
    pub affinity: Option<CpuMask>,
    /// Queue counters
    pub queue: QueueStats,
    /// Thread counters aggregated over the pool
    pub threads: ThreadStatistics,
    /// Counters of each worker
    pub per_thread: Vec<ThreadStats>,
}

impl QueueRegistry {
    /// Snapshot every active queue type, in slot order.
    pub fn queue_summaries(&self) -> Vec<QueueSummary> {
        QueueType::ALL
            .into_iter()
            .filter_map(|queue_type| match &*self.slot(queue_type).state.read() {
                SlotState::Active(pool) => {
                    let per_thread = pool.thread_stats();
                    Some(QueueSummary {
                        queue_type,
                        thread_count: pool.thread_count(),
                        affinity: pool.affinity(),
                        queue: pool.queue_stats(),
                        threads: ThreadStatistics::aggregate(&per_thread),
                        per_thread,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Render a line-oriented report of every active queue type to `sink`.
    ///
    /// Each active type appears once with its queue and aggregate thread
    /// counters. The exact layout is for people, not parsers.
    pub fn summary<W: Write>(&self, name: &str, sink: &mut W) -> fmt::Result {
        let summaries = self.queue_summaries();
        writeln!(sink, "{}: {} active queue types", name, summaries.len())?;

        for summary in &summaries {
            let queue = &summary.queue;
            let threads = &summary.threads;

            write!(sink, "  {} threads={}", summary.queue_type, summary.thread_count)?;
            if let Some(mask) = summary.affinity {
                write!(sink, " affinity={}", mask)?;
            }
            writeln!(
                sink,
                " depth={} enqueued={} serviced={} discarded={} max_len={} avg_wait={:?} max_wait={:?}",
                queue.current_depth,
                queue.total_enqueued,
                queue.total_serviced,
                queue.total_discarded,
                queue.max_queue_length,
                queue.avg_wait_time(),
                queue.max_wait_time
            )?;
            writeln!(
                sink,
                "    tasks={} woke_with_work={} woke_without_work={} total_task={:?} max_task={:?} max_idle={:?}",
                threads.tasks_executed,
                threads.woke_with_work,
                threads.woke_without_work,
                threads.total_time_on_tasks,
                threads.max_time_on_task,
                threads.max_idle_time
            )?;
        }
        Ok(())
    }

    /// Render [`summary`](Self::summary) through the `log` facade at info
    /// level, one record per line.
    pub fn log_summary(&self, name: &str) {
        let mut report = String::new();
        if self.summary(name, &mut report).is_err() {
            return;
        }
        for line in report.lines() {
            log::info!("{}", line);
        }
    }

    /// Every active queue type as a JSON array of [`QueueSummary`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn summary_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.queue_summaries())
    }
}
