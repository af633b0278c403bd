//! Tracing integration for observability.
//!
//! With the `tracing` feature enabled, workers run inside per-worker spans
//! and the queue and pool emit trace events through [`metrics`].
//!
//! # Example
//!
//! ```rust,ignore
//! use worker_queue_system::prelude::*;
//! use worker_queue_system::tracing::TracedRoutine;
//!
//! let registry = QueueRegistry::new();
//! registry.create(QueueType::Delayed, 2)?;
//!
//! // The submitter's current span is entered again on the worker thread
//! let routine = TracedRoutine::new(ClosureRoutine::new(|| flush_cache()));
//! registry.enqueue(QueueType::Delayed, WorkItem::new(routine))?;
//! ```

use crate::core::Routine;

/// A routine wrapper that carries the submitter's tracing span to the
/// worker thread.
///
/// The current span is captured when the wrapper is built and entered
/// around [`Routine::run`]. Without the `tracing` feature this is a
/// transparent pass-through.
pub struct TracedRoutine<R: Routine> {
    inner: R,
    #[cfg(feature = "tracing")]
    span: tracing::Span,
}

impl<R: Routine> TracedRoutine<R> {
    /// Wraps `routine`, capturing the current span.
    pub fn new(routine: R) -> Self {
        Self {
            inner: routine,
            #[cfg(feature = "tracing")]
            span: tracing::Span::current(),
        }
    }

    /// Wraps `routine` with a specific span.
    #[cfg(feature = "tracing")]
    pub fn with_span(routine: R, span: tracing::Span) -> Self {
        Self {
            inner: routine,
            span,
        }
    }
}

impl<R: Routine> Routine for TracedRoutine<R> {
    fn run(&mut self) {
        #[cfg(feature = "tracing")]
        let _guard = self.span.enter();
        self.inner.run()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Metrics recording functions for observability.
///
/// These emit tracing events that a subscriber can turn into counters,
/// gauges and histograms.
#[cfg(feature = "tracing")]
pub mod metrics {
    use crate::core::QueueType;
    use std::time::Duration;

    /// Records an item entering a queue.
    #[inline]
    pub fn record_enqueue(queue_type: QueueType, queue_depth: usize, at_head: bool) {
        tracing::trace!(
            counter.items_enqueued = 1,
            gauge.queue_depth = queue_depth as i64,
            queue_type = queue_type.name(),
            at_head = at_head,
            "work item enqueued"
        );
    }

    /// Records a finished routine with its queue wait and run time.
    #[inline]
    pub fn record_completion(wait: Duration, duration: Duration) {
        tracing::trace!(
            counter.items_completed = 1,
            histogram.wait_time_us = wait.as_micros() as u64,
            histogram.run_time_us = duration.as_micros() as u64,
            "work item completed"
        );
    }

    /// Records pool startup.
    #[inline]
    pub fn record_pool_start(queue_type: QueueType, num_workers: usize) {
        tracing::info!(
            workers = num_workers,
            queue_type = queue_type.name(),
            "worker pool started"
        );
    }

    /// Records pool shutdown.
    #[inline]
    pub fn record_pool_shutdown(queue_type: QueueType, items_discarded: usize) {
        tracing::info!(
            queue_type = queue_type.name(),
            items_discarded = items_discarded,
            "worker pool shutdown complete"
        );
    }
}
