//! Work items and their timing records

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A unit of deferred work executed by a worker thread.
///
/// The routine and its context are the same value: implementors carry
/// whatever state they need as fields. The pool never inspects the outcome
/// of [`run`](Routine::run); failure handling belongs to the routine.
pub trait Routine: Send {
    /// Run the routine
    fn run(&mut self);

    /// Name used for tracing and diagnostics
    fn name(&self) -> &str {
        "Routine"
    }
}

impl fmt::Debug for dyn Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Routine({})", self.name())
    }
}

/// Helper to create a routine from a closure
pub struct ClosureRoutine<F>
where
    F: FnOnce() + Send,
{
    closure: Option<F>,
    name: String,
}

impl<F> ClosureRoutine<F>
where
    F: FnOnce() + Send,
{
    /// Create a new closure routine
    pub fn new(closure: F) -> Self {
        Self {
            closure: Some(closure),
            name: "ClosureRoutine".to_string(),
        }
    }

    /// Create a new closure routine with a custom name
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure: Some(closure),
            name: name.into(),
        }
    }
}

impl<F> Routine for ClosureRoutine<F>
where
    F: FnOnce() + Send,
{
    fn run(&mut self) {
        // A work item executes once; a second run has nothing left to call.
        if let Some(closure) = self.closure.take() {
            closure();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default, Clone, Copy)]
struct Timestamps {
    enqueued: Option<Instant>,
    started: Option<Instant>,
    finished: Option<Instant>,
}

#[derive(Debug, Default)]
struct ItemTiming {
    stamps: Mutex<Timestamps>,
    finished: Condvar,
}

/// A routine plus the timing fields the pool stamps as it moves through a
/// queue.
///
/// A `WorkItem` is moved into [`QueueRegistry::enqueue`] and owned by the
/// queue from then on; keep a [`WorkItemHandle`] to observe it afterwards.
///
/// [`QueueRegistry::enqueue`]: crate::registry::QueueRegistry::enqueue
pub struct WorkItem {
    id: u64,
    routine: Box<dyn Routine>,
    enqueued_at: Option<Instant>,
    timing: Arc<ItemTiming>,
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("routine", &self.routine.name())
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

impl WorkItem {
    /// Create a work item from a routine
    pub fn new<R: Routine + 'static>(routine: R) -> Self {
        Self {
            id: NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed),
            routine: Box::new(routine),
            enqueued_at: None,
            timing: Arc::new(ItemTiming::default()),
        }
    }

    /// Create a work item from a closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(ClosureRoutine::new(f))
    }

    /// Unique item ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the routine
    pub fn name(&self) -> &str {
        self.routine.name()
    }

    /// Handle for observing this item after it has been submitted
    pub fn handle(&self) -> WorkItemHandle {
        WorkItemHandle {
            id: self.id,
            timing: Arc::clone(&self.timing),
        }
    }

    pub(crate) fn enqueued_at(&self) -> Option<Instant> {
        self.enqueued_at
    }

    pub(crate) fn stamp_enqueued(&mut self, now: Instant) {
        self.enqueued_at = Some(now);
        *self.timing.stamps.lock() = Timestamps {
            enqueued: Some(now),
            started: None,
            finished: None,
        };
    }

    pub(crate) fn stamp_started(&self, now: Instant) {
        self.timing.stamps.lock().started = Some(now);
    }

    pub(crate) fn stamp_finished(&self, now: Instant) {
        self.timing.stamps.lock().finished = Some(now);
        self.timing.finished.notify_all();
    }

    pub(crate) fn run(&mut self) {
        self.routine.run();
    }
}

/// Observer for a submitted [`WorkItem`].
///
/// Handles are cheap to clone and stay valid after the item has run.
#[derive(Clone)]
pub struct WorkItemHandle {
    id: u64,
    timing: Arc<ItemTiming>,
}

impl fmt::Debug for WorkItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItemHandle")
            .field("id", &self.id)
            .field("stamps", &*self.timing.stamps.lock())
            .finish()
    }
}

impl WorkItemHandle {
    /// ID of the observed item
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the item was queued
    pub fn enqueue_time(&self) -> Option<Instant> {
        self.timing.stamps.lock().enqueued
    }

    /// When a worker started the routine
    pub fn start_time(&self) -> Option<Instant> {
        self.timing.stamps.lock().started
    }

    /// When the routine returned
    pub fn end_time(&self) -> Option<Instant> {
        self.timing.stamps.lock().finished
    }

    /// Time spent waiting in the queue, zero until a worker picks it up
    pub fn queue_time(&self) -> Duration {
        let stamps = self.timing.stamps.lock();
        match (stamps.enqueued, stamps.started) {
            (Some(enqueued), Some(started)) => started.saturating_duration_since(enqueued),
            _ => Duration::ZERO,
        }
    }

    /// Time the routine ran, zero until it finishes
    pub fn run_time(&self) -> Duration {
        let stamps = self.timing.stamps.lock();
        match (stamps.started, stamps.finished) {
            (Some(started), Some(finished)) => finished.saturating_duration_since(started),
            _ => Duration::ZERO,
        }
    }

    /// Whether the routine has finished
    pub fn is_complete(&self) -> bool {
        self.timing.stamps.lock().finished.is_some()
    }

    /// Block until the routine finishes or `timeout` elapses.
    ///
    /// Returns `true` if the routine finished. An item discarded by a queue
    /// destroy never finishes. A timeout too large to represent as a
    /// deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut stamps = self.timing.stamps.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while stamps.finished.is_none() {
                self.timing.finished.wait(&mut stamps);
            }
            return true;
        };
        while stamps.finished.is_none() {
            if self
                .timing
                .finished
                .wait_until(&mut stamps, deadline)
                .timed_out()
            {
                return stamps.finished.is_some();
            }
        }
        true
    }
}
