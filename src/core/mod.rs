//! Core types for the work queue system

pub mod error;
pub mod queue_type;
pub mod work_item;

pub use error::{Result, WorkQueueError};
pub use queue_type::QueueType;
pub use work_item::{ClosureRoutine, Routine, WorkItem, WorkItemHandle};
