//! Convenient re-exports for common types and traits

pub use crate::core::{
    ClosureRoutine, QueueType, Result, Routine, WorkItem, WorkItemHandle, WorkQueueError,
};
pub use crate::platform::{AffinityPolicy, CpuMask};
pub use crate::pool::{PoolConfig, ThreadStatistics, ThreadStats};
pub use crate::queue::QueueStats;
pub use crate::registry::{QueueRegistry, QueueState};
