//! # Worker Queue System
//!
//! A registry of typed work queues, each served by its own pool of
//! dedicated worker threads.
//!
//! ## Features
//!
//! - **Closed Queue Types**: A fixed table of named queue types plus generic custom slots
//! - **Per-Type Pools**: Every active type owns a work queue and 1..N worker threads
//! - **Head Insertion**: Push an item ahead of everything already queued
//! - **CPU Affinity**: Optional per-pool CPU mask, applied where the platform allows
//! - **Statistics**: Queue wait times and depth, per-thread wake and task timings
//! - **Deterministic Teardown**: Destroy joins every worker before returning
//!
//! ## Quick Start
//!
//! ```rust
//! use worker_queue_system::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let registry = QueueRegistry::new();
//! registry.create(QueueType::Normal, 4)?;
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! let mut handles = Vec::new();
//! for _ in 0..10 {
//!     let counter = Arc::clone(&counter);
//!     let item = WorkItem::from_fn(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     });
//!     handles.push(item.handle());
//!     registry.enqueue(QueueType::Normal, item)?;
//! }
//!
//! for handle in &handles {
//!     assert!(handle.wait_timeout(Duration::from_secs(5)));
//! }
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//!
//! registry.destroy_all()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pool Configuration
//!
//! ```rust
//! use worker_queue_system::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = PoolConfig::new(2)
//!     .with_affinity(CpuMask::single(0))
//!     .with_thread_name_prefix("io")
//!     .with_idle_wake_interval(Duration::from_millis(100));
//!
//! let registry = QueueRegistry::new();
//! registry.create_with_config(QueueType::Custom0, config)?;
//! # registry.destroy(QueueType::Custom0)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Routines
//!
//! ```rust
//! use worker_queue_system::prelude::*;
//!
//! struct Flush {
//!     pages: Vec<u64>,
//! }
//!
//! impl Routine for Flush {
//!     fn run(&mut self) {
//!         println!("Flushing {} pages", self.pages.len());
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Flush"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! # let registry = QueueRegistry::new();
//! # registry.create(QueueType::Delayed, 1)?;
//! registry.enqueue(QueueType::Delayed, WorkItem::new(Flush { pages: vec![1, 2, 3] }))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Statistics
//!
//! ```rust
//! use worker_queue_system::prelude::*;
//!
//! # fn main() -> Result<()> {
//! # let registry = QueueRegistry::new();
//! registry.create(QueueType::Critical, 2)?;
//!
//! let mut buffer = [0u8; ThreadStatistics::LAYOUT_SIZE];
//! registry.query_thread_statistics(QueueType::Critical, &mut buffer)?;
//! let stats = ThreadStatistics::from_bytes(&buffer)?;
//! assert_eq!(stats.thread_count, 2);
//!
//! let mut report = String::new();
//! registry.summary("example", &mut report).unwrap();
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod platform;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod registry;
pub mod tracing;

pub use core::{ClosureRoutine, QueueType, Result, Routine, WorkItem, WorkItemHandle, WorkQueueError};
pub use platform::{AffinityPolicy, CpuMask};
pub use pool::{PoolConfig, ThreadStatistics, ThreadStats};
pub use queue::QueueStats;
pub use registry::{QueueRegistry, QueueState, QueueSummary, RegistryBuilder};
