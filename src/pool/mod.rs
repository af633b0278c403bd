//! Worker threads and the pool that owns them

mod config;
mod stats;
mod worker;
mod worker_pool;

pub use config::PoolConfig;
pub use stats::{ThreadStatistics, ThreadStats};
pub use worker_pool::WorkerPool;
