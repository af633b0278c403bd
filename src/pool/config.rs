//! Worker pool configuration

use crate::core::{Result, WorkQueueError};
use crate::platform::{AffinityPolicy, CpuMask};
use std::time::Duration;

/// Configuration for the worker pool behind one queue type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads. Must be non-zero.
    pub thread_count: usize,
    /// CPUs every worker is bound to, if any.
    pub affinity: Option<CpuMask>,
    /// What to do when the mask cannot be applied.
    /// Default: [`AffinityPolicy::IfSupported`]
    pub affinity_policy: AffinityPolicy,
    /// Thread name prefix; names are `{prefix}-{queue type}-{index}`.
    pub thread_name_prefix: String,
    /// Wake idle workers this often even without work.
    /// Default: None (sleep until work or shutdown)
    ///
    /// Each such wake-up counts as a wake without work.
    pub idle_wake_interval: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            affinity: None,
            affinity_policy: AffinityPolicy::default(),
            thread_name_prefix: "wq".to_string(),
            idle_wake_interval: None,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with the given number of threads
    #[must_use]
    pub fn new(thread_count: usize) -> Self {
        Self {
            thread_count,
            ..Default::default()
        }
    }

    /// Bind every worker to `mask`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_affinity(mut self, mask: CpuMask) -> Self {
        self.affinity = Some(mask);
        self
    }

    /// Set the affinity policy
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_affinity_policy(mut self, policy: AffinityPolicy) -> Self {
        self.affinity_policy = policy;
        self
    }

    /// Fail pool creation when the CPU mask cannot be applied.
    ///
    /// Equivalent to:
    /// ```rust,ignore
    /// config.with_affinity_policy(AffinityPolicy::Required)
    /// ```
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn require_affinity(self) -> Self {
        self.with_affinity_policy(AffinityPolicy::Required)
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the idle wake interval.
    ///
    /// # Panics
    ///
    /// Panics if interval is zero.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_idle_wake_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "idle wake interval must be non-zero");
        self.idle_wake_interval = Some(interval);
        self
    }

    /// Validate configuration.
    ///
    /// A zero thread count is reported by pool creation as
    /// [`WorkQueueError::ResourceExhausted`], not here.
    pub fn validate(&self) -> Result<()> {
        if let Some(mask) = self.affinity {
            if mask.is_empty() {
                return Err(WorkQueueError::invalid_config(
                    "affinity",
                    "CPU mask selects no CPU",
                ));
            }
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(WorkQueueError::invalid_config(
                "thread_name_prefix",
                "thread names cannot contain NUL bytes",
            ));
        }
        Ok(())
    }
}
