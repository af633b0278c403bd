//! Platform capabilities the pool depends on: a monotonic clock and CPU
//! affinity binding.
//!
//! Both are injected into a [`QueueRegistry`] through
//! [`RegistryBuilder`], so tests can substitute their own.
//!
//! [`QueueRegistry`]: crate::registry::QueueRegistry
//! [`RegistryBuilder`]: crate::registry::RegistryBuilder

mod affinity;
mod clock;

pub use affinity::{AffinityPolicy, AffinityProvider, CpuMask, NoAffinity, SystemAffinity};
pub use clock::{Clock, MonotonicClock};
