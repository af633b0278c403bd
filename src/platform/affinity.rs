//! CPU affinity masks and binding

// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use serde::Serialize;
use std::fmt;
use std::io;

/// Set of CPUs a worker thread may run on, one bit per CPU.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct CpuMask(u64);

impl CpuMask {
    /// Highest CPU count a mask can describe.
    pub const MAX_CPUS: usize = 64;

    /// Mask from a raw bit pattern
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Mask containing a single CPU.
    ///
    /// CPUs at or above [`MAX_CPUS`](Self::MAX_CPUS) yield an empty mask.
    pub fn single(cpu: usize) -> Self {
        if cpu < Self::MAX_CPUS {
            Self(1 << cpu)
        } else {
            Self(0)
        }
    }

    /// Mask of CPUs `0..n`, where `n` is the logical CPU count (at most 64)
    pub fn all() -> Self {
        let cpus = num_cpus::get().min(Self::MAX_CPUS);
        if cpus == Self::MAX_CPUS {
            Self(u64::MAX)
        } else {
            Self((1u64 << cpus) - 1)
        }
    }

    /// Raw bit pattern
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether no CPU is selected
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `cpu` is selected
    pub fn contains(self, cpu: usize) -> bool {
        cpu < Self::MAX_CPUS && self.0 & (1 << cpu) != 0
    }

    /// Number of selected CPUs
    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Selected CPUs in ascending order
    pub fn cpus(self) -> impl Iterator<Item = usize> {
        (0..Self::MAX_CPUS).filter(move |cpu| self.contains(*cpu))
    }
}

impl fmt::Debug for CpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuMask({:#x})", self.0)
    }
}

impl fmt::Display for CpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for CpuMask {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

/// What a worker does when its CPU mask cannot be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub enum AffinityPolicy {
    /// Log a warning and run unbound.
    #[default]
    IfSupported,
    /// Fail thread creation.
    Required,
}

/// Platform primitive for binding the calling thread to a set of CPUs.
///
/// Affinity is a capability, not a guarantee: callers query
/// [`supports_affinity`](Self::supports_affinity) before relying on it.
pub trait AffinityProvider: Send + Sync + fmt::Debug {
    /// Whether this platform can bind threads at all
    fn supports_affinity(&self) -> bool;

    /// Bind the calling thread to `mask`
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the mask or cannot bind.
    fn bind_current_thread(&self, mask: CpuMask) -> io::Result<()>;
}

/// Affinity through the operating system scheduler.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAffinity;

#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
impl AffinityProvider for SystemAffinity {
    fn supports_affinity(&self) -> bool {
        true
    }

    fn bind_current_thread(&self, mask: CpuMask) -> io::Result<()> {
        let mut cpu_set = CpuSet::new();
        for cpu in mask.cpus() {
            cpu_set.set(cpu).map_err(io::Error::from)?;
        }
        sched_setaffinity(Pid::from_raw(0), &cpu_set).map_err(io::Error::from)
    }
}

#[cfg(not(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
)))]
impl AffinityProvider for SystemAffinity {
    fn supports_affinity(&self) -> bool {
        false
    }

    fn bind_current_thread(&self, _mask: CpuMask) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "thread affinity is not supported on this platform",
        ))
    }
}

/// Provider for platforms without affinity control.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAffinity;

impl AffinityProvider for NoAffinity {
    fn supports_affinity(&self) -> bool {
        false
    }

    fn bind_current_thread(&self, _mask: CpuMask) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "thread affinity is not supported",
        ))
    }
}
