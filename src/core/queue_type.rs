//! Queue type identifiers.
//!
//! Every work queue in a [`QueueRegistry`] is addressed by a [`QueueType`]
//! drawn from a closed enumeration: a handful of well-known categories, a
//! block of generic custom slots for subsystems that need a private queue,
//! and reserved slots that can never be created.
//!
//! ```rust
//! use worker_queue_system::QueueType;
//!
//! let critical = QueueType::from_index(0).unwrap();
//! assert_eq!(critical, QueueType::Critical);
//! assert!(QueueType::from_index(QueueType::COUNT).is_err());
//! assert!(QueueType::Reserved0.is_reserved());
//! ```
//!
//! [`QueueRegistry`]: crate::registry::QueueRegistry

use crate::core::error::{Result, WorkQueueError};
use serde::Serialize;
use std::fmt;

/// Identifier of one slot in the queue registry.
///
/// The discriminant is the slot index, always in `[0, QueueType::COUNT)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum QueueType {
    /// Time-critical work that must not wait behind bulk work.
    Critical = 0,
    /// Work that tolerates latency.
    Delayed,
    /// Work above critical, reserved for the most latency-sensitive paths.
    HyperCritical,
    /// General-purpose work.
    Normal,
    /// Housekeeping and other low-urgency work.
    Background,
    /// Real-time work.
    RealTime,
    /// Work between critical and hyper-critical.
    SuperCritical,
    /// Generic slot 0.
    Custom0,
    /// Generic slot 1.
    Custom1,
    /// Generic slot 2.
    Custom2,
    /// Generic slot 3.
    Custom3,
    /// Generic slot 4.
    Custom4,
    /// Generic slot 5.
    Custom5,
    /// Generic slot 6.
    Custom6,
    /// Generic slot 7.
    Custom7,
    /// Reserved, never creatable.
    Reserved0,
    /// Reserved, never creatable.
    Reserved1,
}

impl QueueType {
    /// Number of slots in the table.
    pub const COUNT: usize = 17;

    /// Every queue type in slot order.
    pub const ALL: [QueueType; Self::COUNT] = [
        Self::Critical,
        Self::Delayed,
        Self::HyperCritical,
        Self::Normal,
        Self::Background,
        Self::RealTime,
        Self::SuperCritical,
        Self::Custom0,
        Self::Custom1,
        Self::Custom2,
        Self::Custom3,
        Self::Custom4,
        Self::Custom5,
        Self::Custom6,
        Self::Custom7,
        Self::Reserved0,
        Self::Reserved1,
    ];

    /// Generic slots available to subsystems without a well-known category.
    pub const CUSTOM: [QueueType; 8] = [
        Self::Custom0,
        Self::Custom1,
        Self::Custom2,
        Self::Custom3,
        Self::Custom4,
        Self::Custom5,
        Self::Custom6,
        Self::Custom7,
    ];

    /// Looks up a queue type by raw slot index.
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError::InvalidType`] if `index >= COUNT`.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| WorkQueueError::invalid_type(index, "out of range"))
    }

    /// Slot index of this queue type.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this slot is reserved.
    pub fn is_reserved(self) -> bool {
        matches!(self, Self::Reserved0 | Self::Reserved1)
    }

    /// Whether this is one of the generic custom slots.
    pub fn is_custom(self) -> bool {
        Self::CUSTOM.contains(&self)
    }

    /// Checks that a pool may be created for this type.
    pub(crate) fn ensure_creatable(self) -> Result<()> {
        if self.is_reserved() {
            return Err(WorkQueueError::invalid_type(self.index(), "reserved"));
        }
        Ok(())
    }

    /// Human-readable name, also used in worker thread names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Delayed => "Delayed",
            Self::HyperCritical => "HyperCritical",
            Self::Normal => "Normal",
            Self::Background => "Background",
            Self::RealTime => "RealTime",
            Self::SuperCritical => "SuperCritical",
            Self::Custom0 => "Custom0",
            Self::Custom1 => "Custom1",
            Self::Custom2 => "Custom2",
            Self::Custom3 => "Custom3",
            Self::Custom4 => "Custom4",
            Self::Custom5 => "Custom5",
            Self::Custom6 => "Custom6",
            Self::Custom7 => "Custom7",
            Self::Reserved0 => "Reserved0",
            Self::Reserved1 => "Reserved1",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<usize> for QueueType {
    type Error = WorkQueueError;

    fn try_from(index: usize) -> Result<Self> {
        Self::from_index(index)
    }
}
