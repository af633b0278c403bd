//! Error types for the work queue system

use crate::core::QueueType;

/// Result type for work queue system operations
pub type Result<T> = std::result::Result<T, WorkQueueError>;

/// Errors that can occur in the work queue system
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WorkQueueError {
    /// Queue type index is out of range or names a reserved slot
    #[error("Invalid queue type index {index}: {reason}")]
    InvalidType {
        /// Raw queue type index
        index: usize,
        /// Why the index was rejected
        reason: &'static str,
    },

    /// Queue type already has a pool
    #[error("Queue type '{queue_type}' already has an active pool of {thread_count} threads")]
    AlreadyExists {
        /// The queue type
        queue_type: QueueType,
        /// Thread count of the existing pool
        thread_count: usize,
    },

    /// Queue type is not active
    #[error("Queue type '{queue_type}' is not active")]
    NotFound {
        /// The queue type
        queue_type: QueueType,
    },

    /// Queue type is draining or destroyed and no longer accepts work
    #[error("Queue type '{queue_type}' does not accept work")]
    QueueNotActive {
        /// The queue type
        queue_type: QueueType,
    },

    /// Worker threads could not be created
    #[error("Cannot start pool for '{queue_type}' ({started}/{requested} threads started): {message}")]
    ResourceExhausted {
        /// The queue type
        queue_type: QueueType,
        /// Number of threads requested
        requested: usize,
        /// Number of threads started before the failure
        started: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Caller buffer cannot hold a statistics snapshot
    #[error("Buffer too small: {provided} bytes provided, {required} required")]
    BufferTooSmall {
        /// Size required by the layout
        required: usize,
        /// Size of the caller buffer
        provided: usize,
    },

    /// Invalid pool configuration
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },
}

impl WorkQueueError {
    /// Create an invalid type error
    pub fn invalid_type(index: usize, reason: &'static str) -> Self {
        WorkQueueError::InvalidType { index, reason }
    }

    /// Create an already exists error
    pub fn already_exists(queue_type: QueueType, thread_count: usize) -> Self {
        WorkQueueError::AlreadyExists {
            queue_type,
            thread_count,
        }
    }

    /// Create a not found error
    pub fn not_found(queue_type: QueueType) -> Self {
        WorkQueueError::NotFound { queue_type }
    }

    /// Create a queue not active error
    pub fn queue_not_active(queue_type: QueueType) -> Self {
        WorkQueueError::QueueNotActive { queue_type }
    }

    /// Create a resource exhausted error
    pub fn resource_exhausted(
        queue_type: QueueType,
        requested: usize,
        started: usize,
        message: impl Into<String>,
    ) -> Self {
        WorkQueueError::ResourceExhausted {
            queue_type,
            requested,
            started,
            message: message.into(),
            source: None,
        }
    }

    /// Create a resource exhausted error with source
    pub fn resource_exhausted_with_source(
        queue_type: QueueType,
        requested: usize,
        started: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        WorkQueueError::ResourceExhausted {
            queue_type,
            requested,
            started,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a buffer too small error
    pub fn buffer_too_small(required: usize, provided: usize) -> Self {
        WorkQueueError::BufferTooSmall { required, provided }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        WorkQueueError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}
