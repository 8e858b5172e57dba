//! Shared error types for decoder infrastructure.

use thiserror::Error;

/// Result type for core infrastructure operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the shared decoder infrastructure.
///
/// Codec crates convert these into their own error taxonomy; allocation and
/// pool failures surface as out-of-memory there, FIFO failures are passed
/// through to the caller.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The picture allocator could not provide a buffer.
    #[error("picture allocation failed: {0}")]
    AllocationFailed(String),

    /// A bounded slab pool has no free slab left.
    #[error("slab pool exhausted ({in_use} slabs in use)")]
    PoolExhausted { in_use: usize },

    /// The output FIFO was closed by the consumer.
    #[error("output FIFO is closed")]
    FifoClosed,
}

impl CoreError {
    /// Create an allocation failure with a message.
    pub fn alloc(message: impl Into<String>) -> Self {
        Self::AllocationFailed(message.into())
    }
}
