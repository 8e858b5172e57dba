//! Error types for HEVC buffer and reference management.

use decvue_core::CoreError;
use thiserror::Error;

/// Result type for DPB and reference-list operations.
pub type Result<T> = std::result::Result<T, DpbError>;

/// Errors raised while managing the decoded picture buffer.
#[derive(Error, Debug)]
pub enum DpbError {
    /// The bitstream declared something inconsistent (duplicate POC,
    /// self-referencing RPS, out-of-range list modification, ...).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Every slot of the layer's DPB is occupied.
    #[error("DPB full, no free frame slot")]
    DpbFull,

    /// A buffer or pool allocation failed.
    #[error("out of memory: {0}")]
    Oom(String),

    /// The downstream consumer rejected an output picture.
    #[error("output rejected by consumer")]
    Output(#[source] CoreError),
}

impl DpbError {
    /// Create an invalid-data error with a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}

impl From<CoreError> for DpbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AllocationFailed(_) | CoreError::PoolExhausted { .. } => {
                DpbError::Oom(err.to_string())
            }
            CoreError::FifoClosed => DpbError::Output(err),
        }
    }
}
