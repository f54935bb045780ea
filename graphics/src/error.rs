//! Graphics error types.

use thiserror::Error;

use crate::camera::HistoryId;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// No history slot has been allocated under this id.
    #[error("no history buffers allocated for {0}")]
    InvalidSlot(HistoryId),
    /// A history buffer was requested further back than the ring holds.
    #[error("history offset {frames_ago} out of range for {id} ({count} buffers)")]
    InvalidOffset {
        id: HistoryId,
        frames_ago: usize,
        count: usize,
    },
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
