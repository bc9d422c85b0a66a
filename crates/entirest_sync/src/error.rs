//! Error types for the sync layer.

use crate::transport::TransportFailure;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during persistence operations.
///
/// Structural and address errors surface synchronously before any
/// transport call; everything else wraps a transport failure with its
/// cause preserved. No variant is retried internally; retry policy
/// belongs to the transport.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport call itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportFailure),

    /// A fetch failed; the transport failure is the cause.
    #[error("failed to fetch from the server")]
    FetchFailed {
        /// The underlying transport failure.
        #[source]
        source: TransportFailure,
    },

    /// A delete failed; the transport failure is the cause.
    #[error("failed to delete on the server")]
    DeleteFailed {
        /// The underlying transport failure.
        #[source]
        source: TransportFailure,
    },

    /// Validation failed before a save; no transport call was made.
    #[error("validation failed, save was not attempted")]
    ValidationFailed,

    /// The server rejected a save. The failure payload is also cached on
    /// the entity's error slot.
    #[error("save rejected by the server")]
    SaveRejected {
        /// The raw rejection.
        #[source]
        source: TransportFailure,
    },

    /// A core store error.
    #[error(transparent)]
    Core(#[from] entirest_core::CoreError),
}
