//! Error types for the EntiRest core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A store operation was given a value of the wrong shape.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of what was expected.
        message: String,
    },

    /// No base address could be resolved for a sync call.
    ///
    /// An entity must declare a `url_root` on its schema, or belong to a
    /// collection whose schema declares a `url`.
    #[error("no url could be resolved: declare url_root on the model schema or url on the owning collection")]
    AddressResolution,
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::invalid_argument("expected an object, got an array");
        assert!(err.to_string().contains("expected an object"));

        let err = CoreError::AddressResolution;
        assert!(err.to_string().contains("url"));
    }
}
