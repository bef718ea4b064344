//! Bus-level error type.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The subject pattern does not follow the wildcard grammar.
    #[error("invalid subject pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// A concrete subject (used for publishing) is malformed.
    #[error("invalid subject '{0}'")]
    InvalidSubject(String),

    /// The underlying transport refused the message.
    #[error("publish failed: {0}")]
    Publish(String),
}
