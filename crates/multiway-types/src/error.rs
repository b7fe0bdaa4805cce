//! Shared error types for the Multiway relay.

use crate::channel::ChannelId;
use thiserror::Error;

/// Top-level error type for the relay.
///
/// The configuration variants are reported back to whoever issued the
/// mutation; their `Display` text is what the user sees.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A relay with this name already exists.
    #[error("that name is in use: {0}")]
    NameInUse(String),

    /// The named relay does not exist.
    #[error("that relay doesn't exist: {0}")]
    NotFound(String),

    /// Fewer than two usable channels were supplied.
    #[error("I did not get two or more valid channel IDs (got {found})")]
    InsufficientChannels {
        /// How many live, distinct channels were left after filtering.
        found: usize,
    },

    /// A channel ID is not reachable on the platform.
    #[error("{0} isn't a channel id that I can see")]
    UnknownChannel(ChannelId),

    /// Removing the source from its own destinations left nothing.
    #[error("a broadcast can't target only its own source (no infinite loops)")]
    EmptyAfterFilter,

    /// A broadcast removal was requested for a source with no broadcast.
    #[error("{0} wasn't a broadcast channel to be removed")]
    NoBroadcastToRemove(ChannelId),

    /// Relay names must be non-empty.
    #[error("relay names can't be empty")]
    InvalidName,

    /// No announcer settings source is configured or readable.
    #[error("announcer settings unavailable: {0}")]
    AnnouncerUnavailable(String),

    /// A document store error occurred.
    #[error("Memory error: {0}")]
    Memory(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The host platform failed a request.
    #[error("Platform error: {0}")]
    Platform(String),

    /// A configuration file error occurred.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// True for errors caused by the request itself rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RelayError::NameInUse(_)
                | RelayError::NotFound(_)
                | RelayError::InsufficientChannels { .. }
                | RelayError::UnknownChannel(_)
                | RelayError::EmptyAfterFilter
                | RelayError::NoBroadcastToRemove(_)
                | RelayError::InvalidName
                | RelayError::AnnouncerUnavailable(_)
        )
    }
}

/// Alias for Result with RelayError.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_classified() {
        assert!(RelayError::NameInUse("x".into()).is_user_error());
        assert!(RelayError::EmptyAfterFilter.is_user_error());
        assert!(!RelayError::Memory("disk full".into()).is_user_error());
    }

    #[test]
    fn test_error_display_is_user_facing() {
        let err = RelayError::InsufficientChannels { found: 1 };
        assert!(err.to_string().contains("two or more"));
    }
}
