//! Error types for agent session orchestration
//!
//! Only failures that happen before a session is registered surface as
//! errors. Everything after registration travels as session events.

use thiserror::Error;

/// Main error type for agent session orchestration
#[derive(Error, Debug)]
pub enum SessionError {
    /// Agent CLI not found or not installed
    #[error("Agent CLI not found: {0}")]
    CliNotFound(String),

    /// Transport could not be launched
    #[error("Launch error: {0}")]
    Launch(String),

    /// Every configured transport reported itself unavailable
    #[error("No transport available for provider '{0}'")]
    NoTransport(String),

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Cancellation signal could not be delivered
    #[error("Cancel error: {0}")]
    Cancel(String),

    /// JSON decode error
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session key could not be parsed
    #[error("Invalid session key '{0}': expected 'provider:workspace'")]
    InvalidSessionKey(String),

    /// Fragment persistence failed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create a CLI not found error carrying install instructions
    pub fn cli_not_found(instructions: impl Into<String>) -> Self {
        Self::CliNotFound(instructions.into())
    }

    /// Create a launch error
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Create a no-transport error
    pub fn no_transport(provider: impl Into<String>) -> Self {
        Self::NoTransport(provider.into())
    }

    /// Create a transport error, as raised by a [`RecordSource`](crate::RecordSource)
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a cancel error
    pub fn cancel(msg: impl Into<String>) -> Self {
        Self::Cancel(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a persistence error, as raised by a [`FragmentStore`](crate::FragmentStore)
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Whether this error was raised before any session state existed
    ///
    /// Covers the transport never coming up; the binary reports these as
    /// launch failures rather than session errors.
    #[must_use]
    pub const fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            Self::CliNotFound(_) | Self::Launch(_) | Self::NoTransport(_)
        )
    }
}
