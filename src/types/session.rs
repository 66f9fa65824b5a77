//! Session query response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{CorrelationId, SessionId, SessionKey};

/// Snapshot of a registered session for `list_sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Registry slot
    pub key: SessionKey,
    /// Unique id of this session lifetime
    pub session_id: SessionId,
    /// Which transport variant serves the session
    pub transport: String,
    /// OS process id, for process-backed sessions
    pub pid: Option<u32>,
    /// Conversation receiving output fragments, if any
    pub correlation_id: Option<CorrelationId>,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// Milliseconds since start
    pub runtime_ms: u64,
}

/// Response from a log tail query
///
/// Both fields are empty when no session is registered for the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTail {
    /// Recorded start time of the session log
    pub started_at: Option<DateTime<Utc>>,
    /// Trailing slice of the log content
    pub content: String,
}

impl LogTail {
    /// Whether the tail carries no session
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started_at.is_none() && self.content.is_empty()
    }
}
