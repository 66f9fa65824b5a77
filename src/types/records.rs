//! Output record and terminal marker types
//!
//! [`OutputRecord`] is what the demultiplexer produces for every logical line
//! of agent output; [`TerminalMarker`] is the single outcome written at the
//! end of a session log.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Output Records
// ============================================================================

/// One logical unit of agent output
///
/// Downstream consumers treat every variant as plain text; the variant only
/// records how the text was recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum OutputRecord {
    /// Incremental `delta.text` fragment
    StreamDelta(String),
    /// Assistant message content
    AssistantText(String),
    /// Final `result` string
    ResultText(String),
    /// Top-level `message` string
    GenericMessage(String),
    /// Line that was not a structured record, terminator included
    RawLine(String),
}

impl OutputRecord {
    /// Resolved text of the record
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::StreamDelta(text)
            | Self::AssistantText(text)
            | Self::ResultText(text)
            | Self::GenericMessage(text)
            | Self::RawLine(text) => text,
        }
    }

    /// Consume the record, returning its text
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::StreamDelta(text)
            | Self::AssistantText(text)
            | Self::ResultText(text)
            | Self::GenericMessage(text)
            | Self::RawLine(text) => text,
        }
    }
}

// ============================================================================
// Terminal Marker
// ============================================================================

/// End-of-session outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalMarker {
    /// Transport ended normally with an exit code
    Complete {
        /// Exit code reported by the transport
        exit_code: i32,
    },
    /// Transport ended abnormally
    Failed {
        /// Failure description
        message: String,
    },
    /// Session was cancelled
    Cancelled,
}

impl fmt::Display for TerminalMarker {
    /// Log line form, without the trailing newline
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete { exit_code } => write!(f, "[COMPLETE] exit code {exit_code}"),
            Self::Failed { message } => write!(f, "[ERROR] {message}"),
            Self::Cancelled => f.write_str("[CANCELLED]"),
        }
    }
}
