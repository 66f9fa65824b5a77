//! Session event publication
//!
//! Exactly three event kinds exist per session key. The orchestrator publishes
//! through [`EventSink`]; [`EventBus`] is the default sink, fanning events out
//! to any number of `broadcast` subscribers. Publishing never requires a
//! subscriber to be present.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::identifiers::SessionKey;

/// Default capacity of the broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Event published for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Resolved text of one output record
    Output {
        /// Session key
        key: SessionKey,
        /// Output text
        text: String,
    },
    /// Side-channel diagnostics, or the failure that ended the session
    Error {
        /// Session key
        key: SessionKey,
        /// Error text
        text: String,
        /// `true` only for the failure that ended the session
        terminal: bool,
    },
    /// Session ended; `exit_code` is `None` when it was cancelled
    Complete {
        /// Session key
        key: SessionKey,
        /// Transport exit code
        exit_code: Option<i32>,
    },
}

impl SessionEvent {
    /// Whether this is the last event of its session
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::Output { .. } => false,
            Self::Error { terminal, .. } => *terminal,
            Self::Complete { .. } => true,
        }
    }

    /// Key of the session that produced the event
    #[must_use]
    pub const fn key(&self) -> &SessionKey {
        match self {
            Self::Output { key, .. } | Self::Error { key, .. } | Self::Complete { key, .. } => key,
        }
    }
}

/// Typed publish interface for session events
pub trait EventSink: Send + Sync {
    /// An output record was produced
    fn on_output(&self, key: &SessionKey, text: &str);

    /// Error-stream data arrived (`terminal == false`), or the session failed
    fn on_error(&self, key: &SessionKey, text: &str, terminal: bool);

    /// The session completed or was cancelled
    fn on_complete(&self, key: &SessionKey, exit_code: Option<i32>);
}

/// Broadcast-backed [`EventSink`]
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` events per lagging subscriber
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to every event published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn on_output(&self, key: &SessionKey, text: &str) {
        self.publish(SessionEvent::Output {
            key: key.clone(),
            text: text.to_string(),
        });
    }

    fn on_error(&self, key: &SessionKey, text: &str, terminal: bool) {
        self.publish(SessionEvent::Error {
            key: key.clone(),
            text: text.to_string(),
            terminal,
        });
    }

    fn on_complete(&self, key: &SessionKey, exit_code: Option<i32>) {
        self.publish(SessionEvent::Complete {
            key: key.clone(),
            exit_code,
        });
    }
}
