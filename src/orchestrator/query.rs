//! Session queries, log tails and manual appends

use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::SessionEvent;
use crate::logs::read_tail;
use crate::types::identifiers::{ProviderId, SessionKey};
use crate::types::session::{LogTail, SessionInfo};

use super::core::SessionOrchestrator;

impl SessionOrchestrator {
    /// Snapshots of every registered session, sorted by key
    #[must_use]
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.registry
            .snapshot()
            .iter()
            .map(|handle| handle.info())
            .collect()
    }

    /// Snapshot of the session at a key
    #[must_use]
    pub fn session_info(&self, key: &SessionKey) -> Option<SessionInfo> {
        self.registry.lookup(key).map(|handle| handle.info())
    }

    /// Whether a session is registered at a key
    #[must_use]
    pub fn is_active(&self, key: &SessionKey) -> bool {
        self.registry.contains(key)
    }

    /// Subscribe to events of every session
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Trailing slice of a running session's log
    ///
    /// Empty when nothing is registered at the key, even if an older log is
    /// still on disk. `max_bytes` defaults to the configured tail size.
    ///
    /// # Errors
    /// Returns error if the log file cannot be read
    pub async fn tail_log(&self, key: &SessionKey, max_bytes: Option<usize>) -> Result<LogTail> {
        let Some(handle) = self.registry.lookup(key) else {
            return Ok(LogTail::default());
        };
        let log = handle.sink.log();
        let content = read_tail(log.path(), max_bytes.unwrap_or(self.config.tail_bytes)).await?;
        Ok(LogTail {
            started_at: Some(log.started_at()),
            content,
        })
    }

    /// Feed text into a running session as if the agent produced it
    ///
    /// Returns `false` when nothing is registered at the key.
    pub async fn append(&self, key: &SessionKey, text: &str) -> bool {
        match self.registry.lookup(key) {
            Some(handle) => {
                handle.sink.output(text).await;
                true
            }
            None => false,
        }
    }

    /// Whether the provider's CLI can be found
    #[must_use]
    pub fn availability(&self, provider: &ProviderId) -> bool {
        self.probe.is_available(provider)
    }

    /// User-facing install instructions for a provider
    #[must_use]
    pub fn install_instructions(&self, provider: &ProviderId) -> String {
        self.probe.install_instructions(provider)
    }
}
