//! Best-effort forwarding of output fragments to conversation storage

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::identifiers::{CorrelationId, SessionKey};

/// Who produced a persisted fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentOrigin {
    /// Output produced by the agent
    Agent,
}

impl fmt::Display for FragmentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// Durable conversation storage owned by another subsystem
pub trait FragmentStore: Send + Sync {
    /// Store one output fragment under a conversation
    fn persist(
        &self,
        correlation_id: &CorrelationId,
        text: &str,
        origin: FragmentOrigin,
    ) -> BoxFuture<'static, Result<()>>;
}

/// Per-session forwarder
///
/// Fragments are queued and persisted in order by a background task, so the
/// session never waits on storage. Failures are logged and dropped.
#[derive(Clone)]
pub(crate) struct FragmentForwarder {
    tx: mpsc::UnboundedSender<String>,
}

impl FragmentForwarder {
    /// Spawn the forwarding task for one session
    pub(crate) fn spawn(
        store: Arc<dyn FragmentStore>,
        key: SessionKey,
        correlation_id: CorrelationId,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = store
                    .persist(&correlation_id, &text, FragmentOrigin::Agent)
                    .await
                {
                    log::warn!("[{key}] Failed to persist fragment for {correlation_id}: {e}");
                }
            }
        });
        Self { tx }
    }

    /// Queue a fragment
    pub(crate) fn offer(&self, text: &str) {
        // Task gone means the runtime is shutting down
        let _ = self.tx.send(text.to_string());
    }
}
