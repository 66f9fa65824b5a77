//! Session registry with workspace isolation
//!
//! Maps [`SessionKey`] to the active [`SessionHandle`]. At most one handle
//! exists per key and, independent of provider, at most one per workspace.
//! Registering evicts whatever conflicts and hands the evicted handles back
//! to the caller for cancellation; no method here blocks or awaits.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::orchestrator::SessionSink;
use crate::transport::{TransportCancel, TransportKind};
use crate::types::identifiers::{CorrelationId, SessionId, SessionKey, WorkspaceId};
use crate::types::session::SessionInfo;

/// Everything the orchestrator tracks for one running session
///
/// Identity fields never change after creation.
#[derive(Clone)]
pub struct SessionHandle {
    key: SessionKey,
    session_id: SessionId,
    transport: TransportKind,
    pid: Option<u32>,
    correlation_id: Option<CorrelationId>,
    started_at: DateTime<Utc>,
    pub(crate) canceller: Arc<dyn TransportCancel>,
    pub(crate) sink: Arc<SessionSink>,
}

impl SessionHandle {
    pub(crate) fn new(
        key: SessionKey,
        transport: TransportKind,
        pid: Option<u32>,
        correlation_id: Option<CorrelationId>,
        canceller: Arc<dyn TransportCancel>,
        sink: Arc<SessionSink>,
    ) -> Self {
        Self {
            key,
            session_id: SessionId::generate(),
            transport,
            pid,
            correlation_id,
            started_at: sink.log().started_at(),
            canceller,
            sink,
        }
    }

    /// Registry slot
    #[must_use]
    pub const fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Unique id of this session lifetime
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Transport variant serving the session
    #[must_use]
    pub const fn transport(&self) -> TransportKind {
        self.transport
    }

    /// OS process id, for process-backed sessions
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Conversation receiving output fragments
    #[must_use]
    pub const fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// When the session started
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshot for listings
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        let runtime_ms = Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        SessionInfo {
            key: self.key.clone(),
            session_id: self.session_id,
            transport: self.transport.to_string(),
            pid: self.pid,
            correlation_id: self.correlation_id.clone(),
            started_at: self.started_at,
            runtime_ms,
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("key", &self.key)
            .field("session_id", &self.session_id)
            .field("transport", &self.transport)
            .field("pid", &self.pid)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Mapping from session key to active handle
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, SessionHandle>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, evicting the same key and the same workspace
    ///
    /// Returns the evicted handles; cancelling them is the caller's job.
    pub fn register(&self, handle: SessionHandle) -> Vec<SessionHandle> {
        let mut sessions = self.sessions.lock();
        let evicted = take_workspace(&mut sessions, handle.key.workspace());
        sessions.insert(handle.key.clone(), handle);
        evicted
    }

    /// Remove every handle bound to a workspace, under any provider
    pub fn evict_workspace(&self, workspace: &WorkspaceId) -> Vec<SessionHandle> {
        take_workspace(&mut self.sessions.lock(), workspace)
    }

    /// Handle at a key
    #[must_use]
    pub fn lookup(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.lock().get(key).cloned()
    }

    /// Remove and return the handle at a key
    pub fn remove(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.lock().remove(key)
    }

    /// Remove the handle at a key only if it is still the given session
    ///
    /// A session ending on its own must not remove a successor that was
    /// registered under the same key in the meantime.
    pub fn remove_if(&self, key: &SessionKey, session_id: SessionId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock();
        if sessions.get(key).is_some_and(|h| h.session_id == session_id) {
            sessions.remove(key)
        } else {
            None
        }
    }

    /// Whether a session is registered at a key
    #[must_use]
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.lock().contains_key(key)
    }

    /// Registered keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<_> = self.sessions.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Snapshots of every registered session, sorted by key
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        let mut handles: Vec<_> = self.sessions.lock().values().cloned().collect();
        handles.sort_by(|a, b| a.key.cmp(&b.key));
        handles
    }

    /// Remove every handle
    pub fn drain(&self) -> Vec<SessionHandle> {
        self.sessions.lock().drain().map(|(_, handle)| handle).collect()
    }

    /// Number of registered sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

fn take_workspace(
    sessions: &mut HashMap<SessionKey, SessionHandle>,
    workspace: &WorkspaceId,
) -> Vec<SessionHandle> {
    let conflicting: Vec<SessionKey> = sessions
        .keys()
        .filter(|key| key.workspace() == workspace)
        .cloned()
        .collect();
    conflicting
        .iter()
        .filter_map(|key| sessions.remove(key))
        .collect()
}
