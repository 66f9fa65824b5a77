//! Session start
//!
//! Handles eviction of conflicting sessions, transport acquisition with
//! fallback, log provisioning and registration.

use std::sync::Arc;

use crate::error::Result;
use crate::external::FragmentForwarder;
use crate::logs::{LogHeader, SessionLog};
use crate::registry::SessionHandle;
use crate::transport::{LaunchSpec, LaunchedTransport, acquire_transport};
use crate::types::identifiers::{SessionId, SessionKey};
use crate::types::options::SessionRequest;

use super::core::SessionOrchestrator;
use super::pump::{PumpContext, spawn_pump};
use super::sink::SessionSink;

impl SessionOrchestrator {
    /// Start a session and return once its transport is running
    ///
    /// Any session already bound to the same workspace, under any provider,
    /// is cancelled first. Output then flows to the log and to subscribers in
    /// the background.
    ///
    /// # Errors
    /// Returns error if no transport could be launched or the log could not
    /// be provisioned; nothing is registered in that case
    pub async fn start(&self, key: SessionKey, request: SessionRequest) -> Result<SessionId> {
        let _starting = self.lock_workspace(key.workspace()).await;

        for handle in self.registry.evict_workspace(key.workspace()) {
            self.retire(handle).await;
        }

        let spec = LaunchSpec::new(key.clone(), &request, &self.config.policy);
        let transport = acquire_transport(&self.factories, &spec).await?;

        let log = match self.provision_log(&key, &request).await {
            Ok(log) => log,
            Err(e) => {
                if let Err(cancel_err) = transport.canceller.cancel().await {
                    log::warn!("[{key}] Failed to cancel unused transport: {cancel_err}");
                }
                return Err(e);
            }
        };

        let LaunchedTransport {
            kind,
            pid,
            events,
            canceller,
        } = transport;

        let forwarder = request
            .correlation_id
            .clone()
            .zip(self.fragments.clone())
            .map(|(correlation_id, store)| {
                FragmentForwarder::spawn(store, key.clone(), correlation_id)
            });
        let sink = Arc::new(SessionSink::new(
            key.clone(),
            log,
            Arc::clone(&self.logs),
            Arc::clone(&self.publisher),
            forwarder,
        ));

        let handle = SessionHandle::new(
            key.clone(),
            kind,
            pid,
            request.correlation_id,
            canceller,
            Arc::clone(&sink),
        );
        let session_id = handle.session_id();

        for evicted in self.registry.register(handle) {
            self.retire(evicted).await;
        }

        spawn_pump(
            PumpContext {
                key: key.clone(),
                session_id,
                sink,
                registry: Arc::clone(&self.registry),
            },
            events,
        );

        log::info!("[{key}] Session {session_id} started on {kind} transport");
        Ok(session_id)
    }

    async fn provision_log(&self, key: &SessionKey, request: &SessionRequest) -> Result<Arc<SessionLog>> {
        // Whatever is still cached belongs to a session that is no longer
        // registered; the next ensure replaces its file
        if self.logs.release(key).is_some() {
            log::debug!("[{key}] Released stale session log");
        }
        let log = self.logs.ensure(key).await?;
        log.write_header(&LogHeader::new(key, request.message.clone()))
            .await?;
        Ok(log)
    }
}
