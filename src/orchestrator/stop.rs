//! Session stop and shutdown

use crate::types::identifiers::SessionKey;
use crate::types::records::TerminalMarker;

use super::core::SessionOrchestrator;

impl SessionOrchestrator {
    /// Cancel the session at a key
    ///
    /// Returns `true` when nothing is registered at the key or cancellation
    /// was acknowledged. On `false` the session is still deregistered and its
    /// log finalized as cancelled.
    ///
    /// Safe to call repeatedly or concurrently: only the call that removes the
    /// registry entry signals the transport.
    pub async fn stop(&self, key: &SessionKey) -> bool {
        let Some(handle) = self.registry.remove(key) else {
            return true;
        };

        log::info!("[{key}] Stopping session {}", handle.session_id());
        let result = self.cancel_transport(&handle).await;
        handle.sink.terminate(TerminalMarker::Cancelled).await;

        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[{key}] Cancellation failed: {e}");
                false
            }
        }
    }

    /// Stop every registered session
    ///
    /// Returns the number of sessions whose cancellation failed.
    pub async fn shutdown(&self) -> usize {
        let keys = self.registry.keys();
        log::info!("Shutting down {} agent session(s)", keys.len());

        let mut failures = 0;
        for key in keys {
            if !self.stop(&key).await {
                failures += 1;
            }
        }
        failures
    }
}
