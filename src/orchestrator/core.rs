//! Core orchestrator struct, builder and shared helpers

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use crate::error::{Result, SessionError};
use crate::events::{EventBus, EventSink};
use crate::external::{CliProbe, FragmentStore, InstallProbe};
use crate::logs::LogStore;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::transport::{
    ProcessTransportFactory, SourceResolver, StreamTransportFactory, TransportCancel,
    TransportFactory,
};
use crate::types::identifiers::{SessionKey, WorkspaceId};
use crate::types::options::OrchestratorConfig;
use crate::types::records::TerminalMarker;

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Owner of the session registry, log store and transport factories
///
/// All session-creating paths go through [`start`](Self::start); sessions end
/// through [`stop`](Self::stop), eviction, or their transport finishing.
pub struct SessionOrchestrator {
    pub(super) config: OrchestratorConfig,
    pub(super) registry: Arc<SessionRegistry>,
    pub(super) logs: Arc<LogStore>,
    pub(super) bus: EventBus,
    pub(super) publisher: Arc<dyn EventSink>,
    pub(super) factories: Vec<Arc<dyn TransportFactory>>,
    pub(super) fragments: Option<Arc<dyn FragmentStore>>,
    pub(super) probe: Arc<dyn InstallProbe>,
    /// Per-workspace start serialization; never held by `stop`
    start_gates: StartGates,
}

type StartGates = Mutex<HashMap<WorkspaceId, Arc<tokio::sync::Mutex<()>>>>;

impl SessionOrchestrator {
    /// Orchestrator with default collaborators
    ///
    /// # Errors
    /// Returns `SessionError::InvalidConfig` if the configuration is invalid
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building an orchestrator
    #[must_use]
    pub fn builder(config: OrchestratorConfig) -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder {
            config,
            event_sink: None,
            resolver: None,
            fragments: None,
            probe: None,
            factories: None,
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Session registry
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Log store
    #[must_use]
    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    /// Serialize starts on `workspace` until the returned guard drops
    pub(super) async fn lock_workspace(&self, workspace: &WorkspaceId) -> WorkspaceStart<'_> {
        let gate = Arc::clone(self.start_gates.lock().entry(workspace.clone()).or_default());
        let guard = gate.lock_owned().await;
        WorkspaceStart {
            gates: &self.start_gates,
            workspace: workspace.clone(),
            guard: Some(guard),
        }
    }

    /// Request cancellation, bounded by the configured timeout
    pub(super) async fn cancel_transport(&self, handle: &SessionHandle) -> Result<()> {
        cancel_within(handle.canceller.as_ref(), self.config.cancel_timeout()).await
    }

    /// End an evicted session without waiting for its transport
    ///
    /// The log is finalized right away; the cancellation request runs in the
    /// background and its failures are only logged.
    pub(super) async fn retire(&self, handle: SessionHandle) {
        log::info!(
            "[{}] Evicting session {} ({} transport)",
            handle.key(),
            handle.session_id(),
            handle.transport()
        );
        handle.sink.terminate(TerminalMarker::Cancelled).await;

        let key = handle.key().clone();
        let canceller = Arc::clone(&handle.canceller);
        let timeout = self.config.cancel_timeout();
        tokio::spawn(async move {
            if let Err(e) = cancel_within(canceller.as_ref(), timeout).await {
                log::warn!("[{key}] Ignoring cancellation failure during eviction: {e}");
            }
        });
    }
}

async fn cancel_within(canceller: &dyn TransportCancel, timeout: Duration) -> Result<()> {
    match tokio::time::timeout(timeout, canceller.cancel()).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::timeout(format!(
            "cancellation not acknowledged within {} ms",
            timeout.as_millis()
        ))),
    }
}

/// Exclusive start slot for one workspace
///
/// Dropping it releases the slot and forgets the workspace's gate once no
/// other start is waiting on it.
pub(super) struct WorkspaceStart<'a> {
    gates: &'a StartGates,
    workspace: WorkspaceId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for WorkspaceStart<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut gates = self.gates.lock();
        if gates
            .get(&self.workspace)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.workspace);
        }
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("registry", &self.registry)
            .field("logs", &self.logs)
            .field(
                "factories",
                &self.factories.iter().map(|f| f.kind()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`SessionOrchestrator`]
pub struct SessionOrchestratorBuilder {
    config: OrchestratorConfig,
    event_sink: Option<Arc<dyn EventSink>>,
    resolver: Option<Arc<dyn SourceResolver>>,
    fragments: Option<Arc<dyn FragmentStore>>,
    probe: Option<Arc<dyn InstallProbe>>,
    factories: Option<Vec<Arc<dyn TransportFactory>>>,
}

impl SessionOrchestratorBuilder {
    /// Additional sink receiving every event next to the built-in bus
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Install the record-source resolver enabling the stream transport
    #[must_use]
    pub fn source_resolver(mut self, resolver: Arc<dyn SourceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Forward output fragments of correlated sessions to a store
    #[must_use]
    pub fn fragment_store(mut self, store: Arc<dyn FragmentStore>) -> Self {
        self.fragments = Some(store);
        self
    }

    /// Replace the installation probe
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn InstallProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Replace the transport factory list, tried in order
    #[must_use]
    pub fn transport_factories(mut self, factories: Vec<Arc<dyn TransportFactory>>) -> Self {
        self.factories = Some(factories);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    /// Returns `SessionError::InvalidConfig` if the configuration is invalid
    pub fn build(self) -> Result<SessionOrchestrator> {
        self.config.validate()?;

        let probe: Arc<dyn InstallProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(CliProbe::new(self.config.providers.clone())),
        };

        let factories = match self.factories {
            Some(factories) => factories,
            None => {
                let process: Arc<dyn TransportFactory> = Arc::new(ProcessTransportFactory::new(
                    self.config.providers.clone(),
                    Arc::clone(&probe),
                ));
                match self.resolver {
                    Some(resolver) => {
                        let stream: Arc<dyn TransportFactory> =
                            Arc::new(StreamTransportFactory::new(resolver));
                        if self.config.prefer_stream {
                            vec![stream, process]
                        } else {
                            vec![process, stream]
                        }
                    }
                    None => vec![process],
                }
            }
        };
        if factories.is_empty() {
            return Err(SessionError::invalid_config("no transport factories"));
        }

        let bus = EventBus::new();
        let publisher: Arc<dyn EventSink> = Arc::new(Publisher {
            bus: bus.clone(),
            extra: self.event_sink,
        });

        Ok(SessionOrchestrator {
            logs: Arc::new(LogStore::new(self.config.data_dir.clone())),
            config: self.config,
            registry: Arc::new(SessionRegistry::new()),
            bus,
            publisher,
            factories,
            fragments: self.fragments,
            probe,
            start_gates: Mutex::new(HashMap::new()),
        })
    }
}

/// Publishes to the bus and, if configured, one more sink
struct Publisher {
    bus: EventBus,
    extra: Option<Arc<dyn EventSink>>,
}

impl EventSink for Publisher {
    fn on_output(&self, key: &SessionKey, text: &str) {
        self.bus.on_output(key, text);
        if let Some(extra) = &self.extra {
            extra.on_output(key, text);
        }
    }

    fn on_error(&self, key: &SessionKey, text: &str, terminal: bool) {
        self.bus.on_error(key, text, terminal);
        if let Some(extra) = &self.extra {
            extra.on_error(key, text, terminal);
        }
    }

    fn on_complete(&self, key: &SessionKey, exit_code: Option<i32>) {
        self.bus.on_complete(key, exit_code);
        if let Some(extra) = &self.extra {
            extra.on_complete(key, exit_code);
        }
    }
}
