//! # Agent Session Orchestration for Rust
//!
//! Runs long-running coding agent sessions (the Claude CLI or any
//! CLI-style provider, or an in-process record stream) bound to project
//! workspaces. At most one session is active per workspace; every session's
//! output is captured into a durable log and published live to subscribers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kodegen_agent_sessions::{
//!     OrchestratorConfig, SessionEvent, SessionKey, SessionOrchestrator, SessionRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = SessionOrchestrator::new(OrchestratorConfig::from_env()?)?;
//!     let mut events = orchestrator.subscribe();
//!
//!     let key = SessionKey::new("claude", "my-project");
//!     orchestrator
//!         .start(key.clone(), SessionRequest::new("Fix the failing test", "/src/my-project"))
//!         .await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             SessionEvent::Output { text, .. } => log::info!("{text}"),
//!             SessionEvent::Error { text, terminal, .. } => {
//!                 log::warn!("{text}");
//!                 if terminal {
//!                     break;
//!                 }
//!             }
//!             SessionEvent::Complete { exit_code, .. } => {
//!                 log::info!("done: {exit_code:?}");
//!                 break;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`orchestrator`]: `start`, `stop`, queries and the session state machine
//! - [`registry`]: Session handles keyed by `provider:workspace`
//! - [`transport`]: Process and stream transports with ordered fallback
//! - [`message`]: Incremental demultiplexer from raw chunks to output records
//! - [`logs`]: Per-session durable logs under `<data_dir>/agent/`
//! - [`events`]: Output, error and completion events
//! - [`external`]: Installation probe and fragment persistence interfaces
//! - [`types`]: Identifiers, configuration and records
//! - [`error`]: Error types
//!
//! ## Error Handling
//!
//! Only failures before a session is registered are returned as
//! [`SessionError`]. After `start` returns, everything (including transport
//! crashes) arrives as [`SessionEvent`]s and as the log's terminal marker.
//!
//! ```no_run
//! # use kodegen_agent_sessions::{SessionError, SessionKey, SessionOrchestrator, SessionRequest};
//! # async fn example(orchestrator: &SessionOrchestrator) {
//! let key = SessionKey::new("claude", "ws");
//! match orchestrator.start(key, SessionRequest::new("hi", ".")).await {
//!     Ok(id) => log::info!("started {id}"),
//!     Err(SessionError::CliNotFound(instructions)) => log::error!("{instructions}"),
//!     Err(e) => log::error!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod events;
pub mod external;
pub mod logs;
pub mod message;
pub mod orchestrator;
pub mod registry;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use error::{Result, SessionError};
pub use events::{EventBus, EventSink, SessionEvent};
pub use external::{CliProbe, FragmentOrigin, FragmentStore, InstallProbe};
pub use logs::{LogStore, read_tail};
pub use message::{OutputDemuxer, demux_stream, parse_line};
pub use orchestrator::{SessionOrchestrator, SessionOrchestratorBuilder};
pub use registry::{SessionHandle, SessionRegistry};
pub use transport::{
    ProcessTransportFactory, RecordSource, RecordStream, SourceResolver, StaticResolver,
    StreamRequest, StreamTransportFactory, TransportFactory, TransportKind,
};
pub use types::identifiers::{
    CorrelationId, ProviderId, SessionId, SessionKey, ToolName, WorkspaceId,
};
pub use types::options::{OrchestratorConfig, OrchestratorConfigBuilder, ProviderCommand, SessionRequest};
pub use types::permissions::{PermissionMode, PermissionPolicy};
pub use types::records::{OutputRecord, TerminalMarker};
pub use types::session::{LogTail, SessionInfo};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
