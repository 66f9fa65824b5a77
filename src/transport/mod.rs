//! Transport layer for agent sessions
//!
//! A transport is the execution backend of one session. Two variants exist:
//!
//! - [`process`] spawns the agent CLI and exposes its raw stdout/stderr bytes
//! - [`stream`] drives an externally supplied asynchronous record source
//!
//! Factories are tried in order. A factory answers [`Acquisition::Unavailable`]
//! when its capability is missing (not an error; the next factory is tried)
//! and `Err` when launching genuinely failed (propagated to the caller).
//!
//! Every launched transport reports through a single ordered channel of
//! [`TransportEvent`]s that ends with exactly one [`TransportEvent::Exited`].

pub mod process;
pub mod stream;

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Result, SessionError};
use crate::types::identifiers::SessionKey;
use crate::types::options::SessionRequest;
use crate::types::permissions::PermissionPolicy;

pub use process::ProcessTransportFactory;
pub use stream::{
    RecordSource, RecordStream, SourceResolver, StaticResolver, StreamRequest,
    StreamTransportFactory,
};

/// Which transport variant serves a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// OS subprocess
    Process,
    /// Asynchronous record stream
    Stream,
}

impl TransportKind {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Stream => "stream",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a factory needs to launch one session
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Registry slot the session will occupy
    pub key: SessionKey,
    /// Message handed to the agent
    pub message: String,
    /// Working directory
    pub cwd: PathBuf,
    /// Extra environment (process transport only)
    pub env: HashMap<String, String>,
    /// Permission policy
    pub policy: PermissionPolicy,
}

impl LaunchSpec {
    /// Build a spec from a request and the orchestrator policy
    #[must_use]
    pub fn new(key: SessionKey, request: &SessionRequest, policy: &PermissionPolicy) -> Self {
        Self {
            key,
            message: request.message.clone(),
            cwd: request.cwd.clone(),
            env: request.env.clone(),
            policy: policy.clone(),
        }
    }
}

/// How a transport ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportExit {
    /// Normal end with an exit code
    Completed(i32),
    /// Abnormal end
    Failed(String),
    /// Ended because cancellation was requested
    Cancelled,
}

/// Ordered output of a launched transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Raw standard-output bytes, chunked arbitrarily
    Stdout(Vec<u8>),
    /// Raw standard-error bytes
    Stderr(Vec<u8>),
    /// Already-structured record from a stream source
    Record(serde_json::Value),
    /// Final event of the transport
    Exited(TransportExit),
}

/// Out-of-band cancellation of a running transport
pub trait TransportCancel: Send + Sync {
    /// Request cancellation
    ///
    /// A target that no longer exists counts as success.
    ///
    /// # Errors
    /// Returns `SessionError::Cancel` when the signal could not be delivered
    fn cancel(&self) -> BoxFuture<'_, Result<()>>;
}

/// A successfully launched transport
pub struct LaunchedTransport {
    /// Variant that launched
    pub kind: TransportKind,
    /// OS process id, for process transports
    pub pid: Option<u32>,
    /// Ordered event channel
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    /// Cancellation handle
    pub canceller: Arc<dyn TransportCancel>,
}

impl fmt::Debug for LaunchedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedTransport")
            .field("kind", &self.kind)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Result of asking one factory for a transport
#[derive(Debug)]
pub enum Acquisition {
    /// The transport is running
    Launched(LaunchedTransport),
    /// The capability behind this factory is absent; try the next one
    Unavailable(String),
}

/// Source of transports for a given variant
pub trait TransportFactory: Send + Sync {
    /// Variant this factory produces
    fn kind(&self) -> TransportKind;

    /// Try to launch a transport for `spec`
    ///
    /// # Errors
    /// Returns error when the capability exists but launching failed
    fn acquire<'a>(&'a self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<Acquisition>>;
}

/// Try each factory in order
///
/// # Errors
/// Propagates the first launch failure, or `SessionError::NoTransport` when
/// every factory is unavailable
pub async fn acquire_transport(
    factories: &[Arc<dyn TransportFactory>],
    spec: &LaunchSpec,
) -> Result<LaunchedTransport> {
    for factory in factories {
        match factory.acquire(spec).await? {
            Acquisition::Launched(transport) => {
                log::debug!("[{}] Acquired {} transport", spec.key, transport.kind);
                return Ok(transport);
            }
            Acquisition::Unavailable(reason) => {
                log::debug!(
                    "[{}] {} transport unavailable, falling back: {reason}",
                    spec.key,
                    factory.kind()
                );
            }
        }
    }
    Err(SessionError::no_transport(spec.key.provider().as_str()))
}
