//! Record sources backing the stream transport

use futures::Stream;
use futures::future::BoxFuture;
use serde_json::Value;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::transport::LaunchSpec;
use crate::types::identifiers::{ProviderId, ToolName};
use crate::types::permissions::PermissionMode;

/// Boxed stream of structured agent records
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Structured configuration handed to a record source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Prompt for the agent
    pub prompt: String,
    /// Working directory
    pub cwd: PathBuf,
    /// Permission mode
    pub permission_mode: PermissionMode,
    /// Side-effecting tools the agent may invoke, in order
    pub allowed_tools: Vec<ToolName>,
}

impl From<&LaunchSpec> for StreamRequest {
    fn from(spec: &LaunchSpec) -> Self {
        Self {
            prompt: spec.message.clone(),
            cwd: spec.cwd.clone(),
            permission_mode: spec.policy.permission_mode,
            allowed_tools: spec.policy.allowed_tools.clone(),
        }
    }
}

/// An asynchronous producer of agent records
///
/// Implementations should stop producing once `abort` is cancelled; the
/// driving loop stops consuming either way.
pub trait RecordSource: Send + Sync {
    /// Open a record stream for one request
    ///
    /// # Errors
    /// Returns error when the source exists but cannot start; this is a
    /// launch failure, not a reason to fall back
    fn open(&self, request: StreamRequest, abort: CancellationToken) -> BoxFuture<'static, Result<RecordStream>>;
}

/// Locates the record source for a provider, if one is installed
pub trait SourceResolver: Send + Sync {
    /// `None` means the capability is absent and the process transport
    /// should be used instead
    fn resolve(&self, provider: &ProviderId) -> Option<Arc<dyn RecordSource>>;
}

/// Resolver over a fixed provider table
#[derive(Default, Clone)]
pub struct StaticResolver {
    sources: std::collections::HashMap<ProviderId, Arc<dyn RecordSource>>,
}

impl StaticResolver {
    /// Empty resolver; every lookup falls back
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source for a provider
    #[must_use]
    pub fn with_source(mut self, provider: impl Into<ProviderId>, source: Arc<dyn RecordSource>) -> Self {
        self.sources.insert(provider.into(), source);
        self
    }
}

impl SourceResolver for StaticResolver {
    fn resolve(&self, provider: &ProviderId) -> Option<Arc<dyn RecordSource>> {
        self.sources.get(provider).cloned()
    }
}
