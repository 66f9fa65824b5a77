//! Orchestrator configuration and session requests
//!
//! This module contains the orchestrator-wide configuration (with a builder
//! and JSON/env loading) and the per-session [`SessionRequest`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::identifiers::{CorrelationId, ProviderId, ToolName};
use super::permissions::{PermissionMode, PermissionPolicy};
use crate::error::{Result, SessionError};

/// Environment variable overriding the log data directory
pub const DATA_DIR_ENV: &str = "KODEGEN_AGENT_DATA_DIR";

/// Environment variable naming a JSON configuration file
pub const CONFIG_PATH_ENV: &str = "KODEGEN_AGENT_CONFIG";

/// Placeholder substituted with the request message in provider args
pub const MESSAGE_PLACEHOLDER: &str = "{message}";

const DEFAULT_CANCEL_TIMEOUT_MS: u64 = 5000;
const DEFAULT_TAIL_BYTES: usize = 64 * 1024;

/// Default application data directory
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kodegen")
}

// ============================================================================
// Provider Commands
// ============================================================================

/// Launch recipe for an additional CLI-style provider
///
/// Every occurrence of `{message}` in `args` is replaced by the request
/// message; nothing else varies between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCommand {
    /// Executable name or path
    pub program: String,
    /// Argument template
    pub args: Vec<String>,
    /// Install instructions shown when the executable is missing
    #[serde(default)]
    pub install_hint: Option<String>,
}

impl ProviderCommand {
    /// Render the argument vector for a message
    #[must_use]
    pub fn render_args(&self, message: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(MESSAGE_PLACEHOLDER, message))
            .collect()
    }
}

// ============================================================================
// Orchestrator Configuration
// ============================================================================

/// Orchestrator-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Root of the `agent/<provider>/<workspace>/stream.log` tree
    pub data_dir: PathBuf,
    /// Permission policy applied to every launch
    pub policy: PermissionPolicy,
    /// Extra CLI-style providers, keyed by provider id
    pub providers: HashMap<ProviderId, ProviderCommand>,
    /// Try the stream transport before the process transport
    pub prefer_stream: bool,
    /// Upper bound on waiting for a transport to acknowledge cancellation
    pub cancel_timeout_ms: u64,
    /// Default size of the trailing slice returned by log tail queries
    pub tail_bytes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            policy: PermissionPolicy::default(),
            providers: HashMap::new(),
            prefer_stream: true,
            cancel_timeout_ms: DEFAULT_CANCEL_TIMEOUT_MS,
            tail_bytes: DEFAULT_TAIL_BYTES,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new builder for `OrchestratorConfig`
    #[must_use]
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or fails validation
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the environment
    ///
    /// Reads the file named by `KODEGEN_AGENT_CONFIG` when set, then applies
    /// `KODEGEN_AGENT_DATA_DIR` on top.
    ///
    /// # Errors
    /// Returns error if the named file cannot be loaded
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_json_file(PathBuf::from(path))?,
            None => Self::default(),
        };
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Check value bounds
    ///
    /// # Errors
    /// Returns `SessionError::InvalidConfig` naming the offending field
    pub fn validate(&self) -> Result<()> {
        if self.cancel_timeout_ms == 0 {
            return Err(SessionError::invalid_config("cancel_timeout_ms must be > 0"));
        }
        if self.tail_bytes == 0 {
            return Err(SessionError::invalid_config("tail_bytes must be > 0"));
        }
        for (provider, command) in &self.providers {
            if command.program.trim().is_empty() {
                return Err(SessionError::invalid_config(format!(
                    "provider '{provider}' has an empty program"
                )));
            }
        }
        Ok(())
    }

    /// Cancellation timeout as a `Duration`
    #[must_use]
    pub const fn cancel_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.cancel_timeout_ms)
    }
}

// ============================================================================
// Builder for OrchestratorConfig
// ============================================================================

/// Builder for `OrchestratorConfig`
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// Set the data directory
    #[must_use]
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.config.policy.permission_mode = mode;
        self
    }

    /// Replace the allowed tool list
    #[must_use]
    pub fn allowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.config.policy.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Register an additional CLI-style provider
    #[must_use]
    pub fn provider(mut self, id: impl Into<ProviderId>, command: ProviderCommand) -> Self {
        self.config.providers.insert(id.into(), command);
        self
    }

    /// Whether to try the stream transport first
    #[must_use]
    pub const fn prefer_stream(mut self, prefer: bool) -> Self {
        self.config.prefer_stream = prefer;
        self
    }

    /// Set the cancellation timeout
    #[must_use]
    pub const fn cancel_timeout_ms(mut self, ms: u64) -> Self {
        self.config.cancel_timeout_ms = ms;
        self
    }

    /// Set the default tail size
    #[must_use]
    pub const fn tail_bytes(mut self, bytes: usize) -> Self {
        self.config.tail_bytes = bytes;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}

// ============================================================================
// Session Request
// ============================================================================

/// What to run for one session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Message handed to the agent
    pub message: String,
    /// Working directory of the workspace
    pub cwd: PathBuf,
    /// Conversation to forward output fragments to
    pub correlation_id: Option<CorrelationId>,
    /// Extra environment for process-backed sessions
    pub env: HashMap<String, String>,
}

impl SessionRequest {
    /// Create a request with no correlation id and no extra environment
    pub fn new(message: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            message: message.into(),
            cwd: cwd.into(),
            correlation_id: None,
            env: HashMap::new(),
        }
    }

    /// Attach a correlation id
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}
