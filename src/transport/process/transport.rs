//! Process transport factory and cancellation handle

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, SessionError};
use crate::external::InstallProbe;
use crate::transport::{
    Acquisition, LaunchSpec, TransportCancel, TransportFactory, TransportKind,
};
use crate::types::identifiers::ProviderId;
use crate::types::options::ProviderCommand;

use super::command::claude_args;
use super::config::CLAUDE_PROGRAM;
use super::lifecycle::launch;
use super::reader::CancelRequest;

/// Find an agent CLI binary
///
/// Paths are checked directly; bare names go through `PATH`, and for the
/// Claude CLI a handful of common install locations as well.
#[must_use]
pub fn find_cli(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    if let Ok(path) = which::which(program) {
        return Some(path);
    }

    if program != CLAUDE_PROGRAM {
        return None;
    }

    // Manual search in common locations
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
    [
        home.join(".npm-global/bin/claude"),
        PathBuf::from("/usr/local/bin/claude"),
        home.join(".local/bin/claude"),
        home.join("node_modules/.bin/claude"),
        home.join(".yarn/bin/claude"),
    ]
    .into_iter()
    .find(|path| path.is_file())
}

/// Factory spawning CLI-style providers as subprocesses
///
/// `claude` is built in; further providers come from configuration.
pub struct ProcessTransportFactory {
    providers: HashMap<ProviderId, ProviderCommand>,
    program_paths: HashMap<ProviderId, PathBuf>,
    probe: Arc<dyn InstallProbe>,
}

impl ProcessTransportFactory {
    /// Create a factory for the built-in and configured providers
    pub fn new(
        providers: HashMap<ProviderId, ProviderCommand>,
        probe: Arc<dyn InstallProbe>,
    ) -> Self {
        Self {
            providers,
            program_paths: HashMap::new(),
            probe,
        }
    }

    /// Pin a provider to an explicit executable, skipping discovery
    #[must_use]
    pub fn with_program_path(mut self, provider: impl Into<ProviderId>, path: impl Into<PathBuf>) -> Self {
        self.program_paths.insert(provider.into(), path.into());
        self
    }

    /// Program and argument vector for a launch, if the provider is known
    #[must_use]
    pub fn command_line(&self, spec: &LaunchSpec) -> Option<(String, Vec<String>)> {
        let provider = spec.key.provider();
        if let Some(command) = self.providers.get(provider) {
            return Some((command.program.clone(), command.render_args(&spec.message)));
        }
        (provider.as_str() == CLAUDE_PROGRAM).then(|| {
            (
                CLAUDE_PROGRAM.to_string(),
                claude_args(&spec.message, &spec.policy),
            )
        })
    }

    fn resolve_program(&self, provider: &ProviderId, program: &str) -> Result<PathBuf> {
        if let Some(path) = self.program_paths.get(provider) {
            return Ok(path.clone());
        }
        find_cli(program)
            .ok_or_else(|| SessionError::cli_not_found(self.probe.install_instructions(provider)))
    }
}

impl TransportFactory for ProcessTransportFactory {
    fn kind(&self) -> TransportKind {
        TransportKind::Process
    }

    fn acquire<'a>(&'a self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<Acquisition>> {
        Box::pin(async move {
            let Some((program, args)) = self.command_line(spec) else {
                return Ok(Acquisition::Unavailable(format!(
                    "no CLI command configured for provider '{}'",
                    spec.key.provider()
                )));
            };
            let path = self.resolve_program(spec.key.provider(), &program)?;
            launch(&path, &args, spec).map(Acquisition::Launched)
        })
    }
}

/// Signal-based cancellation of a supervised process
pub(super) struct ProcessCanceller {
    tx: mpsc::UnboundedSender<CancelRequest>,
}

impl ProcessCanceller {
    pub(super) const fn new(tx: mpsc::UnboundedSender<CancelRequest>) -> Self {
        Self { tx }
    }
}

impl TransportCancel for ProcessCanceller {
    fn cancel(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            // A finished supervisor means the process is already gone
            if self.tx.send(reply_tx).is_err() {
                return Ok(());
            }
            match reply_rx.await {
                Ok(Ok(())) | Err(_) => Ok(()),
                Ok(Err(e)) => Err(SessionError::cancel(format!(
                    "Failed to signal agent process: {e}"
                ))),
            }
        })
    }
}
