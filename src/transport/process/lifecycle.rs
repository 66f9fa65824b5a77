//! Process launch for the process transport

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Result, SessionError};
use crate::transport::{LaunchSpec, LaunchedTransport, TransportKind};

use super::command::CommandBuilder;
use super::reader::spawn_supervisor;
use super::transport::ProcessCanceller;

/// Spawn the agent CLI and start supervising it
///
/// Every failure here happens before the session is registered and is
/// returned to the caller.
///
/// # Errors
/// Returns `SessionError::Launch` if the working directory is missing, the
/// process cannot be spawned, or its pipes cannot be obtained
pub(super) fn launch(program: &Path, args: &[String], spec: &LaunchSpec) -> Result<LaunchedTransport> {
    if !spec.cwd.is_dir() {
        return Err(SessionError::launch(format!(
            "Working directory does not exist: {}",
            spec.cwd.display()
        )));
    }

    let mut cmd = CommandBuilder::new(program, args, &spec.cwd, &spec.env).build();
    let mut child = cmd.spawn().map_err(|e| {
        SessionError::launch(format!("Failed to start {}: {e}", program.display()))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SessionError::launch("Failed to get stdout handle"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SessionError::launch("Failed to get stderr handle"))?;

    let pid = child.id();
    log::info!(
        "[{}] Spawned {} (pid {})",
        spec.key,
        program.display(),
        pid.map_or_else(|| "?".to_string(), |p| p.to_string())
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
    spawn_supervisor(spec.key.clone(), child, stdout, stderr, events_tx, cancel_rx);

    Ok(LaunchedTransport {
        kind: TransportKind::Process,
        pid,
        events: events_rx,
        canceller: Arc::new(ProcessCanceller::new(cancel_tx)),
    })
}
