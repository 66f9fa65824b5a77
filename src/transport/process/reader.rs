//! Output pumps and exit supervision for the process transport

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::transport::{TransportEvent, TransportExit};
use crate::types::identifiers::SessionKey;

use super::config::{PIPE_DRAIN_TIMEOUT, READ_CHUNK_SIZE};

/// Cancellation request: the supervisor replies with the signal result
pub(super) type CancelRequest = oneshot::Sender<std::io::Result<()>>;

/// Spawn the task that owns the child process
///
/// Stdout and stderr are pumped as raw chunks. Once the child exits and both
/// pipes have drained, a single `Exited` event closes the channel.
pub(super) fn spawn_supervisor(
    key: SessionKey,
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut cancel_rx: mpsc::UnboundedReceiver<CancelRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let stdout_task = tokio::spawn(pump(stdout, events.clone(), TransportEvent::Stdout));
        let stderr_task = tokio::spawn(pump(stderr, events.clone(), TransportEvent::Stderr));

        let mut cancel_requested = false;
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                Some(reply) = cancel_rx.recv() => {
                    cancel_requested = true;
                    let result = terminate(&mut child);
                    if let Err(ref e) = result {
                        log::warn!("[{key}] Failed to signal agent process: {e}");
                    }
                    let _ = reply.send(result);
                }
            }
        };

        drain(stdout_task).await;
        drain(stderr_task).await;

        let exit = match status {
            _ if cancel_requested => TransportExit::Cancelled,
            Ok(status) => match status.code() {
                Some(code) => TransportExit::Completed(code),
                None => TransportExit::Failed(format!("Agent process terminated: {status}")),
            },
            Err(e) => TransportExit::Failed(format!("Failed to wait for agent process: {e}")),
        };
        log::debug!("[{key}] Agent process exited: {exit:?}");
        let _ = events.send(TransportEvent::Exited(exit));
    })
}

/// Forward raw chunks from a pipe until EOF
async fn pump<R>(
    mut reader: R,
    events: mpsc::UnboundedSender<TransportEvent>,
    wrap: fn(Vec<u8>) -> TransportEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                if events.send(wrap(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) => {
                let message = format!("Failed to read agent output: {e}\n");
                let _ = events.send(TransportEvent::Stderr(message.into_bytes()));
                break;
            }
        }
    }
}

async fn drain(mut task: JoinHandle<()>) {
    if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut task)
        .await
        .is_err()
    {
        task.abort();
    }
}

/// Send SIGTERM; a process that is already gone counts as terminated
#[cfg(unix)]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // `None` once the child has been reaped
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(std::io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    match child.start_kill() {
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}
