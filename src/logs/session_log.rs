//! One session's append-only log file

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::identifiers::SessionKey;
use crate::types::records::TerminalMarker;

/// Preamble written once at session start
#[derive(Debug, Clone)]
pub struct LogHeader {
    /// Provider serving the session
    pub provider: String,
    /// Workspace the session runs in
    pub workspace: String,
    /// Originating message
    pub message: String,
}

impl LogHeader {
    /// Header for a key and message
    #[must_use]
    pub fn new(key: &SessionKey, message: impl Into<String>) -> Self {
        Self {
            provider: key.provider().to_string(),
            workspace: key.workspace().to_string(),
            message: message.into(),
        }
    }

    fn render(&self) -> String {
        format!(
            "Provider: {}\nWorkspace: {}\nMessage: {}\n\n",
            self.provider, self.workspace, self.message
        )
    }
}

struct LogState {
    /// `None` once finalized
    file: Option<File>,
    header_written: bool,
    at_line_start: bool,
}

/// Append-only writer for a single session lifetime
///
/// Writes after [`finalize`](Self::finalize) are silently dropped.
pub struct SessionLog {
    key: SessionKey,
    path: PathBuf,
    started_at: DateTime<Utc>,
    finalized: AtomicBool,
    state: Mutex<LogState>,
}

impl SessionLog {
    pub(super) fn new(key: SessionKey, path: PathBuf, file: File) -> Self {
        Self {
            key,
            path,
            started_at: Utc::now(),
            finalized: AtomicBool::new(false),
            state: Mutex::new(LogState {
                file: Some(file),
                header_written: false,
                at_line_start: true,
            }),
        }
    }

    /// Session key this log belongs to
    #[must_use]
    pub const fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Location of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the log was provisioned
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the terminal marker has been written
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    /// Write the preamble
    ///
    /// Only the first call writes; later calls and calls after finalization
    /// are no-ops.
    ///
    /// # Errors
    /// Returns error if the write itself fails
    pub async fn write_header(&self, header: &LogHeader) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.header_written {
            return Ok(());
        }
        let Some(file) = state.file.as_mut() else {
            return Ok(());
        };
        file.write_all(header.render().as_bytes()).await?;
        file.flush().await?;
        state.header_written = true;
        state.at_line_start = true;
        Ok(())
    }

    /// Append body text
    ///
    /// Returns `false` when the log is already finalized. I/O failures are
    /// logged and swallowed; a broken log never fails the session.
    pub async fn append(&self, text: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(file) = state.file.as_mut() else {
            return false;
        };
        if text.is_empty() {
            return true;
        }
        if let Err(e) = write_flush(file, text.as_bytes()).await {
            log::warn!("[{}] Failed to append to {}: {e}", self.key, self.path.display());
        }
        state.at_line_start = text.ends_with('\n');
        true
    }

    /// Write the terminal marker and release the file
    ///
    /// Returns `true` only for the call that actually wrote the marker.
    pub async fn finalize(&self, marker: &TerminalMarker) -> bool {
        let mut state = self.state.lock().await;
        let Some(mut file) = state.file.take() else {
            return false;
        };
        self.finalized.store(true, Ordering::SeqCst);

        let mut line = String::new();
        if !state.at_line_start {
            line.push('\n');
        }
        line.push_str(&marker.to_string());
        line.push('\n');

        if let Err(e) = write_flush(&mut file, line.as_bytes()).await {
            log::warn!(
                "[{}] Failed to write terminal marker to {}: {e}",
                self.key,
                self.path.display()
            );
        }
        if let Err(e) = file.sync_all().await {
            log::debug!("[{}] Log sync failed: {e}", self.key);
        }
        state.at_line_start = true;
        true
    }
}

async fn write_flush(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

impl std::fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLog")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("started_at", &self.started_at)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}
