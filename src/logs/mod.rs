//! Durable per-session logs
//!
//! Layout: `<data_dir>/agent/<provider>/<workspace>/stream.log`. Each file
//! holds a header block, an append-only body and exactly one terminal marker
//! line. The store caches one open [`SessionLog`] per key; finalizing a log
//! evicts it from the cache, so later appends for that key become no-ops
//! until the next session provisions a fresh file.

mod session_log;

pub use session_log::{LogHeader, SessionLog};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::Result;
use crate::types::identifiers::SessionKey;
use crate::types::records::TerminalMarker;

/// File name of every session log
pub const LOG_FILE_NAME: &str = "stream.log";

/// Cache of open session logs keyed by [`SessionKey`]
pub struct LogStore {
    root: PathBuf,
    open: Mutex<HashMap<SessionKey, Arc<SessionLog>>>,
    /// Serializes provisioning so two racing `ensure` calls never both truncate
    provisioning: tokio::sync::Mutex<()>,
}

impl LogStore {
    /// Create a store rooted at the application data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
            open: Mutex::new(HashMap::new()),
            provisioning: tokio::sync::Mutex::new(()),
        }
    }

    /// Root data directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic log location for a key
    #[must_use]
    pub fn log_path(&self, key: &SessionKey) -> PathBuf {
        self.root
            .join("agent")
            .join(path_component(key.provider().as_str()))
            .join(path_component(key.workspace().as_str()))
            .join(LOG_FILE_NAME)
    }

    /// Provision the log for a key, creating directories and the file once
    ///
    /// A key that is already provisioned returns the open log untouched. A
    /// fresh provision replaces any file left by an earlier session.
    ///
    /// # Errors
    /// Returns error if the directory or file cannot be created
    pub async fn ensure(&self, key: &SessionKey) -> Result<Arc<SessionLog>> {
        if let Some(log) = self.get(key) {
            return Ok(log);
        }

        let _guard = self.provisioning.lock().await;
        if let Some(log) = self.get(key) {
            return Ok(log);
        }

        let path = self.log_path(key);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // Unlink first so a straggling writer from an earlier session keeps
        // writing to its own inode
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;

        log::debug!("[{key}] Provisioned session log at {}", path.display());
        let log = Arc::new(SessionLog::new(key.clone(), path, file));
        self.open.lock().insert(key.clone(), Arc::clone(&log));
        Ok(log)
    }

    /// Open log for a key, if provisioned and not yet finalized
    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<Arc<SessionLog>> {
        self.open.lock().get(key).cloned()
    }

    /// Whether a key currently has an open log
    #[must_use]
    pub fn is_provisioned(&self, key: &SessionKey) -> bool {
        self.open.lock().contains_key(key)
    }

    /// Drop the cached log for a key without finalizing it
    ///
    /// The holder of the returned handle may still finalize it; the next
    /// `ensure` provisions a fresh file either way.
    pub fn release(&self, key: &SessionKey) -> Option<Arc<SessionLog>> {
        self.open.lock().remove(key)
    }

    /// Write the preamble for a provisioned key
    ///
    /// # Errors
    /// Returns error if the write fails; an unprovisioned key is a no-op
    pub async fn write_header(&self, key: &SessionKey, header: &LogHeader) -> Result<()> {
        match self.get(key) {
            Some(log) => log.write_header(header).await,
            None => Ok(()),
        }
    }

    /// Append body text
    ///
    /// Silently ignored for unprovisioned or finalized keys; never provisions.
    pub async fn append(&self, key: &SessionKey, text: &str) -> bool {
        match self.get(key) {
            Some(log) => log.append(text).await,
            None => false,
        }
    }

    /// Write the terminal marker for a key and release its log
    pub async fn finalize(&self, key: &SessionKey, marker: &TerminalMarker) -> bool {
        let log = self.open.lock().remove(key);
        match log {
            Some(log) => log.finalize(marker).await,
            None => false,
        }
    }

    /// Write the terminal marker through a specific log handle
    ///
    /// The cache entry is only released when it still refers to this handle;
    /// a newer session's log under the same key is left alone.
    pub async fn finalize_log(&self, log: &Arc<SessionLog>, marker: &TerminalMarker) -> bool {
        {
            let mut open = self.open.lock();
            if open
                .get(log.key())
                .is_some_and(|current| Arc::ptr_eq(current, log))
            {
                open.remove(log.key());
            }
        }
        log.finalize(marker).await
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("root", &self.root)
            .field("open", &self.open.lock().len())
            .finish()
    }
}

/// Read at most `max_bytes` from the end of a log file
///
/// The slice never starts inside a UTF-8 sequence.
///
/// # Errors
/// Returns error if the file cannot be opened or read
pub async fn read_tail(path: &Path, max_bytes: usize) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = len.saturating_sub(max_bytes as u64);
    file.seek(SeekFrom::Start(start)).await?;

    let mut bytes = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut bytes).await?;

    let skip = if start > 0 {
        bytes
            .iter()
            .take_while(|&&b| (b & 0b1100_0000) == 0b1000_0000)
            .count()
    } else {
        0
    };
    Ok(String::from_utf8_lossy(&bytes[skip..]).into_owned())
}

/// Make an identifier safe to use as a single path component
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => cleaned.replace('.', "_").chars().chain(['_']).collect(),
        _ => cleaned,
    }
}
