//! Per-session fan-out of output to the log, subscribers and storage

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::events::EventSink;
use crate::external::FragmentForwarder;
use crate::logs::{LogStore, SessionLog};
use crate::types::identifiers::SessionKey;
use crate::types::records::TerminalMarker;

/// Prefix distinguishing error-stream lines in the log body
pub const STDERR_PREFIX: &str = "[stderr] ";

/// Where one session's output goes
///
/// Every write passes through `gate`, so an output event can never be
/// published after the terminal event: once the log is finalized, appends are
/// refused and nothing else is published.
pub(crate) struct SessionSink {
    key: SessionKey,
    log: Arc<SessionLog>,
    logs: Arc<LogStore>,
    events: Arc<dyn EventSink>,
    forwarder: Option<FragmentForwarder>,
    gate: Mutex<()>,
}

impl SessionSink {
    pub(crate) fn new(
        key: SessionKey,
        log: Arc<SessionLog>,
        logs: Arc<LogStore>,
        events: Arc<dyn EventSink>,
        forwarder: Option<FragmentForwarder>,
    ) -> Self {
        Self {
            key,
            log,
            logs,
            events,
            forwarder,
            gate: Mutex::new(()),
        }
    }

    pub(crate) fn log(&self) -> &Arc<SessionLog> {
        &self.log
    }

    /// Record one output record's text
    pub(crate) async fn output(&self, text: &str) {
        let _gate = self.gate.lock().await;
        if !self.log.append(&line(text)).await {
            return;
        }
        self.events.on_output(&self.key, text);
        if let Some(forwarder) = &self.forwarder {
            forwarder.offer(text);
        }
    }

    /// Record one line of error-stream output; the session keeps running
    pub(crate) async fn diagnostic(&self, text: &str) {
        let _gate = self.gate.lock().await;
        if !self.log.append(&line(&format!("{STDERR_PREFIX}{text}"))).await {
            return;
        }
        self.events.on_error(&self.key, text, false);
    }

    /// Write the terminal marker and publish the matching lifecycle event
    ///
    /// Returns `false` when the session already terminated; nothing is
    /// written or published in that case.
    pub(crate) async fn terminate(&self, marker: TerminalMarker) -> bool {
        let _gate = self.gate.lock().await;
        if !self.logs.finalize_log(&self.log, &marker).await {
            return false;
        }

        log::info!("[{}] Session ended: {marker}", self.key);
        match marker {
            TerminalMarker::Complete { exit_code } => {
                self.events.on_complete(&self.key, Some(exit_code));
            }
            TerminalMarker::Failed { message } => {
                self.events.on_error(&self.key, &message, true);
            }
            TerminalMarker::Cancelled => self.events.on_complete(&self.key, None),
        }
        true
    }
}

/// Log body text always ends at a line boundary
fn line(text: &str) -> std::borrow::Cow<'_, str> {
    if text.ends_with('\n') {
        text.into()
    } else {
        format!("{text}\n").into()
    }
}
