//! Background task moving transport output into a session's sink
//!
//! One pump per session. It owns the session's demultiplexer, so buffered
//! bytes never leak between sessions, and it is the only place a transport's
//! natural end is turned into a terminal marker.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::{OutputDemuxer, classify_record};
use crate::registry::SessionRegistry;
use crate::transport::{TransportEvent, TransportExit};
use crate::types::identifiers::{SessionId, SessionKey};
use crate::types::records::TerminalMarker;

use super::sink::SessionSink;

pub(super) struct PumpContext {
    pub key: SessionKey,
    pub session_id: SessionId,
    pub sink: Arc<SessionSink>,
    pub registry: Arc<SessionRegistry>,
}

pub(super) fn spawn_pump(
    ctx: PumpContext,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut demuxer = OutputDemuxer::new();
        let mut diagnostics = DiagnosticLines::default();

        let exit = loop {
            match events.recv().await {
                Some(TransportEvent::Stdout(chunk)) => {
                    for record in demuxer.push(&chunk) {
                        ctx.sink.output(record.text()).await;
                    }
                }
                Some(TransportEvent::Stderr(chunk)) => {
                    for line in diagnostics.push(&chunk) {
                        ctx.sink.diagnostic(&line).await;
                    }
                }
                Some(TransportEvent::Record(value)) => {
                    if let Some(record) = classify_record(&value) {
                        ctx.sink.output(record.text()).await;
                    }
                }
                Some(TransportEvent::Exited(exit)) => break exit,
                None => {
                    break TransportExit::Failed("transport closed without an exit status".into());
                }
            }
        };

        if let Some(record) = demuxer.finish() {
            ctx.sink.output(record.text()).await;
        }
        if let Some(line) = diagnostics.finish() {
            ctx.sink.diagnostic(&line).await;
        }

        // Deregister before the marker so observers of the terminal event
        // never find a stale entry
        ctx.registry.remove_if(&ctx.key, ctx.session_id);

        let marker = match exit {
            TransportExit::Completed(exit_code) => TerminalMarker::Complete { exit_code },
            TransportExit::Failed(message) => TerminalMarker::Failed { message },
            TransportExit::Cancelled => TerminalMarker::Cancelled,
        };
        if !ctx.sink.terminate(marker).await {
            log::debug!("[{}] Session {} already terminated", ctx.key, ctx.session_id);
        }
    })
}

/// Line splitter for the error stream
///
/// Diagnostics are plain text: no record parsing, terminators stripped.
#[derive(Debug, Default)]
struct DiagnosticLines {
    pending: Vec<u8>,
}

impl DiagnosticLines {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(text) = diagnostic_text(&line) {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        diagnostic_text(&rest)
    }
}

fn diagnostic_text(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    (!text.trim().is_empty()).then(|| text.to_string())
}
