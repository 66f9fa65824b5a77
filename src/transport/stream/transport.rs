//! Stream transport factory and its driving loop

use futures::StreamExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SessionError};
use crate::transport::{
    Acquisition, LaunchSpec, LaunchedTransport, TransportCancel, TransportEvent, TransportExit,
    TransportFactory, TransportKind,
};
use crate::types::identifiers::SessionKey;

use super::source::{RecordStream, SourceResolver, StreamRequest};

/// Factory driving externally supplied record sources
pub struct StreamTransportFactory {
    resolver: Arc<dyn SourceResolver>,
}

impl StreamTransportFactory {
    /// Create a factory over a resolver
    pub fn new(resolver: Arc<dyn SourceResolver>) -> Self {
        Self { resolver }
    }
}

impl TransportFactory for StreamTransportFactory {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn acquire<'a>(&'a self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<Acquisition>> {
        Box::pin(async move {
            let Some(source) = self.resolver.resolve(spec.key.provider()) else {
                return Ok(Acquisition::Unavailable(format!(
                    "no record source installed for provider '{}'",
                    spec.key.provider()
                )));
            };

            let token = CancellationToken::new();
            let records = source
                .open(StreamRequest::from(spec), token.clone())
                .await
                .map_err(|e| SessionError::launch(format!("Failed to open record stream: {e}")))?;

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            tokio::spawn(drive(spec.key.clone(), records, token.clone(), events_tx));

            Ok(Acquisition::Launched(LaunchedTransport {
                kind: TransportKind::Stream,
                pid: None,
                events: events_rx,
                canceller: Arc::new(StreamCanceller { token }),
            }))
        })
    }
}

/// Consume records until the source ends or the token fires
async fn drive(
    key: SessionKey,
    mut records: RecordStream,
    token: CancellationToken,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let exit = loop {
        tokio::select! {
            biased;

            () = token.cancelled() => break TransportExit::Cancelled,
            next = records.next() => match next {
                Some(Ok(record)) => {
                    if events.send(TransportEvent::Record(record)).is_err() {
                        // Nobody is listening anymore
                        return;
                    }
                }
                // Sources commonly surface an abort as an error
                Some(Err(_)) if token.is_cancelled() => break TransportExit::Cancelled,
                Some(Err(e)) => break TransportExit::Failed(e.to_string()),
                None => break TransportExit::Completed(0),
            },
        }
    };

    log::debug!("[{key}] Record stream ended: {exit:?}");
    let _ = events.send(TransportEvent::Exited(exit));
}

/// Token-based cancellation of a stream transport
struct StreamCanceller {
    token: CancellationToken,
}

impl TransportCancel for StreamCanceller {
    fn cancel(&self) -> BoxFuture<'_, Result<()>> {
        self.token.cancel();
        Box::pin(async { Ok(()) })
    }
}
