//! Incremental demultiplexer from raw byte chunks to output records
//!
//! Transports hand over stdout exactly as the OS delivers it, so a single
//! JSON record may arrive split across any number of chunks (even inside a
//! multi-byte UTF-8 sequence). Bytes are buffered until a `\n` completes a
//! line; only complete lines are decoded.

use futures::{Stream, StreamExt};

use super::parser::parse_line;
use crate::types::records::OutputRecord;

/// Per-session line reassembler
///
/// One instance per session: buffered state from one session must never leak
/// into another.
#[derive(Debug, Default)]
pub struct OutputDemuxer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no terminator
    scanned: usize,
}

impl OutputDemuxer {
    /// Create an empty demultiplexer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a chunk and iterate the records it completes
    ///
    /// The iterator is lazy: lines are extracted as it is advanced, and any
    /// lines left unread stay buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Records<'_> {
        self.pending.extend_from_slice(chunk);
        Records { demuxer: self }
    }

    /// Flush a trailing line that never received its terminator
    ///
    /// Call once the byte source is exhausted.
    pub fn finish(&mut self) -> Option<OutputRecord> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        parse_line(&String::from_utf8_lossy(&rest))
    }

    /// Number of bytes waiting for a line terminator
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn next_line(&mut self) -> Option<String> {
        let offset = self.pending[self.scanned..]
            .iter()
            .position(|&b| b == b'\n');

        let Some(offset) = offset else {
            self.scanned = self.pending.len();
            return None;
        };

        let end = self.scanned + offset;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        self.scanned = 0;
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Lazy iterator over the records completed by buffered bytes
pub struct Records<'a> {
    demuxer: &'a mut OutputDemuxer,
}

impl Iterator for Records<'_> {
    type Item = OutputRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.demuxer.next_line()?;
            if let Some(record) = parse_line(&line) {
                return Some(record);
            }
        }
    }
}

/// Adapt a stream of byte chunks into a stream of output records
///
/// A trailing unterminated line is flushed when the chunk stream ends.
pub fn demux_stream<S, B>(chunks: S) -> impl Stream<Item = OutputRecord>
where
    S: Stream<Item = B>,
    B: AsRef<[u8]>,
{
    async_stream::stream! {
        let mut demuxer = OutputDemuxer::new();
        let mut chunks = std::pin::pin!(chunks);
        while let Some(chunk) = chunks.next().await {
            for record in demuxer.push(chunk.as_ref()) {
                yield record;
            }
        }
        if let Some(record) = demuxer.finish() {
            yield record;
        }
    }
}
