//! Agent output decoding
//!
//! - [`demux`] reassembles arbitrarily chunked bytes into lines
//! - [`parser`] turns each line into an [`OutputRecord`](crate::OutputRecord)

pub mod demux;
pub mod parser;

pub use demux::{OutputDemuxer, Records, demux_stream};
pub use parser::{classify_record, parse_line};
