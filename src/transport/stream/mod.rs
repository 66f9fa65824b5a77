//! Stream transport: an in-process asynchronous record source
//!
//! The capability is optional. When no source is installed for a provider the
//! factory reports itself unavailable and the process transport takes over.

mod source;
mod transport;

pub use source::{RecordSource, RecordStream, SourceResolver, StaticResolver, StreamRequest};
pub use transport::StreamTransportFactory;
