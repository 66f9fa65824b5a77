//! Process transport: the agent CLI as a subprocess
//!
//! The child's stdout and stderr are forwarded as raw byte chunks; decoding is
//! left to the session's demultiplexer. Cancellation sends SIGTERM.

mod command;
mod config;
mod lifecycle;
mod reader;
mod transport;

// Re-export public types
pub use command::claude_args;
pub use config::{CLAUDE_PROGRAM, DANGEROUS_ENV_VARS};
pub use transport::{ProcessTransportFactory, find_cli};
