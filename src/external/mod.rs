//! Narrow interfaces to collaborators outside the orchestrator
//!
//! - [`probe`] - installation/capability probe
//! - [`persistence`] - best-effort conversation fragment storage

pub mod persistence;
pub mod probe;

pub(crate) use persistence::FragmentForwarder;
pub use persistence::{FragmentOrigin, FragmentStore};
pub use probe::{CLAUDE_INSTALL_INSTRUCTIONS, CliProbe, InstallProbe};
