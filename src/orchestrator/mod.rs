//! Agent session orchestrator
//!
//! This module is organized into logical submodules:
//! - `core`: Core struct, builder and shared helpers
//! - `start`: Eviction, transport acquisition and registration
//! - `stop`: Cancellation and shutdown
//! - `query`: Listings, log tails and availability
//! - `pump`: Per-session background output task
//! - `sink`: Per-session fan-out to log, events and storage

mod core;
mod pump;
mod query;
mod sink;
mod start;
mod stop;

pub use self::core::{SessionOrchestrator, SessionOrchestratorBuilder};
pub(crate) use sink::SessionSink;
pub use sink::STDERR_PREFIX;
