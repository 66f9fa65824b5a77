//! Type definitions for agent session orchestration
//!
//! - [`identifiers`] - Type-safe ID wrappers and the composite `SessionKey`
//! - [`records`] - Output records and terminal markers
//! - [`permissions`] - Permission mode and allowed-tool policy
//! - [`options`] - Orchestrator configuration and session requests
//! - [`session`] - Query response types

pub mod identifiers;
pub mod options;
pub mod permissions;
pub mod records;
pub mod session;

// Re-export commonly used types
pub use identifiers::{CorrelationId, ProviderId, SessionId, SessionKey, ToolName, WorkspaceId};
pub use options::{OrchestratorConfig, OrchestratorConfigBuilder, ProviderCommand, SessionRequest};
pub use permissions::{PermissionMode, PermissionPolicy};
pub use records::{OutputRecord, TerminalMarker};
pub use session::{LogTail, SessionInfo};
