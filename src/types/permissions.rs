//! Permission policy handed to agents at launch
//!
//! Both transports carry the same policy: a permission mode and an ordered
//! allow-list of side-effecting tools.

use serde::{Deserialize, Serialize};

use super::identifiers::ToolName;

// ============================================================================
// Permission Types
// ============================================================================

/// Permission modes for tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Default mode - CLI prompts for dangerous tools
    Default,
    /// Auto-accept file edits
    #[default]
    AcceptEdits,
    /// Plan mode
    Plan,
    /// Allow all tools (use with caution)
    BypassPermissions,
}

impl PermissionMode {
    /// CLI spelling of the mode
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

/// Tools allowed unless configured otherwise, in launch order
pub const DEFAULT_ALLOWED_TOOLS: &[&str] = &["Edit", "MultiEdit", "Write", "Read"];

/// Static permission policy applied to every launched agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionPolicy {
    /// Permission mode passed to the agent
    pub permission_mode: PermissionMode,
    /// Ordered allow-list of side-effecting tools
    pub allowed_tools: Vec<ToolName>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            permission_mode: PermissionMode::default(),
            allowed_tools: DEFAULT_ALLOWED_TOOLS
                .iter()
                .copied()
                .map(ToolName::from)
                .collect(),
        }
    }
}
