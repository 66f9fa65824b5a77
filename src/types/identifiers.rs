//! Newtype wrappers for type safety
//!
//! This module contains newtype wrappers that provide type safety by wrapping
//! primitive types (like String) into distinct types, plus the composite
//! [`SessionKey`] that names a registry slot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SessionError;

// ============================================================================
// Newtype Wrappers for Type Safety
// ============================================================================

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(
    /// Agent backend identifier (e.g. `claude`)
    ProviderId
);

string_newtype!(
    /// Project workspace identifier
    WorkspaceId
);

string_newtype!(
    /// Opaque conversation identifier used to forward output fragments
    CorrelationId
);

string_newtype!(
    /// Side-effecting capability an agent may invoke (e.g. `Edit`)
    ToolName
);

/// Unique identifier of one session lifetime
///
/// Two sessions started under the same [`SessionKey`] get distinct ids, which
/// lets late events from an evicted session be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh session id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Session Key
// ============================================================================

/// Registry slot identifier: a `(provider, workspace)` pair
///
/// Renders as `provider:workspace`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    provider: ProviderId,
    workspace: WorkspaceId,
}

impl SessionKey {
    /// Create a session key
    pub fn new(provider: impl Into<ProviderId>, workspace: impl Into<WorkspaceId>) -> Self {
        Self {
            provider: provider.into(),
            workspace: workspace.into(),
        }
    }

    /// Provider half of the key
    #[must_use]
    pub const fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// Workspace half of the key
    #[must_use]
    pub const fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.workspace)
    }
}

impl FromStr for SessionKey {
    type Err = SessionError;

    /// Split at the first `:`; the workspace part may itself contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((provider, workspace)) if !provider.is_empty() && !workspace.is_empty() => {
                Ok(Self::new(provider, workspace))
            }
            _ => Err(SessionError::InvalidSessionKey(s.to_string())),
        }
    }
}
