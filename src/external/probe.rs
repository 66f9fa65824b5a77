//! Installation probe for agent CLIs
//!
//! The probe only feeds user-facing messaging (availability checks and the
//! text attached to `CliNotFound`); it never gates the session state machine.

use std::collections::HashMap;

use crate::transport::process::{CLAUDE_PROGRAM, find_cli};
use crate::types::identifiers::ProviderId;
use crate::types::options::ProviderCommand;

/// Installation/capability probe
pub trait InstallProbe: Send + Sync {
    /// Whether the provider's executable can be found
    fn is_available(&self, provider: &ProviderId) -> bool;

    /// How to install the provider's executable
    fn install_instructions(&self, provider: &ProviderId) -> String;
}

/// Install instructions for the built-in Claude provider
pub const CLAUDE_INSTALL_INSTRUCTIONS: &str = "Claude Code not found. Install with:\n\
     npm install -g @anthropic-ai/claude-code\n\
     \n\
     If already installed locally, try:\n\
     export PATH=\"$HOME/node_modules/.bin:$PATH\"";

/// Probe that searches `PATH` and common install locations
#[derive(Debug, Clone, Default)]
pub struct CliProbe {
    providers: HashMap<ProviderId, ProviderCommand>,
}

impl CliProbe {
    /// Probe covering the built-in provider plus configured ones
    #[must_use]
    pub fn new(providers: HashMap<ProviderId, ProviderCommand>) -> Self {
        Self { providers }
    }

    fn program<'a>(&'a self, provider: &'a ProviderId) -> &'a str {
        match self.providers.get(provider) {
            Some(command) => &command.program,
            None => provider.as_str(),
        }
    }
}

impl InstallProbe for CliProbe {
    fn is_available(&self, provider: &ProviderId) -> bool {
        find_cli(self.program(provider)).is_some()
    }

    fn install_instructions(&self, provider: &ProviderId) -> String {
        if let Some(hint) = self
            .providers
            .get(provider)
            .and_then(|command| command.install_hint.clone())
        {
            return hint;
        }
        let program = self.program(provider);
        if program == CLAUDE_PROGRAM {
            CLAUDE_INSTALL_INSTRUCTIONS.to_string()
        } else {
            format!("'{program}' not found. Install it and make sure it is on PATH.")
        }
    }
}
