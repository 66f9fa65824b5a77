//! CLI command building logic for the process transport

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::types::permissions::PermissionPolicy;

use super::config::DANGEROUS_ENV_VARS;

/// Argument vector for the Claude CLI
///
/// The shape is fixed; only the message itself is substituted.
#[must_use]
pub fn claude_args(message: &str, policy: &PermissionPolicy) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        message.to_string(),
        "--verbose".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--permission-mode".to_string(),
        policy.permission_mode.as_str().to_string(),
    ];

    for tool in &policy.allowed_tools {
        args.push("--allowedTools".to_string());
        args.push(tool.as_str().to_string());
    }

    args
}

/// Command builder for agent CLIs
pub struct CommandBuilder<'a> {
    program: &'a Path,
    args: &'a [String],
    cwd: &'a Path,
    env: &'a HashMap<String, String>,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub const fn new(
        program: &'a Path,
        args: &'a [String],
        cwd: &'a Path,
        env: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            program,
            args,
            cwd,
            env,
        }
    }

    /// Build the command with piped output and filtered environment
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.args(self.args).current_dir(self.cwd);

        for (key, value) in self.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                log::warn!("Dropping dangerous environment variable {key}");
            } else {
                cmd.env(key, value);
            }
        }
        cmd.env("PWD", self.cwd);

        // Piping stderr keeps the child away from the parent terminal
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}
