//! Configuration constants for the process transport

use std::time::Duration;

/// Executable of the built-in Claude provider
pub const CLAUDE_PROGRAM: &str = "claude";

/// Read buffer size for stdout/stderr pumps
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long to wait for pipes to drain after the process exits
///
/// Grandchildren that inherited the pipes can keep them open forever.
pub const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Dangerous environment variables that should not be passed to subprocess
///
/// These variables can affect how the subprocess loads and executes code,
/// potentially creating security vulnerabilities.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];
