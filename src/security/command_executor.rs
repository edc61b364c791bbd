//! SafeCommandExecutor: whitelist-validated execution of publish tools
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved publish tools can execute
//! - **Injection prevention**: Uses `tokio::process::Command`, never a shell
//! - **Argument sanitization**: Arguments passed as Vec, never interpolated into shell strings
//! - **Working directory validation**: Validates existence before execution
//!
//! No timeout is applied: a publish runs until the tool exits.
//!
//! # Example
//!
//! ```rust,no_run
//! use publish_sequencer::SafeCommandExecutor;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//!
//! let output = executor.execute("cargo", &["--version"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Allowed commands whitelist for security.
///
/// Only these publish tools can be executed via SafeCommandExecutor.
const ALLOWED_COMMANDS: &[&str] = &["cargo", "npm", "pnpm", "yarn", "twine"];

/// Whether `command` may be run by the executor
pub fn is_allowed_command(command: &str) -> bool {
    ALLOWED_COMMANDS.contains(&command)
}

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command could not be started (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self { working_dir })
    }

    /// Execute a command with whitelist validation and capture its output.
    ///
    /// A non-zero exit status is not an error here; callers inspect
    /// `Output::status` themselves.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    pub async fn execute<S: AsRef<str>>(
        &self,
        command: &str,
        args: &[S],
    ) -> Result<Output, CommandError> {
        if !is_allowed_command(command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        // Windows-specific: npm, yarn, etc. are .cmd files, not .exe
        #[cfg(target_os = "windows")]
        let command_name = if matches!(command, "npm" | "yarn" | "pnpm") {
            format!("{}.cmd", command)
        } else {
            command.to_string()
        };

        #[cfg(not(target_os = "windows"))]
        let command_name = command.to_string();

        debug!(
            command = %command_name,
            args = ?args.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            dir = %self.working_dir.display(),
            "executing command"
        );

        let output = Command::new(&command_name)
            .args(args.iter().map(AsRef::as_ref))
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist() {
        assert!(is_allowed_command("cargo"));
        assert!(is_allowed_command("npm"));
        assert!(!is_allowed_command("sh"));
        assert!(!is_allowed_command("rm"));
    }

    #[tokio::test]
    async fn test_allowed_command_cargo() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let output = executor.execute("cargo", &["--version"]).await.unwrap();

        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).starts_with("cargo"));
    }

    #[tokio::test]
    async fn test_rejected_command_rm() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let result = executor.execute("rm", &["-rf", "/"]).await;
        assert!(
            matches!(result, Err(CommandError::CommandNotAllowed(_))),
            "rm should be rejected as not in whitelist"
        );
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        // Passed to cargo as one literal argument; cargo rejects it
        let output = executor
            .execute("cargo", &["publish; echo injected"])
            .await
            .unwrap();

        assert!(!output.status.success());
        assert!(!String::from_utf8_lossy(&output.stdout).contains("injected"));
    }

    #[test]
    fn test_invalid_working_directory() {
        let result = SafeCommandExecutor::new("/nonexistent/directory/that/does/not/exist");
        assert!(
            matches!(result, Err(CommandError::InvalidWorkingDirectory(_))),
            "Should reject non-existent working directory"
        );
    }
}
