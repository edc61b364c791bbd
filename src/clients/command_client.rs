//! Command Publish Client - publishes by running an external tool
//!
//! Runs `cargo publish -p <package>` by default, or any whitelisted tool
//! with a configured argument template.

use crate::core::config::{ClientSettings, PACKAGE_PLACEHOLDER};
use crate::core::package::PackageId;
use crate::core::traits::{PublishClient, PublishOutcome};
use crate::security::command_executor::{CommandError, SafeCommandExecutor, is_allowed_command};
use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, info};

/// crates.io rejections of a version it already has; either one is enough
const CARGO_ALREADY_PUBLISHED: &[&str] = &[
    "already exists on crates.io index",
    "is already uploaded",
];

/// npm registry rejection; both fragments must appear
const NPM_ALREADY_PUBLISHED: &[&str] = &["e403", "cannot publish over"];

/// PyPI rejection through twine; both fragments must appear
const TWINE_ALREADY_PUBLISHED: &[&str] = &["400", "file already exists"];

/// Publish client backed by a whitelisted command
#[derive(Debug, Clone)]
pub struct CommandPublishClient {
    program: String,
    args: Vec<String>,
    extra_args: Vec<String>,
    executor: SafeCommandExecutor,
}

impl CommandPublishClient {
    /// Build a client from resolved settings
    ///
    /// # Errors
    ///
    /// Fails if the program is not whitelisted or the working directory is missing.
    pub fn new(settings: &ClientSettings) -> Result<Self, CommandError> {
        if !is_allowed_command(&settings.program) {
            return Err(CommandError::CommandNotAllowed(settings.program.clone()));
        }

        let executor = SafeCommandExecutor::new(&settings.working_dir)?;

        Ok(Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            extra_args: settings.extra_args.clone(),
            executor,
        })
    }

    /// Argument list for one package
    pub fn render_args(&self, package: &PackageId) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(PACKAGE_PLACEHOLDER, package.as_str()))
            .chain(self.extra_args.iter().cloned())
            .collect()
    }

    /// Human-readable command line for one package
    pub fn command_line(&self, package: &PackageId) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.render_args(package));
        parts.join(" ")
    }
}

#[async_trait]
impl PublishClient for CommandPublishClient {
    fn name(&self) -> &str {
        &self.program
    }

    async fn publish(&self, package: &PackageId) -> anyhow::Result<PublishOutcome> {
        let args = self.render_args(package);
        info!(command = %self.command_line(package), "running publish command");

        let output = self.executor.execute(&self.program, args.as_slice()).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(%stdout, %stderr, "publish command finished");

        if output.status.success() {
            let tail = last_line(&stderr).or_else(|| last_line(&stdout));
            return Ok(PublishOutcome::Published {
                output: tail.map(str::to_string),
            });
        }

        if is_already_published(&self.program, &stderr) {
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let status = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());

        Err(anyhow!(
            "`{}` exited with status {}: {}",
            self.command_line(package),
            status,
            last_line(&stderr).unwrap_or("no error output")
        ))
    }
}

/// Whether stderr of `program` is the registry rejecting an existing version
///
/// Only each registry's own rejection wording counts. Local failures that
/// happen to mention an existing file (npm `EEXIST` in its cache, say) stay
/// failures.
pub fn is_already_published(program: &str, stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    let contains_all = |patterns: &[&str]| patterns.iter().all(|p| lower.contains(p));

    match program_name(program) {
        "cargo" => CARGO_ALREADY_PUBLISHED
            .iter()
            .any(|pattern| lower.contains(pattern)),
        "npm" | "pnpm" | "yarn" => contains_all(NPM_ALREADY_PUBLISHED),
        "twine" => contains_all(TWINE_ALREADY_PUBLISHED),
        _ => false,
    }
}

/// Bare tool name, without directory or Windows extension
fn program_name(program: &str) -> &str {
    let name = std::path::Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);
    name.strip_suffix(".cmd")
        .or_else(|| name.strip_suffix(".exe"))
        .unwrap_or(name)
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}
