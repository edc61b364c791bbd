//! Error handling for sequential publishing
//!
//! This module provides the error types with recovery guidance
//! using the thiserror crate for ergonomic error handling.

use thiserror::Error;

/// Main error type for sequencing operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    // Input errors
    #[error("No packages to publish")]
    EmptyPackageList,

    #[error("[{name}] Invalid package identifier: {reason}")]
    InvalidPackage { name: String, reason: String },

    #[error("[{name}] Package is listed more than once")]
    DuplicatePackage { name: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Publishing errors
    #[error("[{package}] Publish failed: {message}")]
    PublishFailed { package: String, message: String },

    #[error("[{package}] This version is already published")]
    AlreadyPublished { package: String },

    // Command execution errors
    #[error("[{package}] Command error: {message}")]
    CommandError { package: String, message: String },
}

impl SequenceError {
    /// Package the error refers to, if any
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::InvalidPackage { name, .. } | Self::DuplicatePackage { name } => Some(name),
            Self::PublishFailed { package, .. }
            | Self::AlreadyPublished { package }
            | Self::CommandError { package, .. } => Some(package),
            Self::EmptyPackageList | Self::ConfigError(_) => None,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::EmptyPackageList => vec![
                "Add at least one package to `packages` in the config file",
                "Or pass --packages a,b,c",
            ],
            Self::InvalidPackage { .. } => vec![
                "Use the package name exactly as the registry expects it",
                "Package names must not contain whitespace or start with '-'",
            ],
            Self::DuplicatePackage { .. } => {
                vec!["List each package once, in dependency order"]
            }
            Self::ConfigError(_) => vec![
                "Run `publish-sequencer check` to see configuration problems",
                "Regenerate a default file with `publish-sequencer init --force`",
            ],
            Self::PublishFailed { .. } => vec![
                "Check the publish command output above",
                "Packages before this one are published and stay published",
                "Fix the cause and re-run",
                "Re-runs skip already published versions only when alreadyPublished is `skip`",
            ],
            Self::AlreadyPublished { .. } => vec![
                "Bump the package version before publishing",
                "Or set client.alreadyPublished to `skip` to treat it as done",
            ],
            Self::CommandError { .. } => vec![
                "Check that the publish tool is installed and on PATH",
                "Check client.workingDirectory",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyPackageList => "EMPTY_PACKAGE_LIST",
            Self::InvalidPackage { .. } => "INVALID_PACKAGE",
            Self::DuplicatePackage { .. } => "DUPLICATE_PACKAGE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::PublishFailed { .. } => "PUBLISH_FAILED",
            Self::AlreadyPublished { .. } => "ALREADY_PUBLISHED",
            Self::CommandError { .. } => "COMMAND_ERROR",
        }
    }
}
