//! Configuration structures and types for publish-sequencer
//!
//! This module provides type-safe configuration management with serde support.
//! Every field is optional so that layers (defaults, file, env, CLI) can be
//! merged field by field; `SequenceConfig::default()` carries the built-in
//! values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Current configuration schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Packages published when nothing else is configured, in dependency order
pub const DEFAULT_PACKAGES: &[&str] = &["l1x-sys", "l1x-sdk-macros", "l1x-sdk"];

/// Wait before each publish attempt
pub const DEFAULT_PRE_PUBLISH_MS: u64 = 2_000;

/// Wait after each successful publish, for registry propagation
pub const DEFAULT_POST_PUBLISH_MS: u64 = 30_000;

/// Placeholder replaced with the package identifier in client arguments
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceConfig {
    /// Schema version (required)
    #[serde(default = "default_version")]
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Packages in publish order, earliest first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<String>>,

    /// Wait intervals around each publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delays: Option<DelayConfig>,

    /// External publish command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,
}

fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Delay configuration, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DelayConfig {
    /// Wait before each publish attempt (default: 2000)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "prePublishMs"
    )]
    pub pre_publish_ms: Option<u64>,

    /// Wait after each successful publish (default: 30000)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "postPublishMs"
    )]
    pub post_publish_ms: Option<u64>,

    /// Also wait after the last package (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "afterLast")]
    pub after_last: Option<bool>,
}

/// Publish command configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientConfig {
    /// Executable to run (default: "cargo")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// Argument template, must contain `{package}` (default: publish -p {package})
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Arguments appended after the template
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "extraArgs")]
    pub extra_args: Option<Vec<String>>,

    /// Directory the command runs in (default: current directory)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "workingDirectory"
    )]
    pub working_directory: Option<String>,

    /// What to do when the registry already has the version (default: skip)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "alreadyPublished"
    )]
    pub already_published: Option<AlreadyPublishedPolicy>,
}

/// Handling of a version the registry already has
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlreadyPublishedPolicy {
    /// Treat as success and move on without the post-publish wait
    #[default]
    Skip,
    /// Treat as a publish failure and stop
    Fail,
}

/// Default configuration values
impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            extends: None,
            packages: Some(DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect()),
            delays: Some(DelayConfig {
                pre_publish_ms: Some(DEFAULT_PRE_PUBLISH_MS),
                post_publish_ms: Some(DEFAULT_POST_PUBLISH_MS),
                after_last: Some(true),
            }),
            client: Some(ClientConfig::default_cargo()),
        }
    }
}

impl SequenceConfig {
    /// A layer with nothing set, used for env and CLI overrides
    pub fn empty() -> Self {
        Self {
            version: String::new(),
            extends: None,
            packages: None,
            delays: None,
            client: None,
        }
    }
}

impl ClientConfig {
    /// `cargo publish -p {package}` in the current directory
    pub fn default_cargo() -> Self {
        Self {
            program: Some("cargo".to_string()),
            args: Some(vec![
                "publish".to_string(),
                "-p".to_string(),
                PACKAGE_PLACEHOLDER.to_string(),
            ]),
            extra_args: None,
            working_directory: None,
            already_published: Some(AlreadyPublishedPolicy::Skip),
        }
    }
}

/// Fully resolved, validated settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub order: crate::core::package::PublishOrder,
    pub pre_publish_delay: Duration,
    pub post_publish_delay: Duration,
    pub delay_after_last: bool,
    pub already_published: AlreadyPublishedPolicy,
    pub client: ClientSettings,
}

/// Resolved publish command settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub program: String,
    pub args: Vec<String>,
    pub extra_args: Vec<String>,
    pub working_dir: PathBuf,
}
