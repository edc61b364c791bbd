//! Configuration file loader for publish-sequencer
//!
//! This module provides configuration loading, validation, merging and
//! resolution into the settings a run actually uses.

use super::config::*;
use crate::core::error::SequenceError;
use crate::core::package::PublishOrder;
use crate::security::command_executor::is_allowed_command;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file names searched in the project directory, in order
pub const CONFIG_FILENAMES: &[&str] = &[
    ".publish-sequence.yaml",
    ".publish-sequence.yml",
    ".publish-sequence.toml",
];

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Longest `extends` chain followed before giving up
const MAX_EXTENDS_DEPTH: usize = 8;

const ENV_PACKAGES: &str = "PUBLISH_SEQUENCE_PACKAGES";
const ENV_PRE_DELAY: &str = "PUBLISH_SEQUENCE_PRE_DELAY_MS";
const ENV_POST_DELAY: &str = "PUBLISH_SEQUENCE_POST_DELAY_MS";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Directory searched for the config file; relative paths resolve against it
    pub project_path: PathBuf,

    /// Explicit config file, bypassing the search
    pub config_path: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<SequenceConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "client.program")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

type LoadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<SequenceConfig>, SequenceError>> + Send + 'a>>;

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (--config, or ./.publish-sequence.{yaml,yml,toml})
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<SequenceConfig, SequenceError> {
        let mut configs: Vec<SequenceConfig> = Vec::new();

        // 4. Default values (lowest priority)
        configs.push(SequenceConfig::default());

        // 3. Project config
        if let Some(project_config) =
            Self::load_project_config(&options.project_path, options.config_path.as_deref())
                .await?
        {
            configs.push(project_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env)? {
            configs.push(env_config);
        }

        // 1. CLI arguments (highest priority)
        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Ok(Self::expand_env_vars(merged_config, &options.env))
    }

    /// Locate the project config file, if any
    pub fn find_config_file(project_path: &Path) -> Option<PathBuf> {
        CONFIG_FILENAMES
            .iter()
            .map(|name| project_path.join(name))
            .find(|path| path.is_file())
    }

    async fn load_project_config(
        project_path: &Path,
        explicit: Option<&Path>,
    ) -> Result<Option<SequenceConfig>, SequenceError> {
        match explicit {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    project_path.join(path)
                };

                if !path.is_file() {
                    return Err(SequenceError::ConfigError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }

                Self::load_config_file(&path, 0).await
            }
            None => match Self::find_config_file(project_path) {
                Some(path) => Self::load_config_file(&path, 0).await,
                None => Ok(None),
            },
        }
    }

    /// Load configuration from a YAML or TOML file, following `extends`
    fn load_config_file(file_path: &Path, depth: usize) -> LoadFuture<'_> {
        Box::pin(async move {
            if depth > MAX_EXTENDS_DEPTH {
                return Err(SequenceError::ConfigError(format!(
                    "extends chain deeper than {} at {}",
                    MAX_EXTENDS_DEPTH,
                    file_path.display()
                )));
            }

            // Check if file exists
            if !file_path.exists() {
                return Ok(None);
            }

            debug!(path = %file_path.display(), "loading config file");

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                SequenceError::ConfigError(format!(
                    "Failed to read config file {}: {}",
                    file_path.display(),
                    e
                ))
            })?;

            let config = Self::parse_config(file_path, &content)?;

            // Handle extends if present
            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        SequenceError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                if let Some(base_config) = Self::load_config_file(&base_path, depth + 1).await? {
                    return Ok(Some(Self::merge_configs(vec![base_config, config])));
                }

                warn!(path = %base_path.display(), "extended config file not found");
            }

            Ok(Some(config))
        })
    }

    /// Parse file content by extension: `.toml` as TOML, anything else as YAML
    fn parse_config(file_path: &Path, content: &str) -> Result<SequenceConfig, SequenceError> {
        let is_toml = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(content).map_err(|e| {
                SequenceError::ConfigError(format!("Failed to parse TOML config: {}", e))
            })
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                SequenceError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })
        }
    }

    /// Load configuration from environment variables
    fn load_env_config(
        env: &HashMap<String, String>,
    ) -> Result<Option<SequenceConfig>, SequenceError> {
        let mut config = SequenceConfig::empty();
        let mut has_changes = false;

        // PUBLISH_SEQUENCE_PACKAGES -> packages
        if let Some(packages) = env.get(ENV_PACKAGES) {
            config.packages = Some(split_list(packages));
            has_changes = true;
        }

        // PUBLISH_SEQUENCE_PRE_DELAY_MS -> delays.prePublishMs
        if let Some(value) = env.get(ENV_PRE_DELAY) {
            let delays = config.delays.get_or_insert_with(DelayConfig::default);
            delays.pre_publish_ms = Some(parse_millis(ENV_PRE_DELAY, value)?);
            has_changes = true;
        }

        // PUBLISH_SEQUENCE_POST_DELAY_MS -> delays.postPublishMs
        if let Some(value) = env.get(ENV_POST_DELAY) {
            let delays = config.delays.get_or_insert_with(DelayConfig::default);
            delays.post_publish_ms = Some(parse_millis(ENV_POST_DELAY, value)?);
            has_changes = true;
        }

        Ok(if has_changes { Some(config) } else { None })
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<SequenceConfig>) -> SequenceConfig {
        let mut result = SequenceConfig::empty();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut SequenceConfig, source: SequenceConfig) {
        // Version
        if !source.version.is_empty() {
            target.version = source.version;
        }

        // Extends
        if source.extends.is_some() {
            target.extends = source.extends;
        }

        // Packages replace as a whole; the order is meaningful
        if source.packages.is_some() {
            target.packages = source.packages;
        }

        // Delays
        if let Some(source_delays) = source.delays {
            let target_delays = target.delays.get_or_insert_with(DelayConfig::default);

            if source_delays.pre_publish_ms.is_some() {
                target_delays.pre_publish_ms = source_delays.pre_publish_ms;
            }
            if source_delays.post_publish_ms.is_some() {
                target_delays.post_publish_ms = source_delays.post_publish_ms;
            }
            if source_delays.after_last.is_some() {
                target_delays.after_last = source_delays.after_last;
            }
        }

        // Client
        if let Some(source_client) = source.client {
            let target_client = target.client.get_or_insert_with(ClientConfig::default);

            if source_client.program.is_some() {
                target_client.program = source_client.program;
            }
            if source_client.args.is_some() {
                target_client.args = source_client.args;
            }
            if source_client.extra_args.is_some() {
                target_client.extra_args = source_client.extra_args;
            }
            if source_client.working_directory.is_some() {
                target_client.working_directory = source_client.working_directory;
            }
            if source_client.already_published.is_some() {
                target_client.already_published = source_client.already_published;
            }
        }
    }

    /// Expand `${VAR}` references in the client command settings
    fn expand_env_vars(
        mut config: SequenceConfig,
        env: &HashMap<String, String>,
    ) -> SequenceConfig {
        if let Some(client) = &mut config.client {
            if let Some(args) = &mut client.args {
                for arg in args.iter_mut() {
                    *arg = Self::expand_string(arg, env);
                }
            }
            if let Some(extra_args) = &mut client.extra_args {
                for arg in extra_args.iter_mut() {
                    *arg = Self::expand_string(arg, env);
                }
            }
            if let Some(dir) = &client.working_directory {
                client.working_directory = Some(Self::expand_string(dir, env));
            }
        }

        config
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left untouched.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();

        for cap in env_var_regex().captures_iter(input) {
            let var_name = &cap[1];

            match env.get(var_name) {
                Some(value) => {
                    result = result.replace(&format!("${{{}}}", var_name), value);
                }
                None => warn!(variable = var_name, "environment variable not found"),
            }
        }

        result
    }

    /// Validate configuration
    pub fn validate(config: &SequenceConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string (e.g., \"1.0\")".to_string()),
                actual: Some("empty".to_string()),
            });
        } else if config.version != SCHEMA_VERSION {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some(format!(
                    "Currently supported version is \"{}\" only",
                    SCHEMA_VERSION
                )),
            });
        }

        // 2. Validate packages
        Self::validate_packages(config.packages.as_deref(), &mut errors);

        // 3. Validate delays
        let package_count = config.packages.as_ref().map(Vec::len).unwrap_or(0);
        if let Some(delays) = &config.delays {
            Self::validate_delays(delays, package_count, &mut warnings);
        }

        // 4. Validate client
        if let Some(client) = &config.client {
            Self::validate_client(client, &mut errors);
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_packages(packages: Option<&[String]>, errors: &mut Vec<ConfigValidationError>) {
        let Some(packages) = packages else {
            errors.push(ConfigValidationError {
                field: "packages".to_string(),
                message: "packages is required".to_string(),
                expected: Some("non-empty array".to_string()),
                actual: Some("missing".to_string()),
            });
            return;
        };

        if let Err(e) = PublishOrder::from_names(packages.iter().cloned()) {
            let field = match &e {
                SequenceError::InvalidPackage { name, .. }
                | SequenceError::DuplicatePackage { name } => packages
                    .iter()
                    .position(|p| p == name)
                    .map(|i| format!("packages[{}]", i))
                    .unwrap_or_else(|| "packages".to_string()),
                _ => "packages".to_string(),
            };

            errors.push(ConfigValidationError {
                field,
                message: e.to_string(),
                expected: Some("non-empty array of distinct package names".to_string()),
                actual: Some(format!("{:?}", packages)),
            });
        }
    }

    fn validate_delays(
        delays: &DelayConfig,
        package_count: usize,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let pre = delays.pre_publish_ms.unwrap_or(DEFAULT_PRE_PUBLISH_MS);
        let post = delays.post_publish_ms.unwrap_or(DEFAULT_POST_PUBLISH_MS);

        if post == 0 && package_count > 1 {
            warnings.push(ConfigValidationWarning {
                field: "delays.postPublishMs".to_string(),
                message: "No wait between dependent publishes".to_string(),
                suggestion: Some(
                    "Later packages may fail to resolve dependencies the registry has not indexed"
                        .to_string(),
                ),
            });
        }

        if pre > post {
            warnings.push(ConfigValidationWarning {
                field: "delays.prePublishMs".to_string(),
                message: format!(
                    "Pre-publish delay ({}ms) is longer than post-publish delay ({}ms)",
                    pre, post
                ),
                suggestion: Some(
                    "The post-publish delay is the one that covers propagation".to_string(),
                ),
            });
        }
    }

    fn validate_client(client: &ClientConfig, errors: &mut Vec<ConfigValidationError>) {
        if let Some(program) = &client.program
            && !is_allowed_command(program)
        {
            errors.push(ConfigValidationError {
                field: "client.program".to_string(),
                message: format!("'{}' is not in the allowed command whitelist", program),
                expected: Some("cargo, npm, pnpm, yarn or twine".to_string()),
                actual: Some(program.clone()),
            });
        }

        match &client.args {
            Some(args) if !args.iter().any(|a| a.contains(PACKAGE_PLACEHOLDER)) => {
                errors.push(ConfigValidationError {
                    field: "client.args".to_string(),
                    message: format!("args must contain the {} placeholder", PACKAGE_PLACEHOLDER),
                    expected: Some(format!(
                        "e.g. [\"publish\", \"-p\", \"{}\"]",
                        PACKAGE_PLACEHOLDER
                    )),
                    actual: Some(format!("{:?}", args)),
                });
            }
            _ => {}
        }

        if let Some(dir) = &client.working_directory
            && dir.trim().is_empty()
        {
            errors.push(ConfigValidationError {
                field: "client.workingDirectory".to_string(),
                message: "workingDirectory must not be empty".to_string(),
                expected: Some("directory path".to_string()),
                actual: Some("empty".to_string()),
            });
        }
    }

    /// Turn a merged configuration into the settings for one run
    ///
    /// Package errors are reported with their own variants; every other
    /// validation error becomes a `ConfigError` listing all problems.
    pub fn resolve(
        config: &SequenceConfig,
        project_path: &Path,
    ) -> Result<ResolvedConfig, SequenceError> {
        let order = PublishOrder::from_names(config.packages.clone().unwrap_or_default())?;

        let validation = Self::validate(config);
        if !validation.valid {
            let messages: Vec<String> = validation
                .errors
                .iter()
                .map(|e| format!("[{}] {}", e.field, e.message))
                .collect();
            return Err(SequenceError::ConfigError(messages.join("; ")));
        }

        let delays = config.delays.clone().unwrap_or_default();
        let client = config.client.clone().unwrap_or_default();
        let defaults = ClientConfig::default_cargo();

        let working_dir = match client.working_directory.as_deref() {
            Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            Some(dir) => project_path.join(dir),
            None => project_path.to_path_buf(),
        };

        Ok(ResolvedConfig {
            order,
            pre_publish_delay: Duration::from_millis(
                delays.pre_publish_ms.unwrap_or(DEFAULT_PRE_PUBLISH_MS),
            ),
            post_publish_delay: Duration::from_millis(
                delays.post_publish_ms.unwrap_or(DEFAULT_POST_PUBLISH_MS),
            ),
            delay_after_last: delays.after_last.unwrap_or(true),
            already_published: client.already_published.unwrap_or_default(),
            client: ClientSettings {
                program: client
                    .program
                    .or(defaults.program)
                    .unwrap_or_else(|| "cargo".to_string()),
                args: client.args.or(defaults.args).unwrap_or_default(),
                extra_args: client.extra_args.unwrap_or_default(),
                working_dir,
            },
        })
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

fn env_var_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(ENV_VAR_PATTERN).expect("ENV_VAR_PATTERN is a valid regex"))
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_millis(variable: &str, value: &str) -> Result<u64, SequenceError> {
    value.trim().parse::<u64>().map_err(|_| {
        SequenceError::ConfigError(format!(
            "{} must be a whole number of milliseconds, got '{}'",
            variable, value
        ))
    })
}
