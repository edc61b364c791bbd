//! Publish Sequencer CLI
//!
//! Publishes interdependent packages one at a time, in dependency order

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use publish_sequencer::{
    AlreadyPublishedPolicy, ClientConfig, CommandPublishClient, ConfigLoadOptions, ConfigLoader,
    DelayConfig, ResolvedConfig, SequenceConfig, SequenceError, SequenceOptions,
    SequentialPublisher, init_tracing, split_list,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing::Level;

/// Sequential, rate-limited package publisher
#[derive(Parser)]
#[command(name = "publish-sequencer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Publish interdependent packages one at a time, in dependency order",
    long_about = None
)]
struct Cli {
    /// Project directory (config file lookup, relative paths)
    #[arg(long, global = true, value_name = "PATH")]
    project_dir: Option<PathBuf>,

    /// Config file (defaults to .publish-sequence.{yaml,yml,toml} in the project directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish every package in order (default)
    Run {
        #[command(flatten)]
        overrides: Overrides,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the publish order, commands and delays without publishing
    Plan {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Validate the configuration
    Check {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Write a default .publish-sequence.yaml
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Settings that override the config file
#[derive(Args, Default, Clone)]
struct Overrides {
    /// Comma-separated packages in publish order
    #[arg(long)]
    packages: Option<String>,

    /// Wait before each publish, in milliseconds
    #[arg(long, value_name = "MS")]
    pre_delay_ms: Option<u64>,

    /// Wait after each publish, in milliseconds
    #[arg(long, value_name = "MS")]
    post_delay_ms: Option<u64>,

    /// Skip the wait after the last package
    #[arg(long)]
    no_delay_after_last: bool,

    /// Directory the publish command runs in
    #[arg(long, value_name = "PATH")]
    working_dir: Option<PathBuf>,

    /// Stop when a version is already published instead of skipping it
    #[arg(long)]
    fail_on_already_published: bool,
}

impl Overrides {
    /// Convert to the highest-priority config layer
    fn to_config(&self) -> SequenceConfig {
        let mut config = SequenceConfig::empty();

        if let Some(packages) = &self.packages {
            config.packages = Some(split_list(packages));
        }

        if self.pre_delay_ms.is_some() || self.post_delay_ms.is_some() || self.no_delay_after_last
        {
            config.delays = Some(DelayConfig {
                pre_publish_ms: self.pre_delay_ms,
                post_publish_ms: self.post_delay_ms,
                after_last: self.no_delay_after_last.then_some(false),
            });
        }

        if self.working_dir.is_some() || self.fail_on_already_published {
            config.client = Some(ClientConfig {
                working_directory: self
                    .working_dir
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                already_published: self
                    .fail_on_already_published
                    .then_some(AlreadyPublishedPolicy::Fail),
                ..Default::default()
            });
        }

        config
    }
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json_logs, level);

    let project_path = cli.project_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        None => run_command(&project_path, cli.config, Overrides::default(), false).await,
        Some(Commands::Run { overrides, json }) => {
            run_command(&project_path, cli.config, overrides, json).await
        }
        Some(Commands::Plan { overrides }) => {
            plan_command(&project_path, cli.config, overrides).await
        }
        Some(Commands::Check { overrides }) => {
            check_command(&project_path, cli.config, overrides).await
        }
        Some(Commands::Init { force }) => init_command(&project_path, force).await,
    }
}

async fn load_config(
    project_path: &Path,
    config_path: Option<PathBuf>,
    overrides: &Overrides,
) -> Result<SequenceConfig, SequenceError> {
    ConfigLoader::load(ConfigLoadOptions {
        project_path: project_path.to_path_buf(),
        config_path,
        cli_args: Some(overrides.to_config()),
        env: std::env::vars().collect(),
    })
    .await
}

async fn resolve_config(
    project_path: &Path,
    config_path: Option<PathBuf>,
    overrides: &Overrides,
) -> Result<ResolvedConfig, SequenceError> {
    let config = load_config(project_path, config_path, overrides).await?;
    ConfigLoader::resolve(&config, project_path)
}

fn print_error(error: &SequenceError) {
    eprintln!("\n❌ [{}] {}", error.code(), error);
    for action in error.suggested_actions() {
        eprintln!("  - {}", action);
    }
}

async fn run_command(
    project_path: &Path,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    json: bool,
) -> Result<i32> {
    let resolved = match resolve_config(project_path, config_path, &overrides).await {
        Ok(resolved) => resolved,
        Err(e) => {
            print_error(&e);
            return Ok(1);
        }
    };

    let client = CommandPublishClient::new(&resolved.client)
        .context("Failed to set up the publish command")?;

    if !json {
        println!("\n📦 publish-sequencer\n");
        println!("Order: {}", resolved.order);
        println!(
            "Delays: {}ms before, {}ms after each publish\n",
            resolved.pre_publish_delay.as_millis(),
            resolved.post_publish_delay.as_millis()
        );
    }

    let publisher = SequentialPublisher::new(client, SequenceOptions::from(&resolved));
    let report = publisher.publish_all(&resolved.order).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }

    match report.ensure_success() {
        Ok(()) => {
            if !json {
                println!("✅ All packages published in order");
            }
            Ok(0)
        }
        Err(e) => {
            print_error(&e);
            Ok(1)
        }
    }
}

async fn plan_command(
    project_path: &Path,
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<i32> {
    println!("\n🗺️  Publish Plan\n");

    let resolved = match resolve_config(project_path, config_path, &overrides).await {
        Ok(resolved) => resolved,
        Err(e) => {
            print_error(&e);
            return Ok(1);
        }
    };

    let client = CommandPublishClient::new(&resolved.client)
        .context("Failed to set up the publish command")?;

    println!("Working directory: {}\n", resolved.client.working_dir.display());
    for (i, package) in resolved.order.iter().enumerate() {
        println!("  {}. {}", i + 1, client.command_line(package));
    }

    let count = resolved.order.len() as u32;
    let post_waits = if resolved.delay_after_last {
        count
    } else {
        count - 1
    };
    let total_wait = resolved.pre_publish_delay * count + resolved.post_publish_delay * post_waits;

    println!(
        "\nWait before each publish: {}ms",
        resolved.pre_publish_delay.as_millis()
    );
    println!(
        "Wait after each publish:  {}ms{}",
        resolved.post_publish_delay.as_millis(),
        if resolved.delay_after_last {
            ""
        } else {
            " (not after the last)"
        }
    );
    println!(
        "Already published:        {}",
        match resolved.already_published {
            AlreadyPublishedPolicy::Skip => "skip",
            AlreadyPublishedPolicy::Fail => "fail",
        }
    );
    println!("Minimum total wait:       {}s\n", total_wait.as_secs());

    Ok(0)
}

async fn check_command(
    project_path: &Path,
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<i32> {
    println!("\n🔍 Configuration Check\n");

    match config_path
        .clone()
        .or_else(|| ConfigLoader::find_config_file(project_path))
    {
        Some(path) => println!("Config file: {}\n", path.display()),
        None => println!("Config file: none (using defaults)\n"),
    }

    let config = match load_config(project_path, config_path, &overrides).await {
        Ok(config) => config,
        Err(e) => {
            print_error(&e);
            return Ok(1);
        }
    };

    let result = ConfigLoader::validate(&config);
    println!("{}\n", ConfigLoader::format_validation_result(&result));

    Ok(if result.valid { 0 } else { 1 })
}

async fn init_command(project_path: &Path, force: bool) -> Result<i32> {
    println!("\n🎯 Initialize publish-sequencer\n");

    let path = project_path.join(".publish-sequence.yaml");
    if path.exists() && !force {
        eprintln!("⚠️  {} already exists", path.display());
        eprintln!("Use --force to overwrite it.\n");
        return Ok(1);
    }

    let yaml = serde_yaml::to_string(&SequenceConfig::default())
        .context("Failed to serialize default configuration")?;
    tokio::fs::write(&path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Wrote {}\n", path.display());
    Ok(0)
}
