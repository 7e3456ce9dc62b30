//! Castoff - release orchestration CLI
//!
//! The `castoff` command runs one end-to-end release for a version tag:
//! build every configured platform in parallel, and once all builds
//! succeed, publish one atomic release and notify the configured
//! secondary channels.
//!
//! ## Commands
//!
//! - `run`: execute a full release run for a tag
//! - `check-tag`: validate a tag and show the derived release identity
//! - `channels`: list the configured distribution channels
//!
//! ## Exit codes
//!
//! - 0: success (channel-only failures do not fail the run)
//! - 2: invalid tag or configuration
//! - 3: one or more builds failed; nothing was published
//! - 4: release creation failed; nothing was published
//! - 5: partial success; release exists but at least one asset is missing

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use castoff_core::{
    init_tracing, ReleaseError, ReleasePipeline, RunReport, RunStatus, TagResolver,
};
use castoff_store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};

mod config;

use config::RunConfig;

#[derive(Parser)]
#[command(name = "castoff")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Release orchestration engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a full release run for a version tag
    Run {
        /// Version tag to release (e.g. v1.2.3)
        #[arg(short, long)]
        tag: String,

        /// Path to the run configuration file
        #[arg(short, long, default_value = "castoff.json")]
        config: PathBuf,

        /// Mark this invocation as a manual re-run after a prior failure
        #[arg(long)]
        rerun: bool,

        /// Write the machine-readable run report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a tag and print the derived release identity
    CheckTag {
        /// Version tag to check
        tag: String,

        /// Path to the run configuration file
        #[arg(short, long, default_value = "castoff.json")]
        config: PathBuf,
    },

    /// List the configured distribution channels
    Channels {
        /// Path to the run configuration file
        #[arg(short, long, default_value = "castoff.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            tag,
            config,
            rerun,
            output,
        } => cmd_run(&tag, &config, rerun, output.as_deref()).await,
        Commands::CheckTag { tag, config } => cmd_check_tag(&tag, &config),
        Commands::Channels { config } => cmd_channels(&config),
    }
}

async fn cmd_run(
    tag: &str,
    config_path: &std::path::Path,
    rerun: bool,
    output: Option<&std::path::Path>,
) -> ExitCode {
    let config = match RunConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let store: Arc<dyn ArtifactStore> = match &config.artifacts_dir {
        Some(dir) => {
            // Scope the store to this run's tag.
            match FsArtifactStore::open(dir.join(tag)).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!("Failed to open artifact store: {e}");
                    return ExitCode::from(2);
                }
            }
        }
        None => Arc::new(MemoryArtifactStore::new()),
    };

    let mut resolver = TagResolver::new(&config.project_name);
    if let Some(changelog) = config.changelog() {
        resolver = resolver.with_changelog(&changelog);
    }

    let pipeline = ReleasePipeline::new(store, Arc::new(config.release_api()), config.channels(rerun));

    match pipeline.run(&resolver, tag, config.jobs()).await {
        Ok(report) => {
            if let Err(e) = emit_report(&report, output) {
                error!("{e:#}");
                return ExitCode::from(2);
            }
            match report.status {
                RunStatus::Success => ExitCode::SUCCESS,
                RunStatus::Partial => ExitCode::from(5),
                RunStatus::Failed => ExitCode::from(3),
            }
        }
        Err(ReleaseError::InvalidTag(reason)) => {
            error!("Invalid tag: {reason}");
            ExitCode::from(2)
        }
        Err(ReleaseError::Config(reason)) => {
            error!("Invalid configuration: {reason}");
            ExitCode::from(2)
        }
        Err(e @ ReleaseError::Publish { .. }) => {
            error!("{e}");
            ExitCode::from(4)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(3)
        }
    }
}

fn emit_report(report: &RunReport, output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Run report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_check_tag(tag: &str, config_path: &std::path::Path) -> ExitCode {
    let config = match RunConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let mut resolver = TagResolver::new(&config.project_name);
    if let Some(changelog) = config.changelog() {
        resolver = resolver.with_changelog(&changelog);
    }

    match resolver.resolve(tag) {
        Ok(identity) => {
            println!("tag:          {}", identity.tag);
            println!("display name: {}", identity.display_name);
            println!("notes:\n{}", identity.notes);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}

fn cmd_channels(config_path: &std::path::Path) -> ExitCode {
    let config = match RunConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    if config.channels.is_empty() {
        println!("no channels configured");
        return ExitCode::SUCCESS;
    }
    for channel in &config.channels {
        let rerun = if channel.retry_on_rerun {
            "retries on re-run"
        } else {
            "skipped on re-run"
        };
        println!("{:<16} {} ({rerun})", channel.name, channel.url);
    }
    ExitCode::SUCCESS
}
