//! Run configuration loaded from a JSON file.
//!
//! The config names the project, the per-platform build targets, the
//! release host, and the secondary distribution channels. The channel set
//! is configuration-driven; nothing about channel arity is hard-coded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use castoff_core::{BuildJob, BuildRecipe};
use castoff_store::{DistChannel, HttpReleaseApi, ReleaseApiConfig, WebhookChannel};
use serde::{Deserialize, Serialize};

/// One per-platform build target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Unique platform key (e.g. `linux`, `macos`, `deb`).
    pub platform_key: String,

    /// Build command (first element is the executable).
    pub command: Vec<String>,

    /// Path of the binary the command produces.
    pub output_path: PathBuf,

    /// File name the artifact is published under.
    pub file_name: String,

    /// MIME content type of the artifact.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Build timeout in seconds (0 = no timeout).
    #[serde(default)]
    pub timeout_secs: u64,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

/// One secondary distribution channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name used in reports.
    pub name: String,

    /// Webhook URL the channel is notified on.
    pub url: String,

    /// Whether to notify this channel again on a manual re-run.
    #[serde(default = "default_true")]
    pub retry_on_rerun: bool,
}

fn default_true() -> bool {
    true
}

/// Release host configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseHostConfig {
    /// API base URL.
    pub api_base: String,

    /// Repository slug (`owner/name`).
    pub repo: String,
}

/// Full run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Project name used for release display names.
    pub project_name: String,

    /// Changelog file used to derive release notes.
    #[serde(default)]
    pub changelog_path: Option<PathBuf>,

    /// Directory for the per-run filesystem artifact store. When unset,
    /// artifacts are kept in memory for the duration of the run.
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,

    /// Release host section. Token comes from `CASTOFF_TOKEN`.
    pub release_api: ReleaseHostConfig,

    /// Per-platform build targets.
    pub targets: Vec<TargetConfig>,

    /// Secondary distribution channels.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl RunConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            anyhow::bail!("config has no build targets");
        }
        let mut keys: Vec<&str> = self.targets.iter().map(|t| t.platform_key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        if keys.len() != self.targets.len() {
            anyhow::bail!("config has duplicate platform keys");
        }
        Ok(())
    }

    /// Build jobs for every configured target.
    pub fn jobs(&self) -> Vec<BuildJob> {
        self.targets
            .iter()
            .map(|target| {
                let recipe = BuildRecipe::new(target.command.clone(), &target.output_path)
                    .with_timeout(target.timeout_secs);
                BuildJob::new(
                    &target.platform_key,
                    &target.file_name,
                    &target.content_type,
                    recipe,
                )
            })
            .collect()
    }

    /// Release API client for the configured host.
    pub fn release_api(&self) -> HttpReleaseApi {
        let mut api_config =
            ReleaseApiConfig::new(&self.release_api.api_base, &self.release_api.repo);
        if let Ok(token) = std::env::var("CASTOFF_TOKEN") {
            api_config = api_config.with_token(&token);
        }
        HttpReleaseApi::new(api_config)
    }

    /// Channels to notify for this run. On a re-run, channels with
    /// `retry_on_rerun = false` are skipped.
    pub fn channels(&self, rerun: bool) -> Vec<Arc<dyn DistChannel>> {
        self.channels
            .iter()
            .filter(|c| !rerun || c.retry_on_rerun)
            .map(|c| Arc::new(WebhookChannel::new(&c.name, &c.url)) as Arc<dyn DistChannel>)
            .collect()
    }

    /// Changelog text, when configured and readable.
    pub fn changelog(&self) -> Option<String> {
        let path = self.changelog_path.as_ref()?;
        std::fs::read_to_string(path).ok()
    }
}
