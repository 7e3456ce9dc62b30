//! Build job definitions and configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a build job.
///
/// Mutated only by the job's own runner; `Succeeded` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Opaque build command for one target platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildRecipe {
    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Extra environment variables for the build.
    #[serde(default)]
    pub env: Vec<(String, String)>,

    /// Working directory (current directory if unset).
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Path of the binary the recipe produces.
    pub output_path: PathBuf,

    /// Timeout in seconds (0 = no timeout).
    #[serde(default)]
    pub timeout_secs: u64,
}

impl BuildRecipe {
    /// Create a recipe from a command and its expected output path.
    pub fn new(command: Vec<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            command,
            env: Vec::new(),
            cwd: None,
            output_path: output_path.into(),
            timeout_secs: 0,
        }
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// One platform-specific build to run within a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildJob {
    /// Unique platform key within the run (e.g. `linux`, `macos`, `deb`).
    pub platform_key: String,

    /// File name the produced artifact is published under.
    pub file_name: String,

    /// MIME content type of the produced artifact.
    pub content_type: String,

    /// The build command and its expected output.
    pub recipe: BuildRecipe,

    /// Current lifecycle state.
    pub status: JobStatus,
}

impl BuildJob {
    /// Create a pending build job.
    pub fn new(
        platform_key: &str,
        file_name: &str,
        content_type: &str,
        recipe: BuildRecipe,
    ) -> Self {
        Self {
            platform_key: platform_key.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            recipe,
            status: JobStatus::Pending,
        }
    }
}
