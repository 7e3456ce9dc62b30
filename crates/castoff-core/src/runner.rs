//! Build stage execution and artifact packaging.

use std::process::Stdio;
use std::time::Instant;

use castoff_store::{Artifact, ArtifactStore};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ReleaseError, Result};
use crate::job::{BuildJob, JobStatus};

/// Result of one completed build stage.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Platform key of the job that ran.
    pub platform_key: String,

    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Runs a single platform build recipe to completion and deposits the
/// produced artifact in the store.
pub struct BuildRunner;

impl BuildRunner {
    /// Execute one build job, driving `job.status` through `Running` to a
    /// terminal state.
    ///
    /// Any abnormal termination (spawn failure, timeout, non-zero exit,
    /// missing output binary, store write failure) is surfaced as
    /// `ReleaseError::Build` for this platform. The artifact is durably
    /// stored BEFORE this returns `Ok`, so a reported success always has
    /// its artifact in place for the publish stage.
    pub async fn execute(job: &mut BuildJob, store: &dyn ArtifactStore) -> Result<BuildOutcome> {
        job.status = JobStatus::Running;
        let result = Self::run_recipe(job, store).await;
        job.status = match &result {
            Ok(_) => JobStatus::Succeeded,
            Err(_) => JobStatus::Failed,
        };
        result
    }

    async fn run_recipe(job: &BuildJob, store: &dyn ArtifactStore) -> Result<BuildOutcome> {
        let start = Instant::now();
        let key = &job.platform_key;

        if job.recipe.command.is_empty() {
            return Err(build_error(key, "empty build command"));
        }

        let exe = &job.recipe.command[0];
        let args = &job.recipe.command[1..];

        let mut command = Command::new(exe);
        command
            .args(args)
            .envs(job.recipe.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &job.recipe.cwd {
            command.current_dir(cwd);
        }

        debug!(platform_key = %key, command = %exe, "Spawning build recipe");
        let child = command
            .spawn()
            .map_err(|e| build_error(key, &format!("failed to spawn '{exe}': {e}")))?;

        let output = if job.recipe.timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(job.recipe.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                build_error(
                    key,
                    &format!("timed out after {} seconds", job.recipe.timeout_secs),
                )
            })?
            .map_err(|e| build_error(key, &e.to_string()))?
        } else {
            child
                .wait_with_output()
                .await
                .map_err(|e| build_error(key, &e.to_string()))?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        // Raw build log, for observability only.
        debug!(platform_key = %key, exit_code, "Build output:\n{stdout}{stderr}");

        if !output.status.success() {
            return Err(build_error(
                key,
                &format!("exited with code {exit_code}: {}", diagnostic_tail(&stderr)),
            ));
        }

        let payload = tokio::fs::read(&job.recipe.output_path).await.map_err(|e| {
            build_error(
                key,
                &format!(
                    "missing output {}: {e}",
                    job.recipe.output_path.display()
                ),
            )
        })?;

        let artifact = Artifact::new(
            key.clone(),
            job.file_name.clone(),
            job.content_type.clone(),
            payload,
        );
        let digest = artifact.digest.clone();
        let size = artifact.size();

        // A store failure during the build write fails this platform.
        store
            .put(artifact)
            .await
            .map_err(|e| build_error(key, &format!("artifact store write failed: {e}")))?;

        info!(
            platform_key = %key,
            digest = %digest.short(),
            size,
            duration_ms,
            "Build succeeded, artifact stored"
        );

        Ok(BuildOutcome {
            platform_key: key.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

fn build_error(platform_key: &str, diagnostic: &str) -> ReleaseError {
    ReleaseError::Build {
        platform_key: platform_key.to_string(),
        diagnostic: diagnostic.to_string(),
    }
}

/// Last few lines of stderr, enough to identify the failure.
fn diagnostic_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::BuildRecipe;
    use castoff_store::MemoryArtifactStore;

    fn copy_job(key: &str, src: &std::path::Path) -> BuildJob {
        // "Build" by copying a fixture file to the expected output path.
        let out = src.with_extension("built");
        let recipe = BuildRecipe::new(
            vec![
                "cp".to_string(),
                src.to_string_lossy().to_string(),
                out.to_string_lossy().to_string(),
            ],
            out,
        );
        BuildJob::new(key, &format!("app-{key}.bin"), "application/octet-stream", recipe)
    }

    #[tokio::test]
    async fn test_execute_stores_artifact_on_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("binary");
        tokio::fs::write(&src, b"compiled bytes").await.unwrap();

        let store = MemoryArtifactStore::new();
        let mut job = copy_job("linux", &src);

        let outcome = BuildRunner::execute(&mut job, &store).await.expect("execute");
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(job.status, JobStatus::Succeeded);

        let artifact = store.get("linux").await.expect("stored");
        assert_eq!(artifact.payload, b"compiled bytes");
        assert_eq!(artifact.file_name, "app-linux.bin");
    }

    #[tokio::test]
    async fn test_execute_failing_command_is_build_error() {
        let store = MemoryArtifactStore::new();
        let mut job = BuildJob::new(
            "linux",
            "app.bin",
            "application/octet-stream",
            BuildRecipe::new(vec!["false".to_string()], "/nonexistent"),
        );

        let err = BuildRunner::execute(&mut job, &store).await.unwrap_err();
        assert!(matches!(err, ReleaseError::Build { .. }));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(!store.contains("linux").await.unwrap());
    }

    #[tokio::test]
    async fn test_execute_missing_output_is_build_error() {
        let store = MemoryArtifactStore::new();
        let mut job = BuildJob::new(
            "linux",
            "app.bin",
            "application/octet-stream",
            BuildRecipe::new(vec!["true".to_string()], "/nonexistent/output"),
        );

        let err = BuildRunner::execute(&mut job, &store).await.unwrap_err();
        match err {
            ReleaseError::Build { diagnostic, .. } => {
                assert!(diagnostic.contains("missing output"));
            }
            other => panic!("expected Build error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_empty_command_is_build_error() {
        let store = MemoryArtifactStore::new();
        let mut job = BuildJob::new(
            "linux",
            "app.bin",
            "application/octet-stream",
            BuildRecipe::new(vec![], "/out"),
        );

        let err = BuildRunner::execute(&mut job, &store).await.unwrap_err();
        assert!(matches!(err, ReleaseError::Build { .. }));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_execute_timeout_is_build_error() {
        let store = MemoryArtifactStore::new();
        let mut job = BuildJob::new(
            "linux",
            "app.bin",
            "application/octet-stream",
            BuildRecipe::new(vec!["sleep".to_string(), "5".to_string()], "/out")
                .with_timeout(1),
        );

        let err = BuildRunner::execute(&mut job, &store).await.unwrap_err();
        match err {
            ReleaseError::Build { diagnostic, .. } => assert!(diagnostic.contains("timed out")),
            other => panic!("expected Build error, got {other:?}"),
        }
    }

    #[test]
    fn test_diagnostic_tail_keeps_last_lines() {
        let stderr = (1..=10).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let tail = diagnostic_tail(&stderr);
        assert!(tail.contains("line 10"));
        assert!(!tail.contains("line 1\n"));
    }
}
