//! Fan-out/fan-in job scheduling.
//!
//! All build jobs are spawned concurrently on a [`JoinSet`] and the
//! scheduler performs a single blocking join over their completions, the
//! only synchronization point in the core. The join action (publish) runs
//! exactly once, and only when every job succeeded. A failed sibling never
//! cancels in-flight builds; partial work is harmless because nothing has
//! been published yet.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use castoff_store::{Artifact, ArtifactStore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{ReleaseError, Result};
use crate::job::BuildJob;
use crate::report::BuildResult;
use crate::runner::BuildRunner;

/// Outcome of one scheduler run.
#[derive(Debug)]
pub struct SchedulerRun<P> {
    /// Terminal result for every job, in the order the jobs were given.
    pub builds: Vec<BuildResult>,

    /// Output of the join action; `Some` iff all jobs succeeded and the
    /// action was invoked.
    pub joined: Option<P>,
}

impl<P> SchedulerRun<P> {
    /// Whether every job reached `Succeeded`.
    pub fn all_succeeded(&self) -> bool {
        self.builds.iter().all(|b| b.passed())
    }
}

/// Dependency-gated scheduler for the two-level release DAG.
pub struct JobScheduler;

impl JobScheduler {
    /// Run all jobs concurrently, wait for every terminal state, and invoke
    /// `join_action` with the full artifact set iff all jobs succeeded.
    ///
    /// The store must be scoped to this run; re-running for the same tag
    /// starts from a fresh store and assumes no latent state.
    pub async fn run<F, Fut, P>(
        jobs: Vec<BuildJob>,
        store: Arc<dyn ArtifactStore>,
        join_action: F,
    ) -> Result<SchedulerRun<P>>
    where
        F: FnOnce(Vec<Artifact>) -> Fut,
        Fut: Future<Output = Result<P>>,
    {
        let mut seen = HashSet::new();
        for job in &jobs {
            if !seen.insert(job.platform_key.clone()) {
                return Err(ReleaseError::Config(format!(
                    "duplicate platform key: {}",
                    job.platform_key
                )));
            }
        }

        info!(jobs = jobs.len(), "Starting build fan-out");

        let mut join_set = JoinSet::new();
        for (idx, mut job) in jobs.into_iter().enumerate() {
            let store = Arc::clone(&store);
            join_set.spawn(async move {
                let result = BuildRunner::execute(&mut job, store.as_ref()).await;
                (idx, job, result)
            });
        }

        // Single join barrier: every job runs to its own terminal state.
        let mut slots: Vec<Option<BuildResult>> = Vec::new();
        slots.resize_with(join_set.len(), || None);
        while let Some(joined) = join_set.join_next().await {
            let (idx, job, result) = joined
                .map_err(|e| ReleaseError::Config(format!("build task join error: {e}")))?;

            // The runner has already driven job.status to its terminal state.
            let build = match result {
                Ok(outcome) => BuildResult {
                    platform_key: job.platform_key,
                    status: job.status,
                    diagnostic: None,
                    duration_ms: Some(outcome.duration_ms),
                },
                Err(e) => {
                    warn!(platform_key = %job.platform_key, "Build failed: {e}");
                    BuildResult {
                        platform_key: job.platform_key,
                        status: job.status,
                        diagnostic: Some(e.to_string()),
                        duration_ms: None,
                    }
                }
            };
            slots[idx] = Some(build);
        }

        let builds: Vec<BuildResult> = slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    ReleaseError::Config("missing build result slot".to_string())
                })
            })
            .collect::<Result<_>>()?;

        if builds.iter().any(|b| !b.passed()) {
            let failed: Vec<&str> = builds
                .iter()
                .filter(|b| !b.passed())
                .map(|b| b.platform_key.as_str())
                .collect();
            warn!(?failed, "Join condition not met, publish will not run");
            return Ok(SchedulerRun {
                builds,
                joined: None,
            });
        }

        // Join condition satisfied: the store now holds one artifact per
        // job, and only now may the publish stage read it.
        let artifacts = store.get_all().await?;
        info!(artifacts = artifacts.len(), "All builds succeeded, releasing publish stage");

        let joined = join_action(artifacts).await?;
        Ok(SchedulerRun {
            builds,
            joined: Some(joined),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{BuildRecipe, JobStatus};
    use castoff_store::MemoryArtifactStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn shell_job(key: &str, dir: &std::path::Path, script: &str) -> BuildJob {
        let out = dir.join(format!("{key}.out"));
        let recipe = BuildRecipe::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("{script} > {}", out.display()),
            ],
            out,
        );
        BuildJob::new(key, &format!("app-{key}.bin"), "application/octet-stream", recipe)
    }

    fn ok_job(key: &str, dir: &std::path::Path) -> BuildJob {
        shell_job(key, dir, &format!("echo built-{key}"))
    }

    fn failing_job(key: &str, dir: &std::path::Path) -> BuildJob {
        shell_job(key, dir, "echo broken >&2; exit 1")
    }

    #[tokio::test]
    async fn test_all_jobs_succeed_invokes_join_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let jobs = vec![
            ok_job("linux", dir.path()),
            ok_job("macos", dir.path()),
            ok_job("deb", dir.path()),
        ];

        let invocations = AtomicUsize::new(0);
        let run = JobScheduler::run(jobs, store, |artifacts| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async move { Ok(artifacts.len()) }
        })
        .await
        .expect("scheduler run");

        assert!(run.all_succeeded());
        assert_eq!(run.joined, Some(3));
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_join_receives_artifacts_sorted_by_platform_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let jobs = vec![ok_job("macos", dir.path()), ok_job("deb", dir.path())];

        let run = JobScheduler::run(jobs, store, |artifacts| async move {
            let keys: Vec<String> = artifacts.iter().map(|a| a.platform_key.clone()).collect();
            Ok(keys)
        })
        .await
        .expect("scheduler run");

        assert_eq!(
            run.joined,
            Some(vec!["deb".to_string(), "macos".to_string()])
        );
    }

    #[tokio::test]
    async fn test_one_failure_skips_join_and_lets_siblings_finish() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let probe = Arc::clone(&store);
        let jobs = vec![
            ok_job("linux", dir.path()),
            failing_job("macos", dir.path()),
            ok_job("deb", dir.path()),
        ];

        let invocations = AtomicUsize::new(0);
        let run = JobScheduler::run(jobs, store, |_artifacts| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async move { Ok(()) }
        })
        .await
        .expect("scheduler run");

        assert!(!run.all_succeeded());
        assert!(run.joined.is_none());
        assert_eq!(invocations.load(Ordering::SeqCst), 0);

        // Siblings ran to completion and stored their artifacts.
        assert!(probe.contains("linux").await.unwrap());
        assert!(probe.contains("deb").await.unwrap());
        assert!(!probe.contains("macos").await.unwrap());

        // Results keep the original job order.
        assert_eq!(run.builds[1].platform_key, "macos");
        assert_eq!(run.builds[1].status, JobStatus::Failed);
        assert!(run.builds[1].diagnostic.as_deref().unwrap().contains("broken"));
    }

    #[tokio::test]
    async fn test_jobs_run_concurrently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let jobs = vec![
            shell_job("a", dir.path(), "sleep 0.3; echo a"),
            shell_job("b", dir.path(), "sleep 0.3; echo b"),
            shell_job("c", dir.path(), "sleep 0.3; echo c"),
        ];

        let start = Instant::now();
        let run = JobScheduler::run(jobs, store, |_| async move { Ok(()) })
            .await
            .expect("scheduler run");
        let elapsed = start.elapsed();

        assert!(run.all_succeeded());
        assert!(
            elapsed.as_millis() < 800,
            "expected parallel builds, took {}ms",
            elapsed.as_millis()
        );
    }

    #[tokio::test]
    async fn test_duplicate_platform_keys_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let jobs = vec![ok_job("linux", dir.path()), ok_job("linux", dir.path())];

        let err = JobScheduler::run(jobs, store, |_| async move { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Config(_)));
    }

    #[tokio::test]
    async fn test_join_action_error_propagates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let jobs = vec![ok_job("linux", dir.path())];

        let err = JobScheduler::run(jobs, store, |_| async move {
            Err::<(), _>(ReleaseError::Publish {
                step: crate::error::PublishStep::CreateRelease,
                reason: "down".to_string(),
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ReleaseError::Publish { .. }));
    }
}
