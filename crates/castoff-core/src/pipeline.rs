//! End-to-end release pipeline orchestration.
//!
//! Wires the stages together for one run: resolve the tag, fan out the
//! build jobs, and publish on the join. Produces a [`RunReport`] with one
//! overall status plus the per-stage breakdown.

use std::sync::Arc;
use std::time::Instant;

use castoff_store::{ArtifactStore, DistChannel, ReleaseApi};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::identity::TagResolver;
use crate::job::BuildJob;
use crate::publisher::ReleasePublisher;
use crate::report::{RunReport, RunStatus};
use crate::scheduler::JobScheduler;

/// One run of the release pipeline for a single version tag.
pub struct ReleasePipeline {
    store: Arc<dyn ArtifactStore>,
    api: Arc<dyn ReleaseApi>,
    channels: Vec<Arc<dyn DistChannel>>,
}

impl ReleasePipeline {
    /// Assemble a pipeline over a run-scoped store and the configured
    /// release host and channels.
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        api: Arc<dyn ReleaseApi>,
        channels: Vec<Arc<dyn DistChannel>>,
    ) -> Self {
        Self {
            store,
            api,
            channels,
        }
    }

    /// Execute one run.
    ///
    /// Returns `Err` for an invalid tag, a config error, or a terminal
    /// publish failure (release creation). Build failures produce an
    /// `Ok` report with `RunStatus::Failed` and no publish record.
    pub async fn run(&self, resolver: &TagResolver, raw_tag: &str, jobs: Vec<BuildJob>) -> Result<RunReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let identity = resolver.resolve(raw_tag)?;
        info!(run_id = %run_id, tag = %identity.tag, jobs = jobs.len(), "Starting release run");

        let publisher = ReleasePublisher::new(Arc::clone(&self.api), self.channels.clone());
        let identity_for_publish = identity.clone();

        let run = JobScheduler::run(jobs, Arc::clone(&self.store), |artifacts| async move {
            publisher.publish(&identity_for_publish, &artifacts).await
        })
        .await?;

        let status = RunReport::derive_status(&run.builds, run.joined.as_ref());
        let duration_ms = start.elapsed().as_millis() as u64;

        match status {
            RunStatus::Success => info!(run_id = %run_id, "Release run succeeded"),
            RunStatus::Partial => info!(run_id = %run_id, "Release run partially succeeded"),
            RunStatus::Failed => info!(run_id = %run_id, "Release run failed"),
        }

        Ok(RunReport {
            run_id,
            tag: identity.tag,
            status,
            builds: run.builds,
            publish: run.joined,
            duration_ms,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;
    use crate::job::BuildRecipe;
    use castoff_store::fakes::MemoryReleaseApi;
    use castoff_store::MemoryArtifactStore;

    fn echo_job(key: &str, dir: &std::path::Path) -> BuildJob {
        let out = dir.join(format!("{key}.out"));
        let recipe = BuildRecipe::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("echo {key} > {}", out.display()),
            ],
            out,
        );
        BuildJob::new(key, &format!("app-{key}.bin"), "application/octet-stream", recipe)
    }

    #[tokio::test]
    async fn test_run_success_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = Arc::new(MemoryReleaseApi::new());
        let pipeline = ReleasePipeline::new(
            Arc::new(MemoryArtifactStore::new()),
            api.clone(),
            Vec::new(),
        );

        let resolver = TagResolver::new("castoff");
        let report = pipeline
            .run(&resolver, "v1.0.0", vec![echo_job("linux", dir.path())])
            .await
            .expect("run");

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.tag, "v1.0.0");
        assert_eq!(report.publish.as_ref().unwrap().attached_assets.len(), 1);
        assert_eq!(api.release_count(), 1);
    }

    #[tokio::test]
    async fn test_run_invalid_tag_fails_before_building() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = Arc::new(MemoryReleaseApi::new());
        let pipeline = ReleasePipeline::new(
            Arc::new(MemoryArtifactStore::new()),
            api.clone(),
            Vec::new(),
        );

        let resolver = TagResolver::new("castoff");
        let err = pipeline
            .run(&resolver, "not-a-tag", vec![echo_job("linux", dir.path())])
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseError::InvalidTag(_)));
        assert_eq!(api.create_calls(), 0);
    }
}
