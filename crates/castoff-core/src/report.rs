//! Machine-readable run report: one overall status plus a per-stage
//! breakdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;
use crate::publisher::PublishRecord;

/// Overall outcome of a run.
///
/// `Partial` means a usable release exists but at least one asset failed to
/// attach; it must never be reported as `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

/// Terminal report for a single build job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    /// Platform key of the job.
    pub platform_key: String,

    /// Terminal status (`Succeeded` or `Failed`).
    pub status: JobStatus,

    /// Diagnostic output when the job failed.
    pub diagnostic: Option<String>,

    /// Build duration in milliseconds (when the recipe ran to completion).
    pub duration_ms: Option<u64>,
}

impl BuildResult {
    /// Whether this job succeeded.
    pub fn passed(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// Result of a complete release run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier of this run.
    pub run_id: String,

    /// The triggering version tag.
    pub tag: String,

    /// Overall status.
    pub status: RunStatus,

    /// Per-platform build results.
    pub builds: Vec<BuildResult>,

    /// Publish record, present only when the join condition was satisfied
    /// and release creation succeeded.
    pub publish: Option<PublishRecord>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Timestamp when the report was generated.
    pub generated_at: DateTime<Utc>,
}

impl RunReport {
    /// Number of builds that succeeded.
    pub fn passed_count(&self) -> usize {
        self.builds.iter().filter(|b| b.passed()).count()
    }

    /// Number of builds that failed.
    pub fn failed_count(&self) -> usize {
        self.builds.iter().filter(|b| !b.passed()).count()
    }

    /// Fold build and publish outcomes into one overall status.
    ///
    /// Any failed build fails the run. A publish record with failed asset
    /// attaches demotes the run to `Partial`. Channel notification failures
    /// never change the status.
    pub fn derive_status(builds: &[BuildResult], publish: Option<&PublishRecord>) -> RunStatus {
        if builds.iter().any(|b| !b.passed()) {
            return RunStatus::Failed;
        }
        match publish {
            None => RunStatus::Failed,
            Some(record) if !record.failed_assets.is_empty() => RunStatus::Partial,
            Some(_) => RunStatus::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{ChannelOutcome, FailedAsset};
    use castoff_store::{ReleaseIdentity, ReleaseRef};
    use std::collections::BTreeMap;

    fn passed(key: &str) -> BuildResult {
        BuildResult {
            platform_key: key.to_string(),
            status: JobStatus::Succeeded,
            diagnostic: None,
            duration_ms: Some(100),
        }
    }

    fn failed(key: &str) -> BuildResult {
        BuildResult {
            platform_key: key.to_string(),
            status: JobStatus::Failed,
            diagnostic: Some("boom".to_string()),
            duration_ms: None,
        }
    }

    fn record(failed_assets: Vec<FailedAsset>, channel_failed: bool) -> PublishRecord {
        let mut channel_status = BTreeMap::new();
        channel_status.insert(
            "homebrew".to_string(),
            if channel_failed {
                ChannelOutcome::Failed {
                    reason: "HTTP 500".to_string(),
                }
            } else {
                ChannelOutcome::Done
            },
        );
        PublishRecord {
            identity: ReleaseIdentity {
                tag: "v1.0.0".to_string(),
                display_name: "app v1.0.0".to_string(),
                notes: String::new(),
            },
            release_ref: ReleaseRef {
                tag: "v1.0.0".to_string(),
                release_id: "r1".to_string(),
                upload_url: None,
            },
            attached_assets: Vec::new(),
            failed_assets,
            channel_status,
            published_at: Utc::now(),
        }
    }

    #[test]
    fn test_any_failed_build_fails_run() {
        let builds = vec![passed("linux"), failed("macos")];
        assert_eq!(RunReport::derive_status(&builds, None), RunStatus::Failed);
    }

    #[test]
    fn test_all_passed_with_clean_publish_is_success() {
        let builds = vec![passed("linux"), passed("macos")];
        let publish = record(Vec::new(), false);
        assert_eq!(
            RunReport::derive_status(&builds, Some(&publish)),
            RunStatus::Success
        );
    }

    #[test]
    fn test_failed_attach_is_partial() {
        let builds = vec![passed("linux")];
        let publish = record(
            vec![FailedAsset {
                file_name: "app-linux.tar.gz".to_string(),
                reason: "HTTP 502".to_string(),
            }],
            false,
        );
        assert_eq!(
            RunReport::derive_status(&builds, Some(&publish)),
            RunStatus::Partial
        );
    }

    #[test]
    fn test_channel_failure_does_not_demote_status() {
        let builds = vec![passed("linux")];
        let publish = record(Vec::new(), true);
        assert_eq!(
            RunReport::derive_status(&builds, Some(&publish)),
            RunStatus::Success
        );
    }

    #[test]
    fn test_counts() {
        let report = RunReport {
            run_id: "run-1".to_string(),
            tag: "v1.0.0".to_string(),
            status: RunStatus::Failed,
            builds: vec![passed("linux"), failed("macos"), passed("deb")],
            publish: None,
            duration_ms: 1234,
            generated_at: Utc::now(),
        };
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.failed_count(), 1);
    }
}
