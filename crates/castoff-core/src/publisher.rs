//! Idempotent multi-step release publishing.
//!
//! State machine: `Unpublished → ReleaseCreated → AssetsAttached(k/N) →
//! ChannelsNotified(m/M) → Done`. Release creation is create-or-fetch
//! keyed by tag, so a re-run after a crash resolves the existing release
//! instead of duplicating it. Per-asset and per-channel failures are
//! recorded, never rolled back.

use std::collections::BTreeMap;
use std::sync::Arc;

use castoff_store::{
    Artifact, AttachedAsset, DistChannel, ReleaseApi, ReleaseIdentity, ReleaseRef,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PublishStep, ReleaseError, Result};

/// Outcome of notifying one secondary distribution channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ChannelOutcome {
    NotStarted,
    Done,
    Failed { reason: String },
}

/// An asset that could not be attached, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAsset {
    pub file_name: String,
    pub reason: String,
}

/// Record of one publish, mutated incrementally as steps complete.
///
/// Never rolled back: failures are surfaced in `failed_assets` and
/// `channel_status`, not undone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRecord {
    /// Identity the release was published under.
    pub identity: ReleaseIdentity,

    /// Stable handle to the release on the host.
    pub release_ref: ReleaseRef,

    /// Assets attached so far, in platform-key order.
    pub attached_assets: Vec<AttachedAsset>,

    /// Assets whose attachment failed after retries.
    pub failed_assets: Vec<FailedAsset>,

    /// Per-channel notification outcomes.
    pub channel_status: BTreeMap<String, ChannelOutcome>,

    /// When the release record was created (or resolved).
    pub published_at: DateTime<Utc>,
}

impl PublishRecord {
    /// Whether every primary asset was attached.
    pub fn all_assets_attached(&self) -> bool {
        self.failed_assets.is_empty()
    }

    /// Number of channels whose notification failed.
    pub fn failed_channel_count(&self) -> usize {
        self.channel_status
            .values()
            .filter(|o| matches!(o, ChannelOutcome::Failed { .. }))
            .count()
    }
}

/// Publishes a complete artifact set as one release.
pub struct ReleasePublisher {
    api: Arc<dyn ReleaseApi>,
    channels: Vec<Arc<dyn DistChannel>>,
    create_attempts: u32,
    attach_attempts: u32,
}

impl ReleasePublisher {
    pub fn new(api: Arc<dyn ReleaseApi>, channels: Vec<Arc<dyn DistChannel>>) -> Self {
        Self {
            api,
            channels,
            create_attempts: 3,
            attach_attempts: 2,
        }
    }

    /// Override the retry budget for release creation and asset attaches.
    pub fn with_attempts(mut self, create: u32, attach: u32) -> Self {
        self.create_attempts = create.max(1);
        self.attach_attempts = attach.max(1);
        self
    }

    /// Publish the artifact set under `identity`.
    ///
    /// Must only be called once the scheduler reports the join condition
    /// satisfied. Fails terminally only when release creation cannot
    /// succeed within its retry budget; attach and channel failures are
    /// recorded in the returned record.
    pub async fn publish(
        &self,
        identity: &ReleaseIdentity,
        artifacts: &[Artifact],
    ) -> Result<PublishRecord> {
        // Step 1: ReleaseCreated (idempotent create-or-fetch, retried).
        let release_ref = self.create_release(identity).await?;
        info!(tag = %identity.tag, release_id = %release_ref.release_id, "Release created");

        let mut record = PublishRecord {
            identity: identity.clone(),
            release_ref: release_ref.clone(),
            attached_assets: Vec::new(),
            failed_assets: Vec::new(),
            channel_status: self
                .channels
                .iter()
                .map(|c| (c.name().to_string(), ChannelOutcome::NotStarted))
                .collect(),
            published_at: Utc::now(),
        };

        // Step 2: AssetsAttached, stable platform-key order.
        let mut ordered: Vec<&Artifact> = artifacts.iter().collect();
        ordered.sort_by(|a, b| a.platform_key.cmp(&b.platform_key));

        for artifact in ordered {
            match self.attach_asset(&release_ref, artifact).await {
                Ok(asset) => {
                    info!(file_name = %asset.file_name, "Asset attached");
                    record.attached_assets.push(asset);
                }
                Err(reason) => {
                    warn!(file_name = %artifact.file_name, %reason, "Asset attach failed");
                    record.failed_assets.push(FailedAsset {
                        file_name: artifact.file_name.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        // Step 3: ChannelsNotified. Failures are informational only.
        for channel in &self.channels {
            let name = channel.name().to_string();
            match channel.notify(&release_ref, &record.attached_assets).await {
                Ok(()) => {
                    info!(channel = %name, "Channel notified");
                    record.channel_status.insert(name, ChannelOutcome::Done);
                }
                Err(e) => {
                    let err = ReleaseError::ChannelNotify {
                        channel: name.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{err}");
                    record.channel_status.insert(
                        name,
                        ChannelOutcome::Failed {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        Ok(record)
    }

    async fn create_release(&self, identity: &ReleaseIdentity) -> Result<ReleaseRef> {
        let mut last_error = String::new();
        for attempt in 1..=self.create_attempts {
            match self.api.create_or_fetch(identity).await {
                Ok(release) => return Ok(release),
                Err(e) => {
                    warn!(attempt, "Release creation failed: {e}");
                    last_error = e.to_string();
                }
            }
        }
        Err(ReleaseError::Publish {
            step: PublishStep::CreateRelease,
            reason: last_error,
        })
    }

    async fn attach_asset(
        &self,
        release: &ReleaseRef,
        artifact: &Artifact,
    ) -> std::result::Result<AttachedAsset, ReleaseError> {
        let mut last_error = String::new();
        for _ in 0..self.attach_attempts {
            match self.api.attach_asset(release, artifact).await {
                Ok(asset) => return Ok(asset),
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(ReleaseError::Publish {
            step: PublishStep::AttachAsset,
            reason: last_error,
        })
    }
}
