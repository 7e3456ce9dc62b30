//! In-memory fakes for the distribution traits (testing only)
//!
//! Provides `MemoryReleaseApi` and `MemoryChannel` that satisfy the trait
//! contracts without any external dependencies, with scriptable failures
//! for exercising partial-publish paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::error::{StoreError, StoreResult};
use crate::release_api::{AttachedAsset, DistChannel, ReleaseApi, ReleaseIdentity, ReleaseRef};

// ---------------------------------------------------------------------------
// MemoryReleaseApi
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct FakeRelease {
    reference: ReleaseRef,
    assets: Vec<AttachedAsset>,
}

/// In-memory release host keyed by tag.
///
/// `create_or_fetch` is idempotent and `attach_asset` enforces set
/// semantics on file names, matching the contract real hosts provide.
#[derive(Debug, Default)]
pub struct MemoryReleaseApi {
    releases: Mutex<HashMap<String, FakeRelease>>,
    create_calls: AtomicUsize,
    fail_creates: AtomicUsize,
    failing_attaches: Mutex<HashSet<String>>,
}

impl MemoryReleaseApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` create calls before succeeding.
    pub fn fail_next_creates(&self, n: usize) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    /// Make every attach of `file_name` fail.
    pub fn fail_attach_for(&self, file_name: &str) {
        self.failing_attaches
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    /// Total create calls observed (including failed and already-exists).
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of distinct releases that exist.
    pub fn release_count(&self) -> usize {
        self.releases.lock().unwrap().len()
    }

    /// Assets currently attached to the release with this tag.
    pub fn assets_for(&self, tag: &str) -> Vec<AttachedAsset> {
        self.releases
            .lock()
            .unwrap()
            .get(tag)
            .map(|r| r.assets.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReleaseApi for MemoryReleaseApi {
    async fn create_or_fetch(&self, identity: &ReleaseIdentity) -> StoreResult<ReleaseRef> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_creates.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_creates.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::ReleaseApi(
                "injected create failure".to_string(),
            ));
        }

        let mut releases = self.releases.lock().unwrap();
        let release = releases
            .entry(identity.tag.clone())
            .or_insert_with(|| FakeRelease {
                reference: ReleaseRef {
                    tag: identity.tag.clone(),
                    release_id: uuid::Uuid::new_v4().to_string(),
                    upload_url: None,
                },
                assets: Vec::new(),
            });
        Ok(release.reference.clone())
    }

    async fn attach_asset(
        &self,
        release: &ReleaseRef,
        artifact: &Artifact,
    ) -> StoreResult<AttachedAsset> {
        if self
            .failing_attaches
            .lock()
            .unwrap()
            .contains(&artifact.file_name)
        {
            return Err(StoreError::ReleaseApi(format!(
                "injected attach failure for {}",
                artifact.file_name
            )));
        }

        let mut releases = self.releases.lock().unwrap();
        let entry = releases
            .get_mut(&release.tag)
            .ok_or_else(|| StoreError::ReleaseApi(format!("no release for tag {}", release.tag)))?;

        // Set semantics: re-attaching an existing file name is a no-op.
        if let Some(existing) = entry
            .assets
            .iter()
            .find(|a| a.file_name == artifact.file_name)
        {
            return Ok(existing.clone());
        }

        let asset = AttachedAsset {
            file_name: artifact.file_name.clone(),
            download_ref: format!("memory://{}/{}", release.tag, artifact.file_name),
        };
        entry.assets.push(asset.clone());
        Ok(asset)
    }
}

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

/// Recorded channel notification.
#[derive(Debug, Clone)]
pub struct RecordedNotification {
    pub tag: String,
    pub asset_count: usize,
}

/// In-memory distribution channel that records every notification.
#[derive(Debug)]
pub struct MemoryChannel {
    name: String,
    fail: AtomicUsize,
    notifications: Mutex<Vec<RecordedNotification>>,
}

impl MemoryChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: AtomicUsize::new(0),
            notifications: Mutex::new(Vec::new()),
        }
    }

    /// Make every notification fail.
    pub fn always_fail(name: &str) -> Self {
        let channel = Self::new(name);
        channel.fail.store(usize::MAX, Ordering::SeqCst);
        channel
    }

    /// Notifications received so far.
    pub fn notifications(&self) -> Vec<RecordedNotification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn notified_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

#[async_trait]
impl DistChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, release: &ReleaseRef, assets: &[AttachedAsset]) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) > 0 {
            return Err(StoreError::Channel(format!(
                "{}: injected notify failure",
                self.name
            )));
        }

        self.notifications.lock().unwrap().push(RecordedNotification {
            tag: release.tag.clone(),
            asset_count: assets.len(),
        });
        Ok(())
    }
}
