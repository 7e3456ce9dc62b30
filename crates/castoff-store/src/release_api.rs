//! Release API and distribution channel trait definitions.
//!
//! These traits are the seams to the external release host and the
//! secondary package feeds:
//! - `ReleaseApi`: create-or-fetch a release handle keyed by tag, then
//!   attach assets to it
//! - `DistChannel`: notify one secondary feed that a release is live
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::StoreResult;

/// Identity of a release, derived once from the triggering version tag.
///
/// Immutable after creation; every downstream stage reads it, none mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseIdentity {
    /// The triggering version tag (e.g. `v1.2.3`).
    pub tag: String,

    /// Human-readable release title.
    pub display_name: String,

    /// Release notes body.
    pub notes: String,
}

/// Stable handle to a release on the hosting API.
///
/// Obtained from `create_or_fetch`; re-running the pipeline for the same tag
/// yields the same logical handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRef {
    /// Tag the release is keyed by.
    pub tag: String,

    /// Host-assigned release identifier.
    pub release_id: String,

    /// Asset upload endpoint, when the host exposes a separate one.
    pub upload_url: Option<String>,
}

/// A successfully attached release asset and its public download reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedAsset {
    /// File name the asset was published under.
    pub file_name: String,

    /// Public download reference handed to secondary channels.
    pub download_ref: String,
}

/// Release hosting API.
///
/// Guarantees:
/// - `create_or_fetch` is idempotent: an "already exists" response for the
///   tag resolves to the existing release rather than an error.
/// - `attach_asset` attaching an already-present file name is a no-op that
///   returns the existing download reference (no duplicate assets).
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// Create the release record for this identity, or fetch the existing
    /// one keyed by `identity.tag`.
    async fn create_or_fetch(&self, identity: &ReleaseIdentity) -> StoreResult<ReleaseRef>;

    /// Attach one artifact to the release and return its download reference.
    async fn attach_asset(
        &self,
        release: &ReleaseRef,
        artifact: &Artifact,
    ) -> StoreResult<AttachedAsset>;
}

/// One secondary distribution channel (package feed).
///
/// Channels are configuration-driven; the publisher notifies each one
/// independently and records per-channel outcomes.
#[async_trait]
pub trait DistChannel: Send + Sync {
    /// Channel name used in reports and logs.
    fn name(&self) -> &str;

    /// Notify the channel that `release` is live with the given assets.
    async fn notify(&self, release: &ReleaseRef, assets: &[AttachedAsset]) -> StoreResult<()>;
}
