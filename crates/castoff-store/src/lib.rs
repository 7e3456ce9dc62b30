//! Castoff-Store: artifact storage and distribution interfaces
//!
//! This crate provides the persistence and external-interface layer for the
//! castoff release engine. It holds the per-run artifact store that build
//! stages write into, plus the traits the publisher uses to reach the
//! primary release API and the secondary distribution channels.
//!
//! ## Key Components
//!
//! - `ArtifactStore`: write-once-per-key blob area shared between stages
//! - `ReleaseApi`: idempotent create-or-fetch release handle + asset upload
//! - `DistChannel`: secondary package-feed notification
//! - `MemoryArtifactStore` / `FsArtifactStore`: store backends
//! - `fakes`: in-memory test doubles for the release API and channels

mod artifact;
mod error;
pub mod fakes;
mod fs;
mod http;
mod memory;
mod release_api;

pub use artifact::{Artifact, ArtifactDigest, ArtifactMeta, ArtifactStore};
pub use error::{StoreError, StoreResult};
pub use fs::FsArtifactStore;
pub use http::{HttpReleaseApi, ReleaseApiConfig, WebhookChannel};
pub use memory::MemoryArtifactStore;
pub use release_api::{AttachedAsset, DistChannel, ReleaseApi, ReleaseIdentity, ReleaseRef};
