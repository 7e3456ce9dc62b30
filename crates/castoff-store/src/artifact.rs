//! Artifact model and the store trait build stages write into.
//!
//! Each build stage deposits exactly one [`Artifact`] under its own
//! platform key. The store enforces write-once-per-key; the publisher reads
//! the full set back in platform-key order once every build has finished.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{StoreError, StoreResult};

/// Content digest of an artifact payload (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactDigest(String);

impl ArtifactDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ArtifactDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ArtifactDigest {
    type Error = StoreError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::CorruptArtifact {
                platform_key: format!("<digest {s}>"),
            });
        }
        Ok(ArtifactDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One platform-specific release binary, produced by a single build job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Platform key of the build job that owns this artifact (unique per run).
    pub platform_key: String,

    /// File name the asset is published under.
    pub file_name: String,

    /// MIME content type of the payload.
    pub content_type: String,

    /// Raw binary payload.
    pub payload: Vec<u8>,

    /// SHA-256 digest of the payload.
    pub digest: ArtifactDigest,
}

impl Artifact {
    /// Package a payload as an artifact, computing its digest.
    pub fn new(
        platform_key: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        let digest = ArtifactDigest::from_bytes(&payload);
        Self {
            platform_key: platform_key.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            payload,
            digest,
        }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Serializable metadata without the payload.
    pub fn meta(&self) -> ArtifactMeta {
        ArtifactMeta {
            platform_key: self.platform_key.clone(),
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size: self.payload.len() as u64,
            digest: self.digest.clone(),
        }
    }
}

/// Artifact metadata persisted alongside the payload blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Platform key of the owning build job.
    pub platform_key: String,

    /// File name the asset is published under.
    pub file_name: String,

    /// MIME content type of the payload.
    pub content_type: String,

    /// Payload size in bytes.
    pub size: u64,

    /// SHA-256 digest of the payload.
    pub digest: ArtifactDigest,
}

/// Per-run keyed blob area shared between the build and publish stages.
///
/// Guarantees:
/// - `put` stores at most one artifact per platform key (write-once).
/// - `get_all` returns artifacts sorted by platform key ascending.
/// - The store is scoped to a single run/tag; a fresh run gets a fresh store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store an artifact under its platform key.
    /// Returns `StoreError::DuplicateKey` if the key already holds one.
    async fn put(&self, artifact: Artifact) -> StoreResult<()>;

    /// Retrieve the artifact for a platform key.
    /// Returns `StoreError::NotFound` if absent.
    async fn get(&self, platform_key: &str) -> StoreResult<Artifact>;

    /// Retrieve all stored artifacts, sorted by platform key ascending.
    async fn get_all(&self) -> StoreResult<Vec<Artifact>>;

    /// Check whether a platform key holds an artifact.
    async fn contains(&self, platform_key: &str) -> StoreResult<bool>;

    /// Number of artifacts currently stored.
    async fn len(&self) -> StoreResult<usize>;

    /// Whether the store holds no artifacts.
    async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        let a = ArtifactDigest::from_bytes(b"binary");
        let b = ArtifactDigest::from_bytes(b"binary");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_digest_short_form() {
        let digest = ArtifactDigest::from_bytes(b"binary");
        assert_eq!(digest.short().len(), 12);
        assert!(digest.as_str().starts_with(digest.short()));
    }

    #[test]
    fn test_digest_try_from_rejects_invalid() {
        assert!(ArtifactDigest::try_from("not-hex".to_string()).is_err());
        assert!(ArtifactDigest::try_from("ab".repeat(32)).is_ok());
    }

    #[test]
    fn test_artifact_new_computes_digest() {
        let artifact = Artifact::new("linux", "app-linux.tar.gz", "application/gzip", vec![1, 2, 3]);
        assert_eq!(artifact.digest, ArtifactDigest::from_bytes(&[1, 2, 3]));
        assert_eq!(artifact.size(), 3);
    }

    #[test]
    fn test_artifact_meta_roundtrip() {
        let artifact = Artifact::new("macos", "app-macos.zip", "application/zip", vec![9; 16]);
        let meta = artifact.meta();
        assert_eq!(meta.size, 16);

        let json = serde_json::to_string(&meta).expect("serialize");
        let back: ArtifactMeta = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(meta, back);
    }
}
