//! Filesystem artifact store backend.
//!
//! Layout: one directory per platform key under the run-scoped root,
//! holding the payload blob and a `meta.json` sidecar:
//!
//! ```text
//! <root>/<platform_key>/<file_name>
//! <root>/<platform_key>/meta.json
//! ```
//!
//! The directory doubles as the write-once guard: a second `put` for the
//! same platform key finds the directory and is rejected.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::artifact::{Artifact, ArtifactDigest, ArtifactMeta, ArtifactStore};
use crate::error::{StoreError, StoreResult};

const META_FILE: &str = "meta.json";

/// Artifact store rooted at a run-scoped directory on local disk.
#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn key_dir(&self, platform_key: &str) -> PathBuf {
        self.root.join(platform_key)
    }

    async fn read_entry(&self, dir: &Path, platform_key: &str) -> StoreResult<Artifact> {
        let meta_bytes = tokio::fs::read(dir.join(META_FILE)).await.map_err(|_| {
            StoreError::CorruptArtifact {
                platform_key: platform_key.to_string(),
            }
        })?;
        let meta: ArtifactMeta = serde_json::from_slice(&meta_bytes)?;

        let payload = tokio::fs::read(dir.join(&meta.file_name)).await?;
        if ArtifactDigest::from_bytes(&payload) != meta.digest {
            return Err(StoreError::CorruptArtifact {
                platform_key: platform_key.to_string(),
            });
        }

        Ok(Artifact::new(
            meta.platform_key,
            meta.file_name,
            meta.content_type,
            payload,
        ))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, artifact: Artifact) -> StoreResult<()> {
        let dir = self.key_dir(&artifact.platform_key);
        if dir.exists() {
            return Err(StoreError::DuplicateKey {
                platform_key: artifact.platform_key,
            });
        }
        tokio::fs::create_dir_all(&dir).await?;

        let meta = artifact.meta();
        tokio::fs::write(dir.join(&artifact.file_name), &artifact.payload).await?;
        tokio::fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?).await?;

        debug!(
            platform_key = %meta.platform_key,
            digest = %meta.digest.short(),
            size = meta.size,
            "Stored artifact on disk"
        );
        Ok(())
    }

    async fn get(&self, platform_key: &str) -> StoreResult<Artifact> {
        let dir = self.key_dir(platform_key);
        if !dir.exists() {
            return Err(StoreError::NotFound {
                platform_key: platform_key.to_string(),
            });
        }
        self.read_entry(&dir, platform_key).await
    }

    async fn get_all(&self) -> StoreResult<Vec<Artifact>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                keys.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        keys.sort();

        let mut all = Vec::with_capacity(keys.len());
        for key in keys {
            all.push(self.read_entry(&self.key_dir(&key), &key).await?);
        }
        Ok(all)
    }

    async fn contains(&self, platform_key: &str) -> StoreResult<bool> {
        Ok(self.key_dir(platform_key).exists())
    }

    async fn len(&self) -> StoreResult<usize> {
        let mut count = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(key: &str, payload: &[u8]) -> Artifact {
        Artifact::new(
            key,
            format!("app-{key}.bin"),
            "application/octet-stream",
            payload.to_vec(),
        )
    }

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::open(dir.path()).await.unwrap();

        store.put(artifact("linux", b"payload")).await.unwrap();
        let fetched = store.get("linux").await.unwrap();

        assert_eq!(fetched.platform_key, "linux");
        assert_eq!(fetched.payload, b"payload");
        assert_eq!(fetched.digest, ArtifactDigest::from_bytes(b"payload"));
    }

    #[tokio::test]
    async fn test_write_once_per_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::open(dir.path()).await.unwrap();

        store.put(artifact("linux", b"first")).await.unwrap();
        let err = store.put(artifact("linux", b"second")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));

        // first write survives
        assert_eq!(store.get("linux").await.unwrap().payload, b"first");
    }

    #[tokio::test]
    async fn test_get_all_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::open(dir.path()).await.unwrap();

        store.put(artifact("macos", b"m")).await.unwrap();
        store.put(artifact("deb", b"d")).await.unwrap();

        let all = store.get_all().await.unwrap();
        let keys: Vec<&str> = all.iter().map(|a| a.platform_key.as_str()).collect();
        assert_eq!(keys, vec!["deb", "macos"]);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tampered_payload_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::open(dir.path()).await.unwrap();

        store.put(artifact("linux", b"payload")).await.unwrap();
        tokio::fs::write(dir.path().join("linux").join("app-linux.bin"), b"tampered")
            .await
            .unwrap();

        let err = store.get("linux").await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptArtifact { .. }));
    }

    #[tokio::test]
    async fn test_missing_key_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::open(dir.path()).await.unwrap();
        let err = store.get("windows").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
