//! In-memory artifact store backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::artifact::{Artifact, ArtifactStore};
use crate::error::{StoreError, StoreResult};

/// In-memory artifact store backed by a `HashMap<platform_key, Artifact>`.
///
/// The default backend for single-process runs; CI-native or filesystem
/// persistence uses [`crate::FsArtifactStore`] instead. Write-once semantics
/// are enforced per platform key.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<String, Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, artifact: Artifact) -> StoreResult<()> {
        let mut artifacts = self.artifacts.lock().unwrap();
        if artifacts.contains_key(&artifact.platform_key) {
            return Err(StoreError::DuplicateKey {
                platform_key: artifact.platform_key,
            });
        }
        artifacts.insert(artifact.platform_key.clone(), artifact);
        Ok(())
    }

    async fn get(&self, platform_key: &str) -> StoreResult<Artifact> {
        let artifacts = self.artifacts.lock().unwrap();
        artifacts
            .get(platform_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                platform_key: platform_key.to_string(),
            })
    }

    async fn get_all(&self) -> StoreResult<Vec<Artifact>> {
        let artifacts = self.artifacts.lock().unwrap();
        let mut all: Vec<Artifact> = artifacts.values().cloned().collect();
        all.sort_by(|a, b| a.platform_key.cmp(&b.platform_key));
        Ok(all)
    }

    async fn contains(&self, platform_key: &str) -> StoreResult<bool> {
        let artifacts = self.artifacts.lock().unwrap();
        Ok(artifacts.contains_key(platform_key))
    }

    async fn len(&self) -> StoreResult<usize> {
        let artifacts = self.artifacts.lock().unwrap();
        Ok(artifacts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(key: &str) -> Artifact {
        Artifact::new(
            key,
            format!("app-{key}.tar.gz"),
            "application/gzip",
            key.as_bytes().to_vec(),
        )
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryArtifactStore::new();
        store.put(artifact("linux")).await.unwrap();

        let fetched = store.get("linux").await.unwrap();
        assert_eq!(fetched.platform_key, "linux");
        assert_eq!(fetched.file_name, "app-linux.tar.gz");
    }

    #[tokio::test]
    async fn test_put_twice_same_key_is_rejected() {
        let store = MemoryArtifactStore::new();
        store.put(artifact("linux")).await.unwrap();

        let err = store.put(artifact("linux")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryArtifactStore::new();
        let err = store.get("windows").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_all_sorted_by_platform_key() {
        let store = MemoryArtifactStore::new();
        store.put(artifact("macos")).await.unwrap();
        store.put(artifact("deb")).await.unwrap();
        store.put(artifact("linux")).await.unwrap();

        let all = store.get_all().await.unwrap();
        let keys: Vec<&str> = all.iter().map(|a| a.platform_key.as_str()).collect();
        assert_eq!(keys, vec!["deb", "linux", "macos"]);
    }

    #[tokio::test]
    async fn test_contains() {
        let store = MemoryArtifactStore::new();
        assert!(!store.contains("linux").await.unwrap());
        store.put(artifact("linux")).await.unwrap();
        assert!(store.contains("linux").await.unwrap());
    }
}
