//! Blob store implementations: in-memory and local filesystem

use crate::core::service::{BlobStore, StoredBlob};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;

/// In-memory blob store
///
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, blob: StoredBlob) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        blobs.insert(blob.key.clone(), blob);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(blobs.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        blobs.remove(key);
        Ok(())
    }
}

/// Metadata sidecar written next to each blob
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobMeta {
    content_type: String,
    metadata: HashMap<String, String>,
}

/// Filesystem-backed blob store
///
/// Each blob is a file named by its key plus a `<key>.meta.json` sidecar.
/// The root directory is created on first use, exactly once even under
/// concurrent first calls.
pub struct FsBlobStore {
    root: PathBuf,
    ready: OnceCell<()>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ready: OnceCell::new(),
        }
    }

    async fn ensure_root(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.root)
                    .await
                    .with_context(|| format!("creating blob directory {}", self.root.display()))?;
                tracing::info!(root = %self.root.display(), "blob store initialized");
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    fn paths(&self, key: &str) -> Result<(PathBuf, PathBuf)> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            bail!("invalid blob key '{}'", key);
        }
        Ok((
            self.root.join(key),
            self.root.join(format!("{}.meta.json", key)),
        ))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, blob: StoredBlob) -> Result<()> {
        self.ensure_root().await?;
        let (data_path, meta_path) = self.paths(&blob.key)?;

        let meta = serde_json::to_vec(&BlobMeta {
            content_type: blob.content_type,
            metadata: blob.metadata,
        })?;

        tokio::fs::write(&meta_path, meta)
            .await
            .with_context(|| format!("writing {}", meta_path.display()))?;
        tokio::fs::write(&data_path, &blob.data)
            .await
            .with_context(|| format!("writing {}", data_path.display()))?;

        // Flush to disk before reporting the blob as stored
        let file = tokio::fs::File::open(&data_path).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
        let (data_path, meta_path) = self.paths(key)?;

        let data = match tokio::fs::read(&data_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", data_path.display())),
        };
        let meta: BlobMeta = serde_json::from_slice(
            &tokio::fs::read(&meta_path)
                .await
                .with_context(|| format!("reading {}", meta_path.display()))?,
        )?;

        Ok(Some(StoredBlob {
            key: key.to_string(),
            content_type: meta.content_type,
            metadata: meta.metadata,
            data: Bytes::from(data),
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let (data_path, meta_path) = self.paths(key)?;
        for path in [data_path, meta_path] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(key: &str) -> StoredBlob {
        StoredBlob {
            key: key.to_string(),
            content_type: "application/pdf".to_string(),
            metadata: HashMap::from([("studentId".to_string(), "s1".to_string())]),
            data: Bytes::from_static(b"%PDF-1.4"),
        }
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryBlobStore::new();
        store.put(blob("a.pdf")).await.unwrap();
        assert_eq!(store.len(), 1);

        let fetched = store.get("a.pdf").await.unwrap().unwrap();
        assert_eq!(fetched.data, Bytes::from_static(b"%PDF-1.4"));

        store.delete("a.pdf").await.unwrap();
        assert!(store.get("a.pdf").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fs_store_creates_root_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("blobs");
        let store = FsBlobStore::new(&root);
        assert!(!root.exists());

        store.put(blob("b.pdf")).await.unwrap();
        assert!(root.join("b.pdf").exists());

        let fetched = store.get("b.pdf").await.unwrap().unwrap();
        assert_eq!(fetched.content_type, "application/pdf");
        assert_eq!(fetched.metadata["studentId"], "s1");
    }

    #[tokio::test]
    async fn test_fs_store_concurrent_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsBlobStore::new(dir.path().join("blobs")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.put(blob(&format!("{}.pdf", i))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(store.get("7.pdf").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fs_store_missing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(store.get("missing.pdf").await.unwrap().is_none());
        store.put(blob("c.pdf")).await.unwrap();
        store.delete("c.pdf").await.unwrap();
        store.delete("c.pdf").await.unwrap();
        assert!(store.get("c.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(store.put(blob("../escape.pdf")).await.is_err());
        assert!(store.get("a/b").await.is_err());
    }
}
