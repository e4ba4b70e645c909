//! Ephemeral artifact store
//!
//! Hands out opaque handles to generated files kept on local disk, with:
//! - In-memory handle index behind an RwLock
//! - Automatic expiry via a periodic background sweep
//! - An hourly stray-file backstop independent of the index
//!
//! The index is the only state shared across requests; every mutation is a
//! single-key operation under the lock, so a `resolve` racing a deletion
//! sees either the full artifact or nothing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::cleanup::TempFileGuard;
use super::types::{Artifact, StoreError};

/// Handle-addressed store for generated files
#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<ArtifactStoreInner>,
}

struct ArtifactStoreInner {
    /// Directory holding one blob per live handle
    dir: PathBuf,

    /// Age past which an artifact is no longer retrievable
    ttl: Duration,

    /// Live artifacts indexed by handle
    entries: RwLock<HashMap<String, Artifact>>,
}

impl ArtifactStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        Ok(Self {
            inner: Arc::new(ArtifactStoreInner {
                dir,
                ttl,
                entries: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// The configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn blob_path(&self, handle: &str) -> PathBuf {
        self.inner.dir.join(handle)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Persist content and hand back a fresh unguessable handle.
    ///
    /// The blob is written to a temp path and renamed into place, so readers
    /// never observe a partial file. The temp file is removed on every exit
    /// path.
    pub async fn store(
        &self,
        content: &[u8],
        display_name: &str,
        media_type: &str,
    ) -> Result<Artifact, StoreError> {
        let handle = Uuid::new_v4().to_string();
        let path = self.blob_path(&handle);
        let tmp = self.inner.dir.join(format!("{handle}.tmp"));

        let guard = TempFileGuard::new(tmp.clone());
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        guard.disarm();

        let artifact = Artifact {
            handle: handle.clone(),
            display_name: display_name.to_string(),
            media_type: media_type.to_string(),
            size: content.len() as u64,
            created_at: Utc::now(),
        };

        {
            let mut entries = self.inner.entries.write().await;
            entries.insert(handle, artifact.clone());
        }

        tracing::info!(
            handle = %artifact.handle,
            name = %artifact.display_name,
            size = artifact.size,
            "Stored artifact"
        );

        Ok(artifact)
    }

    /// Look up metadata for a handle. Side-effect free.
    ///
    /// Returns `NotFound` once the TTL has passed, even if the sweep has not
    /// reclaimed the entry yet.
    pub async fn resolve(&self, handle: &str) -> Result<Artifact, StoreError> {
        let entries = self.inner.entries.read().await;
        match entries.get(handle) {
            Some(artifact) if Utc::now() - artifact.created_at < self.inner.ttl => {
                Ok(artifact.clone())
            }
            _ => Err(StoreError::NotFound(handle.to_string())),
        }
    }

    /// Resolve a handle and read its content.
    ///
    /// A delete racing this read makes the blob vanish between the index
    /// lookup and the filesystem read; that surfaces as `NotFound`, never as
    /// truncated content, because blobs are only ever renamed into place.
    /// Any other filesystem failure is a real IO error and propagates as
    /// `Io`.
    pub async fn read(&self, handle: &str) -> Result<(Artifact, Vec<u8>), StoreError> {
        let artifact = self.resolve(handle).await?;
        let bytes = match tokio::fs::read(self.blob_path(handle)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(handle.to_string()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok((artifact, bytes))
    }

    /// Remove an artifact. Idempotent; unknown handles are a no-op.
    pub async fn delete(&self, handle: &str) {
        let removed = {
            let mut entries = self.inner.entries.write().await;
            entries.remove(handle)
        };

        if removed.is_some() {
            let _ = tokio::fs::remove_file(self.blob_path(handle)).await;
            tracing::debug!(handle = %handle, "Deleted artifact");
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Delete every artifact whose age exceeds the TTL.
    ///
    /// Returns the number of artifacts reclaimed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();

        let expired: Vec<String> = {
            let entries = self.inner.entries.read().await;
            entries
                .iter()
                .filter(|(_, artifact)| now - artifact.created_at >= self.inner.ttl)
                .map(|(handle, _)| handle.clone())
                .collect()
        };

        let count = expired.len();
        for handle in expired {
            self.delete(&handle).await;
        }

        if count > 0 {
            tracing::info!(count = count, "Swept expired artifacts");
        }

        count
    }

    /// Remove files in the store directory that no live handle points at and
    /// that are older than `max_age`. Backstop for anything a crash or an
    /// aborted request left behind.
    pub async fn purge_stray_files(&self, max_age: std::time::Duration) -> usize {
        let live: HashSet<String> = {
            let entries = self.inner.entries.read().await;
            entries.keys().cloned().collect()
        };

        let mut dir = match tokio::fs::read_dir(&self.inner.dir).await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("Failed to scan artifact directory: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if live.contains(&name) {
                continue;
            }

            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let old_enough = modified
                .elapsed()
                .map(|age| age > max_age)
                .unwrap_or(false);

            if old_enough && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(count = removed, "Purged stray artifact files");
        }

        removed
    }

    /// Start the background expiry sweep.
    ///
    /// The interval must be strictly shorter than the TTL so no artifact
    /// outlives its TTL by more than one sweep.
    pub fn start_sweep_task(self, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.sweep_expired().await;
            }
        })
    }

    /// Start the stray-file backstop task.
    pub fn start_stray_cleanup_task(
        self,
        every: std::time::Duration,
        max_age: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.purge_stray_files(max_age).await;
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
