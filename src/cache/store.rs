//! Filesystem-backed artifact cache.
//!
//! Entries live at `root/o/w/n/owner/a/s/s/asset/f/i/n/fingerprint`, one
//! single-character prefix level per shard. The shards keep directory sizes
//! bounded; nesting the fingerprint under the asset keeps invalidation a
//! single subtree deletion.
//!
//! Publication is atomic: entries are written to a uniquely named temp file
//! in the destination directory and renamed into place, so readers see an
//! entry fully or not at all. No locks are taken anywhere.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use metrics::counter;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fingerprint::{Fingerprint, FingerprintInput};

use super::record::{self, CacheEntry, RecordError};

pub(crate) const METRIC_CACHE_HIT: &str = "ombra_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "ombra_cache_miss_total";
pub(crate) const METRIC_CACHE_STORE_FAILED: &str = "ombra_cache_store_failed_total";
pub(crate) const METRIC_CACHE_CORRUPT_EVICTED: &str = "ombra_cache_corrupt_evicted_total";
pub(crate) const METRIC_CACHE_INVALIDATE: &str = "ombra_cache_invalidate_total";

/// Number of single-character prefix levels per id.
const SHARD_DEPTH: usize = 3;

#[derive(Debug, Error)]
enum StoreError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Content-addressable cache for derived media artifacts.
#[derive(Debug)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Open a cache rooted at the provided directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Fetch the entry for `input`, if a structurally valid one exists.
    ///
    /// A corrupt record is deleted on the spot and reported as a miss; so is
    /// any read that races with a concurrent invalidation.
    pub async fn lookup(&self, input: &FingerprintInput) -> Option<CacheEntry> {
        let fingerprint = input.fingerprint();
        let path = self.entry_path(input, &fingerprint);

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                counter!(METRIC_CACHE_MISS).increment(1);
                return None;
            }
            Err(err) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                warn!(error = %err, fingerprint = %fingerprint, "artifact cache read failed");
                return None;
            }
        };

        match record::decode(&raw) {
            Ok(entry) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(fingerprint = %fingerprint, "artifact cache hit");
                Some(entry)
            }
            Err(err) => {
                counter!(METRIC_CACHE_CORRUPT_EVICTED).increment(1);
                warn!(
                    error = %err,
                    fingerprint = %fingerprint,
                    "corrupt artifact cache record, deleting"
                );
                if let Err(err) = fs::remove_file(&path).await
                    && err.kind() != ErrorKind::NotFound
                {
                    warn!(error = %err, fingerprint = %fingerprint, "failed to delete corrupt record");
                }
                None
            }
        }
    }

    /// Write `entry` so it becomes atomically visible for `input`.
    ///
    /// Best effort: failures are logged and counted but never surfaced, since
    /// a missed cache write must not fail the operation that produced the
    /// artifact.
    pub async fn store(&self, input: &FingerprintInput, entry: &CacheEntry) {
        let fingerprint = input.fingerprint();
        if let Err(err) = self.try_store(input, &fingerprint, entry).await {
            counter!(METRIC_CACHE_STORE_FAILED).increment(1);
            warn!(error = %err, fingerprint = %fingerprint, "artifact cache store failed");
        } else {
            debug!(fingerprint = %fingerprint, "artifact cached");
        }
    }

    async fn try_store(
        &self,
        input: &FingerprintInput,
        fingerprint: &Fingerprint,
        entry: &CacheEntry,
    ) -> Result<(), StoreError> {
        let path = self.entry_path(input, fingerprint);
        if let Some(parent) = path.parent() {
            // create_dir_all tolerates a concurrent writer creating the same
            // directories.
            fs::create_dir_all(parent).await?;
        }

        let encoded = record::encode(entry)?;
        let tmp = path.with_file_name(format!("{}.{}.tmp", fingerprint.to_hex(), Uuid::new_v4()));

        fs::write(&tmp, &encoded).await?;
        if let Err(err) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }

        Ok(())
    }

    /// Delete every cached variant ever derived from `(owner_id, asset_id)`.
    ///
    /// Deletion is depth-first, files before directories, and treats entries
    /// that already vanished as success.
    pub async fn invalidate(&self, owner_id: &str, asset_id: &str) {
        counter!(METRIC_CACHE_INVALIDATE).increment(1);
        let dir = self.asset_dir(owner_id, asset_id);
        remove_tree(&dir).await;
        debug!(owner_id, asset_id, "artifact cache subtree invalidated");
    }

    /// Directory owning every variant of one `(owner, asset)` pair.
    fn asset_dir(&self, owner_id: &str, asset_id: &str) -> PathBuf {
        let mut dir = self.root.clone();
        push_sharded(&mut dir, owner_id);
        push_sharded(&mut dir, asset_id);
        dir
    }

    fn entry_path(&self, input: &FingerprintInput, fingerprint: &Fingerprint) -> PathBuf {
        let mut path = self.asset_dir(input.owner_id(), input.asset_id());
        push_sharded(&mut path, &fingerprint.to_hex());
        path
    }
}

/// Append `id` as shard levels plus the full id: `a/b/c/abc…`.
///
/// Ids shorter than the shard depth contribute fewer levels; the layout stays
/// deterministic either way.
fn push_sharded(path: &mut PathBuf, id: &str) {
    for ch in id.chars().take(SHARD_DEPTH) {
        path.push(ch.to_string());
    }
    path.push(id);
}

/// Depth-first subtree removal tolerant of concurrent readers and writers.
async fn remove_tree(path: &Path) {
    let mut reader = match fs::read_dir(path).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::NotFound => return,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to list cache subtree");
            return;
        }
    };

    loop {
        match reader.next_entry().await {
            Ok(Some(dirent)) => {
                let child = dirent.path();
                let is_dir = dirent
                    .file_type()
                    .await
                    .map(|file_type| file_type.is_dir())
                    .unwrap_or(false);

                if is_dir {
                    Box::pin(remove_tree(&child)).await;
                } else if let Err(err) = fs::remove_file(&child).await
                    && err.kind() != ErrorKind::NotFound
                {
                    warn!(error = %err, path = %child.display(), "failed to delete cache entry");
                }
            }
            Ok(None) => break,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(error = %err, path = %path.display(), "cache subtree walk failed");
                }
                break;
            }
        }
    }

    // A concurrent store may have repopulated the directory; leaving it
    // behind is fine, the entries inside were written after the deletion.
    if let Err(err) = fs::remove_dir(path).await
        && err.kind() != ErrorKind::NotFound
    {
        debug!(error = %err, path = %path.display(), "cache directory not removed");
    }
}
