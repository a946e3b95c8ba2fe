//! One-way mirror engine
//!
//! The [`SyncEngine`] brings a local directory in line with one remote
//! folder tree, one cycle at a time.
//!
//! ## Cycle Flow
//!
//! 1. **Resolve**: Look up the root folder by name and list it. Failure here
//!    aborts the cycle before anything local is touched.
//! 2. **Mirror**: Walk the remote tree depth first, creating directories and
//!    downloading files whose checksum differs from the cache.
//! 3. **Prune**: Remove local paths the mirror phase did not mark.
//!
//! Failures below the root listing are confined to the branch or item that
//! produced them and are collected in the [`CycleReport`].

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use drivemirror_core::domain::{
    ChecksumCache, EntryKind, RemoteEntry, RemotePathSet, Watermark,
};
use drivemirror_core::ports::IRemoteStore;

use crate::filesystem;
use crate::prune;
use crate::SyncError;

// ============================================================================
// CycleReport
// ============================================================================

/// Summary of a completed sync cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// When the cycle began; the next watermark on success
    pub started_at: DateTime<Utc>,
    /// Files fetched from the remote store
    pub files_downloaded: u32,
    /// Files already on disk whose content hash matched the remote checksum
    pub files_verified: u32,
    /// Files skipped because the cache already held their checksum
    pub files_up_to_date: u32,
    /// Files skipped because they were not modified after the watermark
    pub files_unchanged: u32,
    /// Workspace documents ignored
    pub workspace_docs_skipped: u32,
    /// Remote folders visited
    pub folders_seen: u32,
    /// Local paths removed during pruning
    pub paths_pruned: u32,
    /// Total bytes written by downloads
    pub bytes_downloaded: u64,
    /// Errors encountered during the cycle (non-fatal)
    pub errors: Vec<String>,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            files_downloaded: 0,
            files_verified: 0,
            files_up_to_date: 0,
            files_unchanged: 0,
            workspace_docs_skipped: 0,
            folders_seen: 0,
            paths_pruned: 0,
            bytes_downloaded: 0,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// True when no item, branch or prune failure was recorded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::UpToDate => self.files_up_to_date += 1,
            FileOutcome::Unchanged => self.files_unchanged += 1,
            FileOutcome::Verified => self.files_verified += 1,
            FileOutcome::Downloaded { bytes } => {
                self.files_downloaded += 1;
                self.bytes_downloaded += bytes;
            }
        }
    }
}

/// What the download decision did for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Cached checksum matched; nothing done
    UpToDate,
    /// Not modified after the watermark and present locally; nothing done
    Unchanged,
    /// Local content hash matched; cache populated without downloading
    Verified,
    /// Content fetched and written
    Downloaded { bytes: u64 },
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Mirrors one remote folder tree onto a local directory
pub struct SyncEngine {
    store: Arc<dyn IRemoteStore>,
    download_root: PathBuf,
}

type BranchFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Mutable state threaded through one mirror pass
struct MirrorState<'a> {
    since: Watermark,
    remote_paths: RemotePathSet,
    cache: &'a mut ChecksumCache,
    report: CycleReport,
}

impl SyncEngine {
    /// Creates a new `SyncEngine`
    ///
    /// # Arguments
    /// * `store` - Remote store adapter to read from
    /// * `download_root` - Local directory that receives the mirror
    pub fn new(store: Arc<dyn IRemoteStore>, download_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            download_root: download_root.into(),
        }
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Runs one full sync cycle
    ///
    /// # Arguments
    /// * `root_folder_name` - Name of the remote folder to mirror
    /// * `since` - Watermark from the previous successful cycle
    /// * `cache` - Checksum cache, updated in place
    ///
    /// # Returns
    /// A [`CycleReport`] whose `started_at` is the next watermark. Only
    /// folder resolution, the root listing, or a missing download root
    /// produce an `Err`; nothing local is modified in that case.
    #[instrument(skip(self, since, cache), fields(since = %since))]
    pub async fn perform_cycle(
        &self,
        root_folder_name: &str,
        since: Watermark,
        cache: &mut ChecksumCache,
    ) -> Result<CycleReport, SyncError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let root_id = self
            .store
            .resolve_folder(root_folder_name)
            .await
            .map_err(SyncError::RemoteQuery)?
            .ok_or_else(|| SyncError::FolderNotFound(root_folder_name.to_string()))?;

        let children = self
            .store
            .list_children(&root_id)
            .await
            .map_err(SyncError::RemoteQuery)?;

        debug!(root_id = %root_id, children = children.len(), "Listed root folder");

        filesystem::ensure_directory(&self.download_root).await?;

        let mut state = MirrorState {
            since,
            remote_paths: RemotePathSet::new(&self.download_root),
            cache,
            report: CycleReport::new(started_at),
        };

        self.mirror_entries(children, &self.download_root, &mut state)
            .await;

        let MirrorState {
            remote_paths,
            cache,
            mut report,
            ..
        } = state;

        let pruned = prune::prune(&self.download_root, remote_paths, cache).await;
        report.paths_pruned = pruned.removed.len() as u32;
        for (path, err) in pruned.failed {
            report
                .errors
                .push(format!("prune {}: {err}", path.display()));
        }

        report.duration_ms = clock.elapsed().as_millis() as u64;

        info!(
            downloaded = report.files_downloaded,
            verified = report.files_verified,
            up_to_date = report.files_up_to_date,
            unchanged = report.files_unchanged,
            pruned = report.paths_pruned,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Sync cycle complete"
        );

        Ok(report)
    }

    /// Mirrors one folder level, recursing into sub-folders
    ///
    /// Folders are handled before files, and the first sibling to claim a
    /// local path keeps it; later siblings mapping to the same path are
    /// reported and left alone. Boxed because it recurses.
    fn mirror_entries<'a>(
        &'a self,
        mut entries: Vec<RemoteEntry>,
        parent: &'a Path,
        state: &'a mut MirrorState<'_>,
    ) -> BranchFuture<'a> {
        Box::pin(async move {
            entries.sort_by_key(|entry| entry.kind != EntryKind::Folder);
            let mut claimed: HashSet<PathBuf> = HashSet::new();

            for entry in entries {
                let local_path = match entry.local_path(parent) {
                    Ok(path) => path,
                    Err(err) => {
                        let err = SyncError::from(err);
                        warn!(id = %entry.id, %err, "Skipping remote entry");
                        state.report.errors.push(format!("{}: {err}", entry.id));
                        continue;
                    }
                };

                if entry.kind != EntryKind::WorkspaceDoc && !claimed.insert(local_path.clone()) {
                    let err = SyncError::NameCollision(local_path);
                    warn!(id = %entry.id, %err, "Skipping remote entry");
                    state.report.errors.push(format!("{}: {err}", entry.id));
                    continue;
                }

                match entry.kind {
                    EntryKind::Folder => {
                        state.remote_paths.mark(local_path.clone());
                        state.cache.invalidate(&local_path);
                        state.report.folders_seen += 1;
                        self.mirror_folder(&entry, &local_path, state).await;
                    }
                    EntryKind::WorkspaceDoc => {
                        debug!(path = %local_path.display(), "Skipping workspace document");
                        state.report.workspace_docs_skipped += 1;
                    }
                    EntryKind::File => {
                        state.remote_paths.mark(local_path.clone());
                        match self
                            .ensure_local(&entry, &local_path, state.since, state.cache)
                            .await
                        {
                            Ok(outcome) => state.report.record(outcome),
                            Err(err) => {
                                warn!(path = %local_path.display(), %err, "Failed to mirror file");
                                state
                                    .report
                                    .errors
                                    .push(format!("{}: {err}", local_path.display()));
                            }
                        }
                    }
                }
            }
        })
    }

    /// Creates the local directory for `folder` and mirrors its children.
    ///
    /// A failure here abandons this branch only.
    async fn mirror_folder(
        &self,
        folder: &RemoteEntry,
        local_path: &Path,
        state: &mut MirrorState<'_>,
    ) {
        if let Err(err) = filesystem::ensure_directory(local_path).await {
            warn!(path = %local_path.display(), %err, "Failed to create directory");
            state
                .report
                .errors
                .push(format!("{}: {err}", local_path.display()));
            return;
        }

        let children = match self.store.list_children(&folder.id).await {
            Ok(children) => children,
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(
                    folder = %folder.id,
                    path = %local_path.display(),
                    error = %detail,
                    "Failed to list folder; keeping local copy of this branch"
                );
                state.remote_paths.retain_subtree(local_path.to_path_buf());
                state
                    .report
                    .errors
                    .push(format!("{}: {detail}", local_path.display()));
                return;
            }
        };

        self.mirror_entries(children, local_path, state).await;
    }

    /// Decides whether `file` must be downloaded to `local_path` and does so
    ///
    /// # Arguments
    /// * `file` - Remote file entry
    /// * `local_path` - Where the file lives in the mirror
    /// * `since` - Current watermark
    /// * `cache` - Checksum cache; updated on download or verification,
    ///   cleared for this path on failure
    pub async fn ensure_local(
        &self,
        file: &RemoteEntry,
        local_path: &Path,
        since: Watermark,
        cache: &mut ChecksumCache,
    ) -> Result<FileOutcome, SyncError> {
        let checksum = file.checksum.as_ref();
        let present = filesystem::is_regular_file(local_path).await;

        if present && cache.is_current(local_path, checksum) {
            return Ok(FileOutcome::UpToDate);
        }

        if present && !cache.contains(local_path) {
            if !since.admits(file.modified) {
                debug!(path = %local_path.display(), "Not modified since watermark");
                return Ok(FileOutcome::Unchanged);
            }

            if let Some(expected) = checksum {
                match filesystem::sha256_file(local_path).await {
                    Ok(actual) if expected.matches_sha256_hex(&actual) => {
                        debug!(path = %local_path.display(), "Local content verified");
                        cache.record(local_path.to_path_buf(), expected.clone());
                        return Ok(FileOutcome::Verified);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        debug!(path = %local_path.display(), %err, "Could not hash local file");
                    }
                }
            }
        }

        match self.download(file, local_path).await {
            Ok(bytes) => {
                cache.invalidate_subtree(local_path);
                if let Some(checksum) = checksum {
                    cache.record(local_path.to_path_buf(), checksum.clone());
                }
                info!(path = %local_path.display(), bytes, "Downloaded file");
                Ok(FileOutcome::Downloaded { bytes })
            }
            Err(err) => {
                cache.invalidate(local_path);
                Err(err)
            }
        }
    }

    async fn download(&self, file: &RemoteEntry, local_path: &Path) -> Result<u64, SyncError> {
        let content = self
            .store
            .download_content(&file.id)
            .await
            .map_err(SyncError::Transfer)?;
        filesystem::write_stream_atomic(local_path, content).await
    }
}

#[cfg(test)]
mod tests {
    use drivemirror_core::domain::{ContentChecksum, RemoteId};
    use drivemirror_core::ports::InMemoryRemoteStore;
    use tempfile::TempDir;

    use super::*;

    fn id(s: &str) -> RemoteId {
        RemoteId::new(s).unwrap()
    }

    fn sum(s: &str) -> Option<ContentChecksum> {
        Some(ContentChecksum::new(s).unwrap())
    }

    fn setup() -> (Arc<InMemoryRemoteStore>, TempDir, SyncEngine) {
        let store = Arc::new(InMemoryRemoteStore::new());
        store.add_named_folder("agents", id("root"));
        let dir = TempDir::new().unwrap();
        let engine = SyncEngine::new(store.clone(), dir.path().join("mirror"));
        (store, dir, engine)
    }

    #[tokio::test]
    async fn test_missing_folder_is_cycle_fatal() {
        let (_store, _dir, engine) = setup();
        let mut cache = ChecksumCache::new();

        let err = engine
            .perform_cycle("nope", Watermark::Unbounded, &mut cache)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::FolderNotFound(ref name) if name == "nope"));
        assert!(!engine.download_root().exists());
    }

    #[tokio::test]
    async fn test_root_listing_failure_touches_nothing() {
        let (store, _dir, engine) = setup();
        std::fs::create_dir_all(engine.download_root()).unwrap();
        let stale = engine.download_root().join("stale.txt");
        std::fs::write(&stale, b"old").unwrap();
        store.set_fail_listing(&id("root"), true);

        let mut cache = ChecksumCache::new();
        cache.record(stale.clone(), ContentChecksum::new("H0").unwrap());

        let err = engine
            .perform_cycle("agents", Watermark::Unbounded, &mut cache)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RemoteQuery(_)));
        assert!(stale.exists());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_started_at_is_captured_at_entry() {
        let (_store, _dir, engine) = setup();
        let before = Utc::now();
        let report = engine
            .perform_cycle("agents", Watermark::Unbounded, &mut ChecksumCache::new())
            .await
            .unwrap();
        assert!(report.started_at >= before);
        assert!(report.started_at <= Utc::now());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_ensure_local_verifies_matching_local_content() {
        let (store, _dir, engine) = setup();
        let root = engine.download_root().to_path_buf();
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        // sha256("abc")
        let entry = RemoteEntry::file(
            id("f1"),
            "abc.txt",
            sum("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"),
            None,
        );
        let mut cache = ChecksumCache::new();

        let outcome = engine
            .ensure_local(&entry, &path, Watermark::Unbounded, &mut cache)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Verified);
        assert_eq!(store.download_count(), 0);
        assert_eq!(cache.get(&path), entry.checksum.as_ref());
    }

    #[tokio::test]
    async fn test_ensure_local_downloads_on_mismatch() {
        let (store, _dir, engine) = setup();
        let root = engine.download_root().to_path_buf();
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("a.txt");
        std::fs::write(&path, b"stale").unwrap();

        let entry = RemoteEntry::file(id("f1"), "a.txt", sum("H1"), None);
        store.put_file(&id("root"), entry.clone(), "fresh");
        let mut cache = ChecksumCache::new();

        let outcome = engine
            .ensure_local(&entry, &path, Watermark::Unbounded, &mut cache)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Downloaded { bytes: 5 });
        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
        assert_eq!(cache.get(&path), entry.checksum.as_ref());
    }

    #[tokio::test]
    async fn test_ensure_local_failure_clears_cache_entry() {
        let (store, _dir, engine) = setup();
        let root = engine.download_root().to_path_buf();
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("a.txt");

        let entry = RemoteEntry::file(id("f1"), "a.txt", sum("H2"), None);
        store.put_file(&id("root"), entry.clone(), "content");
        store.set_fail_download(&id("f1"), true);

        let mut cache = ChecksumCache::new();
        cache.record(path.clone(), ContentChecksum::new("H1").unwrap());

        let err = engine
            .ensure_local(&entry, &path, Watermark::Unbounded, &mut cache)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Transfer(_)));
        assert!(!cache.contains(&path));
    }

    #[tokio::test]
    async fn test_ensure_local_without_checksum_is_not_cached() {
        let (store, _dir, engine) = setup();
        let root = engine.download_root().to_path_buf();
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("raw.bin");

        let entry = RemoteEntry::file(id("f1"), "raw.bin", None, None);
        store.put_file(&id("root"), entry.clone(), "bytes");
        let mut cache = ChecksumCache::new();

        let outcome = engine
            .ensure_local(&entry, &path, Watermark::Unbounded, &mut cache)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Downloaded { bytes: 5 });
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_local_watermark_skips_old_present_file() {
        let (store, _dir, engine) = setup();
        let root = engine.download_root().to_path_buf();
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("old.txt");
        std::fs::write(&path, b"local").unwrap();

        let now = Utc::now();
        let entry = RemoteEntry::file(id("f1"), "old.txt", sum("H1"), None)
            .with_modified(now - chrono::Duration::hours(1));
        store.put_file(&id("root"), entry.clone(), "remote");
        let mut cache = ChecksumCache::new();

        let outcome = engine
            .ensure_local(&entry, &path, Watermark::Since(now), &mut cache)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Unchanged);
        assert_eq!(store.download_count(), 0);
        assert_eq!(std::fs::read(&path).unwrap(), b"local");
    }

    #[tokio::test]
    async fn test_ensure_local_watermark_still_fetches_missing_file() {
        let (store, _dir, engine) = setup();
        let root = engine.download_root().to_path_buf();
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("old.txt");

        let now = Utc::now();
        let entry = RemoteEntry::file(id("f1"), "old.txt", sum("H1"), None)
            .with_modified(now - chrono::Duration::hours(1));
        store.put_file(&id("root"), entry.clone(), "remote");

        let outcome = engine
            .ensure_local(&entry, &path, Watermark::Since(now), &mut ChecksumCache::new())
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Downloaded { bytes: 6 });
    }
}
