//! Pruning of local paths that no longer exist remotely
//!
//! The local tree is walked after the mirror phase. Every path not in the
//! cycle's [`RemotePathSet`] is stale. Stale paths are removed deepest
//! first: sorting by descending path length guarantees a child is always
//! handled before any of its ancestors, so directories are removed with a
//! plain `remove_dir` once they are empty.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use drivemirror_core::domain::{ChecksumCache, RemotePathSet};

/// Outcome of one pruning pass
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Paths removed, in deletion order
    pub removed: Vec<PathBuf>,
    /// Paths whose removal failed, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Ancestors of failed paths that were left alone this pass
    pub skipped: Vec<PathBuf>,
}

/// Every path under `root` that is absent from `remote_paths`, deepest first.
///
/// The root itself is never returned. Symlinks are reported but not
/// followed. Unreadable directories are logged and skipped.
pub fn collect_stale(root: &Path, remote_paths: &RemotePathSet) -> Vec<PathBuf> {
    let mut stale = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        match entry {
            Ok(entry) => {
                if !remote_paths.contains(entry.path()) {
                    stale.push(entry.into_path());
                }
            }
            Err(err) => {
                warn!(error = %err, "Skipping unreadable path during prune walk");
            }
        }
    }
    sort_deepest_first(&mut stale);
    stale
}

/// Sort by descending byte length, ties broken by reverse path order.
pub fn sort_deepest_first(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| {
        b.as_os_str()
            .len()
            .cmp(&a.as_os_str().len())
            .then_with(|| b.cmp(a))
    });
}

/// Remove every stale path under `root` and drop their cache entries.
///
/// Individual failures are logged and recorded; they never stop the pass.
pub async fn prune(
    root: &Path,
    remote_paths: RemotePathSet,
    cache: &mut ChecksumCache,
) -> PruneReport {
    debug!(live = remote_paths.len(), root = %root.display(), "Collecting stale paths");
    let walk_root = root.to_path_buf();
    let stale = match tokio::task::spawn_blocking(move || collect_stale(&walk_root, &remote_paths))
        .await
    {
        Ok(stale) => stale,
        Err(err) => {
            error!(error = %err, "Prune walk task failed");
            return PruneReport::default();
        }
    };

    remove_stale(stale, cache).await
}

/// Remove `stale` paths in the given order.
///
/// `stale` must already be sorted deepest first. When a path fails to go,
/// its ancestors later in the list are skipped rather than attempted while
/// still non-empty.
pub async fn remove_stale(stale: Vec<PathBuf>, cache: &mut ChecksumCache) -> PruneReport {
    let mut report = PruneReport::default();

    for path in stale {
        if report
            .failed
            .iter()
            .any(|(failed, _)| failed.starts_with(&path))
        {
            debug!(path = %path.display(), "Skipping ancestor of a path that could not be removed");
            report.skipped.push(path);
            continue;
        }

        match remove_one(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "Pruned local path");
                cache.invalidate(&path);
                cache.invalidate_subtree(&path);
                report.removed.push(path);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to prune local path");
                report.failed.push((path, err.to_string()));
            }
        }
    }

    report
}

async fn remove_one(path: &Path) -> std::io::Result<()> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if meta.is_dir() {
        tokio::fs::remove_dir(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
