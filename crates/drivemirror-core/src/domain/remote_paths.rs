//! The set of local paths that still exist remotely, rebuilt every cycle
//!
//! The mirror phase marks paths; the prune phase deletes whatever it finds
//! on disk that was not marked.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RemotePathSet {
    live: HashSet<PathBuf>,
    retained: Vec<PathBuf>,
}

impl RemotePathSet {
    /// Create a set with `root` already marked live.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut live = HashSet::new();
        live.insert(root.into());
        Self {
            live,
            retained: Vec::new(),
        }
    }

    /// Mark a path as existing remotely.
    pub fn mark(&mut self, path: PathBuf) {
        self.live.insert(path);
    }

    /// Treat `path` and everything below it as live.
    ///
    /// Used when a folder could not be listed: its remote contents are
    /// unknown this cycle, so the local copy is kept as-is.
    pub fn retain_subtree(&mut self, path: PathBuf) {
        self.live.insert(path.clone());
        self.retained.push(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.live.contains(path) || self.retained.iter().any(|r| path.starts_with(r))
    }

    /// Number of explicitly marked paths, root included.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
