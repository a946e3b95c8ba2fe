//! Process-lifetime record of the last known remote checksum per local path
//!
//! A path is present only if the engine downloaded or verified a file at
//! that path and has not since cleared it. The cache is owned by the sync
//! loop and lent to one cycle at a time, so it needs no locking.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::newtypes::ContentChecksum;

#[derive(Debug, Default, Clone)]
pub struct ChecksumCache {
    entries: HashMap<PathBuf, ContentChecksum>,
}

impl ChecksumCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the cached checksum for `path` equals `checksum`.
    ///
    /// An absent remote checksum never matches.
    pub fn is_current(&self, path: &Path, checksum: Option<&ContentChecksum>) -> bool {
        match (self.entries.get(path), checksum) {
            (Some(cached), Some(remote)) => cached == remote,
            _ => false,
        }
    }

    pub fn get(&self, path: &Path) -> Option<&ContentChecksum> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Record a successful download or verification.
    pub fn record(&mut self, path: PathBuf, checksum: ContentChecksum) {
        self.entries.insert(path, checksum);
    }

    /// Forget `path`, returning the checksum it had.
    pub fn invalidate(&mut self, path: &Path) -> Option<ContentChecksum> {
        self.entries.remove(path)
    }

    /// Forget `root` and every path below it. Returns how many entries went.
    pub fn invalidate_subtree(&mut self, root: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| !path.starts_with(root));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
