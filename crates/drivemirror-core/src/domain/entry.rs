//! Remote listing entries
//!
//! A [`RemoteEntry`] is produced fresh by every listing call and never
//! persisted. Its [`EntryKind`] decides how the mirror treats it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ContentChecksum, RemoteId};

/// What a remote entry is, as far as mirroring is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Regular file with downloadable byte content
    File,
    /// Container node that is recursed into
    Folder,
    /// Remote-native document with no byte-for-byte original; never mirrored
    WorkspaceDoc,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Folder => write!(f, "folder"),
            EntryKind::WorkspaceDoc => write!(f, "workspace_doc"),
        }
    }
}

/// One immediate child of a remote folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: RemoteId,
    pub name: String,
    pub kind: EntryKind,
    /// Content checksum; files only, and may be absent even for files
    pub checksum: Option<ContentChecksum>,
    /// Last modification time as reported by the store
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// Build a regular file entry.
    pub fn file(
        id: RemoteId,
        name: impl Into<String>,
        checksum: Option<ContentChecksum>,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: EntryKind::File,
            checksum,
            modified,
        }
    }

    /// Build a folder entry.
    pub fn folder(id: RemoteId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: EntryKind::Folder,
            checksum: None,
            modified: None,
        }
    }

    /// Build a workspace document entry.
    pub fn workspace_doc(id: RemoteId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: EntryKind::WorkspaceDoc,
            checksum: None,
            modified: None,
        }
    }

    /// Attach a modification time.
    #[must_use]
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Local path of this entry below `parent`.
    ///
    /// # Errors
    /// Returns [`DomainError::UnsafeName`] if the name is empty, `.` or `..`,
    /// or contains a path separator or NUL, since joining it would escape
    /// or alias the parent directory.
    pub fn local_path(&self, parent: &Path) -> Result<PathBuf, DomainError> {
        let name = self.name.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\0')
        {
            return Err(DomainError::UnsafeName(self.name.clone()));
        }
        Ok(parent.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RemoteId {
        RemoteId::new(s).unwrap()
    }

    #[test]
    fn test_local_path_joins_name() {
        let entry = RemoteEntry::folder(id("f1"), "sub");
        assert_eq!(
            entry.local_path(Path::new("/mirror")).unwrap(),
            PathBuf::from("/mirror/sub")
        );
    }

    #[test]
    fn test_local_path_rejects_traversal_names() {
        for bad in ["", ".", "..", "a/b", "../x", "nul\0byte"] {
            let entry = RemoteEntry::file(id("x"), bad, None, None);
            assert_eq!(
                entry.local_path(Path::new("/mirror")),
                Err(DomainError::UnsafeName(bad.to_string())),
                "name {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_names_with_dots_are_allowed() {
        let entry = RemoteEntry::file(id("x"), "..hidden", None, None);
        assert!(entry.local_path(Path::new("/mirror")).is_ok());
    }

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(RemoteEntry::folder(id("a"), "a").kind, EntryKind::Folder);
        assert_eq!(
            RemoteEntry::workspace_doc(id("b"), "b").kind,
            EntryKind::WorkspaceDoc
        );
        assert_eq!(
            RemoteEntry::file(id("c"), "c", None, None).kind,
            EntryKind::File
        );
        assert_eq!(EntryKind::WorkspaceDoc.to_string(), "workspace_doc");
    }
}
