//! DriveRemoteStore - IRemoteStore implementation for Google Drive
//!
//! Wraps the [`DriveClient`] and converts Drive file resources into
//! [`RemoteEntry`] values.
//!
//! ## Design Notes
//!
//! - Kind is decided from the MIME type alone. Drive-native documents
//!   (Docs, Sheets, Slides, ...) have no byte-for-byte content and become
//!   [`EntryKind::WorkspaceDoc`].
//! - An entry with an unusable id fails the whole listing. The engine then
//!   keeps that folder's local copy instead of pruning the entry.

use anyhow::{Context, Result};
use tracing::warn;

use drivemirror_core::domain::{ContentChecksum, DomainError, EntryKind, RemoteEntry, RemoteId};
use drivemirror_core::ports::{ByteStream, IRemoteStore};

use crate::client::{DriveClient, DriveFile, FOLDER_MIME_TYPE, WORKSPACE_MIME_PREFIX};

/// Google Drive adapter for the remote store port
#[derive(Debug, Clone)]
pub struct DriveRemoteStore {
    client: DriveClient,
}

impl DriveRemoteStore {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

/// Maps a Drive MIME type to the mirror's entry kind.
pub fn kind_for_mime(mime_type: Option<&str>) -> EntryKind {
    match mime_type {
        Some(FOLDER_MIME_TYPE) => EntryKind::Folder,
        Some(mime) if mime.starts_with(WORKSPACE_MIME_PREFIX) => EntryKind::WorkspaceDoc,
        _ => EntryKind::File,
    }
}

/// Converts a Drive file resource into a [`RemoteEntry`].
///
/// # Errors
/// Returns `DomainError::InvalidRemoteId` when the id is not a valid
/// [`RemoteId`]
pub fn entry_from_drive_file(file: DriveFile) -> Result<RemoteEntry, DomainError> {
    let id = RemoteId::new(file.id.clone()).map_err(|err| {
        warn!(name = %file.name, error = %err, "Drive entry has an invalid id");
        err
    })?;

    let modified = file.modified_time;
    let mut entry = match kind_for_mime(file.mime_type.as_deref()) {
        EntryKind::Folder => RemoteEntry::folder(id, file.name),
        EntryKind::WorkspaceDoc => RemoteEntry::workspace_doc(id, file.name),
        EntryKind::File => {
            let checksum = file
                .sha256_checksum
                .and_then(|sum| ContentChecksum::new(sum).ok());
            RemoteEntry::file(id, file.name, checksum, modified)
        }
    };

    entry.modified = modified;
    Ok(entry)
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn resolve_folder(&self, name: &str) -> Result<Option<RemoteId>> {
        self.client.find_folder(name).await
    }

    async fn list_children(&self, folder_id: &RemoteId) -> Result<Vec<RemoteEntry>> {
        let files = self.client.list_folder(folder_id).await?;
        files
            .into_iter()
            .map(entry_from_drive_file)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Listing of folder {folder_id} has an unusable entry"))
    }

    async fn download_content(&self, file_id: &RemoteId) -> Result<ByteStream> {
        self.client.download(file_id).await
    }
}
