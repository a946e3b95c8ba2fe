//! Remote store port (driven/secondary port)
//!
//! This module defines the read-only interface the sync engine uses to
//! walk a remote folder tree and fetch file content. The production adapter
//! targets Google Drive; tests use [`super::InMemoryRemoteStore`].
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific;
//!   the engine classifies them by the operation that failed.
//! - Uses `#[async_trait]` for async trait methods.
//! - Listings are always complete. Change detection by modification time
//!   happens in the engine against [`RemoteEntry::modified`].

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::domain::{RemoteEntry, RemoteId};

/// Byte content of a remote file, delivered in chunks
pub type ByteStream = BoxStream<'static, anyhow::Result<Bytes>>;

/// Port trait for a hierarchical remote file store
///
/// ## Implementation Notes
///
/// - Implementations own their transport concerns (auth headers, paging,
///   throttling). The engine imposes no deadlines of its own.
/// - Trashed or deleted items must not be returned by [`list_children`].
///
/// [`list_children`]: IRemoteStore::list_children
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Resolves a folder name to its identifier
    ///
    /// # Arguments
    /// * `name` - Human-readable folder name
    ///
    /// # Returns
    /// The identifier of the first matching folder, or `None` when no
    /// folder has that name
    async fn resolve_folder(&self, name: &str) -> anyhow::Result<Option<RemoteId>>;

    /// Lists the immediate children of a folder
    ///
    /// # Arguments
    /// * `folder_id` - Identifier of the folder to list
    ///
    /// # Returns
    /// Every live child (folders, files and workspace documents), with
    /// pagination already followed
    async fn list_children(&self, folder_id: &RemoteId) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Opens the byte content of a file
    ///
    /// # Arguments
    /// * `file_id` - Identifier of the file to download
    ///
    /// # Returns
    /// A stream of content chunks; a chunk error aborts the transfer
    async fn download_content(&self, file_id: &RemoteId) -> anyhow::Result<ByteStream>;
}
