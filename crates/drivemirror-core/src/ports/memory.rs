//! In-memory remote store
//!
//! A deterministic [`IRemoteStore`] backed by hash maps. Tests build a remote
//! tree with it, mutate it between cycles, inject failures, and count how
//! many downloads the engine performed.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};

use super::remote_store::{ByteStream, IRemoteStore};
use crate::domain::{RemoteEntry, RemoteId};

#[derive(Debug, Default)]
struct State {
    folders_by_name: HashMap<String, RemoteId>,
    children: HashMap<RemoteId, Vec<RemoteEntry>>,
    contents: HashMap<RemoteId, Bytes>,
    failing_listings: HashSet<RemoteId>,
    failing_downloads: HashSet<RemoteId>,
    truncated_downloads: HashSet<RemoteId>,
    fail_resolve: bool,
    downloads: Vec<RemoteId>,
    listings: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<State>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `name` resolvable to the folder `id`.
    pub fn add_named_folder(&self, name: impl Into<String>, id: RemoteId) {
        let mut state = self.state();
        state.children.entry(id.clone()).or_default();
        state.folders_by_name.insert(name.into(), id);
    }

    /// Insert or replace a child of `parent`, matched by identifier.
    pub fn put_entry(&self, parent: &RemoteId, entry: RemoteEntry) {
        let mut state = self.state();
        if entry.kind == crate::domain::EntryKind::Folder {
            state.children.entry(entry.id.clone()).or_default();
        }
        let siblings = state.children.entry(parent.clone()).or_default();
        match siblings.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => siblings.push(entry),
        }
    }

    /// Insert or replace a file child of `parent` together with its content.
    pub fn put_file(&self, parent: &RemoteId, entry: RemoteEntry, content: impl Into<Bytes>) {
        let id = entry.id.clone();
        self.put_entry(parent, entry);
        self.state().contents.insert(id, content.into());
    }

    /// Remove the child `id` from `parent`. Returns whether it was present.
    pub fn remove_entry(&self, parent: &RemoteId, id: &RemoteId) -> bool {
        let mut state = self.state();
        let Some(siblings) = state.children.get_mut(parent) else {
            return false;
        };
        let before = siblings.len();
        siblings.retain(|e| &e.id != id);
        before != siblings.len()
    }

    /// Make every `resolve_folder` call fail with a transport error.
    pub fn set_fail_resolve(&self, fail: bool) {
        self.state().fail_resolve = fail;
    }

    /// Make listing `folder_id` fail until cleared.
    pub fn set_fail_listing(&self, folder_id: &RemoteId, fail: bool) {
        let mut state = self.state();
        if fail {
            state.failing_listings.insert(folder_id.clone());
        } else {
            state.failing_listings.remove(folder_id);
        }
    }

    /// Make opening `file_id` fail until cleared.
    pub fn set_fail_download(&self, file_id: &RemoteId, fail: bool) {
        let mut state = self.state();
        if fail {
            state.failing_downloads.insert(file_id.clone());
        } else {
            state.failing_downloads.remove(file_id);
        }
    }

    /// Make the content stream of `file_id` error after its first chunk.
    pub fn set_truncate_download(&self, file_id: &RemoteId, truncate: bool) {
        let mut state = self.state();
        if truncate {
            state.truncated_downloads.insert(file_id.clone());
        } else {
            state.truncated_downloads.remove(file_id);
        }
    }

    /// Identifiers of every file opened so far, in order.
    pub fn downloads(&self) -> Vec<RemoteId> {
        self.state().downloads.clone()
    }

    pub fn download_count(&self) -> usize {
        self.state().downloads.len()
    }

    pub fn listing_count(&self) -> usize {
        self.state().listings
    }
}

#[async_trait::async_trait]
impl IRemoteStore for InMemoryRemoteStore {
    async fn resolve_folder(&self, name: &str) -> anyhow::Result<Option<RemoteId>> {
        let state = self.state();
        if state.fail_resolve {
            return Err(anyhow!("simulated transport failure resolving {name}"));
        }
        Ok(state.folders_by_name.get(name).cloned())
    }

    async fn list_children(&self, folder_id: &RemoteId) -> anyhow::Result<Vec<RemoteEntry>> {
        let mut state = self.state();
        state.listings += 1;
        if state.failing_listings.contains(folder_id) {
            return Err(anyhow!("simulated listing failure for {folder_id}"));
        }
        state
            .children
            .get(folder_id)
            .cloned()
            .ok_or_else(|| anyhow!("folder not found: {folder_id}"))
    }

    async fn download_content(&self, file_id: &RemoteId) -> anyhow::Result<ByteStream> {
        let mut state = self.state();
        state.downloads.push(file_id.clone());
        if state.failing_downloads.contains(file_id) {
            return Err(anyhow!("simulated download failure for {file_id}"));
        }
        let content = state
            .contents
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow!("no content for {file_id}"))?;

        if state.truncated_downloads.contains(file_id) {
            let head = content.slice(..content.len() / 2);
            let failure = anyhow!("simulated connection reset for {file_id}");
            return Ok(stream::iter(vec![Ok(head), Err(failure)]).boxed());
        }
        Ok(stream::once(async move { Ok(content) }).boxed())
    }
}
