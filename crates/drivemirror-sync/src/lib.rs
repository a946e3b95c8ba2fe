//! drivemirror Sync - One-way mirror engine
//!
//! Provides:
//! - Recursive mirroring of a remote folder tree onto a local directory
//! - Checksum-gated downloads with atomic replacement
//! - Pruning of local paths that no longer exist remotely
//! - A fixed-delay polling loop with cooperative shutdown
//!
//! ## Modules
//!
//! - [`engine`] - Sync cycle orchestration (resolve, mirror, prune)
//! - [`filesystem`] - Local filesystem helpers (atomic writes, SHA-256)
//! - [`prune`] - Stale path collection and child-before-parent deletion
//! - [`scheduler`] - The polling loop that owns the watermark and cache

pub mod engine;
pub mod filesystem;
pub mod prune;
pub mod scheduler;

pub use engine::{CycleReport, FileOutcome, SyncEngine};
pub use prune::PruneReport;
pub use scheduler::{LoopStats, SyncLoop};

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The named root folder does not exist remotely
    #[error("Remote folder not found: {0}")]
    FolderNotFound(String),

    /// Resolving or listing a remote folder failed
    #[error("Remote query failed: {0:#}")]
    RemoteQuery(anyhow::Error),

    /// Opening or streaming remote content failed
    #[error("Transfer failed: {0:#}")]
    Transfer(anyhow::Error),

    /// Another entry in the same remote folder already maps to this path
    #[error("Local path already claimed by a sibling: {}", .0.display())]
    NameCollision(std::path::PathBuf),

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A domain-level error propagated from drivemirror-core
    #[error("Domain error: {0}")]
    DomainError(#[from] drivemirror_core::domain::DomainError),
}

impl SyncError {
    /// True for failures that abort a whole cycle and keep the previous
    /// watermark.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(self, SyncError::FolderNotFound(_) | SyncError::RemoteQuery(_))
    }
}
