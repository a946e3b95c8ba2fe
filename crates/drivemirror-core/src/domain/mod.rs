//! Domain types for the mirror
//!
//! - Newtypes for remote identifiers and content checksums
//! - Remote listing entries and their kinds
//! - The per-process checksum cache and the per-cycle remote path set
//! - The watermark threaded between sync cycles

pub mod checksum_cache;
pub mod entry;
pub mod errors;
pub mod newtypes;
pub mod remote_paths;
pub mod watermark;

pub use checksum_cache::ChecksumCache;
pub use entry::{EntryKind, RemoteEntry};
pub use errors::DomainError;
pub use newtypes::{ContentChecksum, RemoteId};
pub use remote_paths::RemotePathSet;
pub use watermark::Watermark;
