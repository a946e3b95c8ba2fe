//! Port definitions (hexagonal architecture interfaces)
//!
//! The sync engine depends on these traits; their implementations live in
//! adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Read access to a hierarchical remote file store
//! - [`InMemoryRemoteStore`] - Deterministic in-process implementation of
//!   [`IRemoteStore`] used by tests

pub mod memory;
pub mod remote_store;

pub use memory::InMemoryRemoteStore;
pub use remote_store::{ByteStream, IRemoteStore};
