//! drivemirror Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemoteEntry`, `ChecksumCache`, `RemotePathSet`, `Watermark`
//! - **Port definitions** - The `IRemoteStore` trait that remote adapters implement,
//!   plus an in-memory adapter used by tests and local experiments
//! - **Configuration** - The YAML-backed `Config` shared by the daemon and adapters
//!
//! # Architecture
//!
//! The domain module is pure data and bookkeeping with no I/O.
//! Ports define the trait interfaces that adapter crates implement.
//! The sync engine in `drivemirror-sync` orchestrates both.

pub mod config;
pub mod domain;
pub mod ports;
