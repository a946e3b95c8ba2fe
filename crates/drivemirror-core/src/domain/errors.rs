//! Domain error types
//!
//! Validation failures raised while turning remote listing data into
//! domain values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid content checksum
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    /// Remote entry name cannot be used as a single local path component
    #[error("Unsafe entry name: {0:?}")]
    UnsafeName(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
