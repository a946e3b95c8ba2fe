//! drivemirror Google Drive - Drive v3 REST adapter
//!
//! Provides:
//! - A typed HTTP client for the few Drive endpoints the mirror needs
//! - An [`IRemoteStore`](drivemirror_core::ports::IRemoteStore) implementation
//!   on top of it
//!
//! ## Modules
//!
//! - [`client`] - Drive v3 HTTP client (listing, folder lookup, media download)
//! - [`provider`] - `DriveRemoteStore`, the remote store port adapter

pub mod client;
pub mod provider;

pub use client::DriveClient;
pub use provider::DriveRemoteStore;

use thiserror::Error;

/// Errors returned by the Google Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// The access token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested file or folder does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Still throttled after every retry was spent
    #[error("Too many requests: gave up after {attempts} attempts")]
    Throttled {
        /// Number of requests sent, including the first
        attempts: u32,
    },

    /// Any other non-success status
    #[error("Drive API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the error body
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DriveError::Api {
            status: 500,
            message: "backend error".to_string(),
        };
        assert_eq!(err.to_string(), "Drive API error 500: backend error");

        let err = DriveError::Throttled { attempts: 4 };
        assert!(err.to_string().contains("4 attempts"));

        let err = DriveError::NotFound("files/abc".to_string());
        assert_eq!(err.to_string(), "Not found: files/abc");
    }
}
