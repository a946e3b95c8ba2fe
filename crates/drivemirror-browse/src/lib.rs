//! drivemirror Browse - read-only HTTP view of the mirrored tree
//!
//! Serves the download root over plain HTTP: directories as JSON name
//! lists, files as raw bytes. The server never writes under the root.
//!
//! ## Modules
//!
//! - [`handler`] - request path resolution and response building
//! - [`server`] - hyper http1 accept loop with cancellation

pub mod handler;
pub mod server;

pub use handler::handle_request;
pub use server::BrowseServer;

use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while starting or running the browser
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The configured listen address is not a socket address
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// The listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the listening socket
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
