//! HTTP server for browsing the mirror
//!
//! Listens on `0.0.0.0:8080` by default. Binding is a separate step from
//! serving so a taken port fails startup before the first sync cycle.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::handler::handle_request;
use crate::BrowseError;

/// Read-only HTTP server over a local directory.
pub struct BrowseServer {
    root: Arc<PathBuf>,
    addr: SocketAddr,
}

impl BrowseServer {
    /// Creates a new `BrowseServer`.
    ///
    /// # Arguments
    /// * `root` - Directory to serve
    /// * `listen_addr` - Address to bind, e.g. `"0.0.0.0:8080"`
    pub fn new(root: impl Into<PathBuf>, listen_addr: &str) -> Result<Self, BrowseError> {
        let addr: SocketAddr = listen_addr
            .parse()
            .map_err(|_| BrowseError::InvalidAddress(listen_addr.to_string()))?;
        Ok(Self {
            root: Arc::new(root.into()),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, BrowseError> {
        TcpListener::bind(self.addr)
            .await
            .map_err(|source| BrowseError::Bind {
                addr: self.addr,
                source,
            })
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// is cancelled.
    ///
    /// Should be spawned as a background task. Connections still open when
    /// `shutdown` fires are left to finish on their own tasks.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), BrowseError> {
        let local = listener.local_addr()?;
        info!(addr = %local, root = %self.root.display(), "Browse server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    debug!(peer = %peer, "Accepted connection");

                    let io = TokioIo::new(stream);
                    let root = Arc::clone(&self.root);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let root = Arc::clone(&root);
                            async move { Ok::<_, Infallible>(handle_request(req, &root).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(error = %e, "Browse HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Browse server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
