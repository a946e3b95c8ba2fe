//! drivemirror Daemon - keeps a local copy of a Drive folder
//!
//! This binary handles:
//! - Periodic one-way mirroring of a named Drive folder
//! - A read-only HTTP view of the mirrored tree
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Startup resolves configuration, prepares the download root and builds
//! the Drive adapter. The browser is bound before the first cycle, then the
//! [`SyncLoop`] runs on the main task until a signal cancels the shared
//! `CancellationToken`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use drivemirror_browse::BrowseServer;
use drivemirror_core::config::{Config, LoggingConfig};
use drivemirror_core::domain::Watermark;
use drivemirror_gdrive::{DriveClient, DriveRemoteStore};
use drivemirror_sync::{SyncEngine, SyncLoop};

// ============================================================================
// Command-line flags
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "drivemirrord",
    version,
    about = "Mirror a Google Drive folder to a local directory"
)]
struct Args {
    /// Name of the remote folder to mirror
    #[arg(long, value_name = "NAME")]
    folder_name: Option<String>,

    /// On the first cycle, only treat files modified in the last N seconds
    /// as changed (0 = all files)
    #[arg(long, value_name = "N")]
    seconds_ago: Option<u64>,

    /// Local directory that receives the mirror
    #[arg(long, value_name = "PATH")]
    download_root: Option<PathBuf>,

    /// Address for the read-only HTTP browser
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    /// Loads the configuration file and applies flag overrides.
    ///
    /// An explicit `--config` must load; the default path silently falls
    /// back to built-in defaults.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_or_default(&Config::default_path()),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(name) = &self.folder_name {
            config.sync.folder_name = name.clone();
        }
        if let Some(seconds) = self.seconds_ago {
            config.sync.initial_window_secs = seconds;
        }
        if let Some(root) = &self.download_root {
            config.sync.download_root = root.clone();
        }
        if let Some(addr) = &self.listen {
            config.server.listen_addr = addr.clone();
        }
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

fn init_logging(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Reads the Drive access token from the environment variable `var`.
fn read_access_token(var: &str) -> Result<String> {
    let token = std::env::var(var)
        .with_context(|| format!("Access token variable {var} is not set"))?;
    let token = token.trim();
    if token.is_empty() {
        bail!("Access token variable {var} is empty");
    }
    Ok(token.to_string())
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

async fn run(config: Config, shutdown: CancellationToken) -> Result<()> {
    let root = config.sync.download_root.clone();
    tokio::fs::create_dir_all(&root)
        .await
        .with_context(|| format!("Failed to create download root {}", root.display()))?;

    let token = read_access_token(&config.remote.access_token_env)?;
    let client = DriveClient::with_base_url(token, config.remote.api_base_url.clone());
    let store = Arc::new(DriveRemoteStore::new(client));

    let engine = SyncEngine::new(store, root.clone());
    let initial = Watermark::initial(config.sync.initial_window_secs, Utc::now());
    let sync_loop = SyncLoop::new(
        engine,
        config.sync.folder_name.clone(),
        Duration::from_secs(config.sync.poll_interval),
        initial,
    );

    let browse_task = if config.server.enabled {
        let server = BrowseServer::new(root.clone(), &config.server.listen_addr)?;
        let listener = server
            .bind()
            .await
            .context("Failed to start the browse server")?;
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, token.clone()).await {
                error!(error = %e, "Browse server failed");
                token.cancel();
            }
        }))
    } else {
        info!("Browse server disabled");
        None
    };

    let stats = sync_loop.run(shutdown.clone()).await;
    info!(
        cycles_ok = stats.cycles_ok,
        cycles_failed = stats.cycles_failed,
        "Sync loop finished"
    );

    shutdown.cancel();
    if let Some(task) = browse_task {
        if let Err(e) = task.await {
            error!(error = %e, "Browse server task panicked");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("config error: {e}");
        }
        bail!("Invalid configuration ({} errors)", errors.len());
    }

    init_logging(&config.logging);
    info!(
        folder = %config.sync.folder_name,
        root = %config.sync.download_root.display(),
        "drivemirror daemon starting (drivemirrord)"
    );

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = run(config, shutdown_token).await;

    match &result {
        Ok(()) => info!("drivemirror daemon shut down gracefully"),
        Err(e) => error!(error = %e, "drivemirror daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
