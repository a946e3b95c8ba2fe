//! Local filesystem helpers for the mirror
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: Content is streamed to a hidden sibling file and
//!   renamed over the target, so a reader never sees a half-written file
//!   at the final path.
//! - **SHA-256**: Local content is hashed with the same algorithm Drive
//!   reports, so a cold checksum cache can verify files without downloading.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument};

use drivemirror_core::ports::ByteStream;

use crate::SyncError;

/// Suffix of in-progress download files.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Sibling path used while downloading `target`.
///
/// Hidden, unique per attempt, and never a valid remote name collision in
/// practice.
pub fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_name = format!(".{name}.{}{PARTIAL_SUFFIX}", uuid::Uuid::new_v4().simple());
    target.with_file_name(tmp_name)
}

/// Stream `content` into `target`, replacing whatever is there.
///
/// Returns the number of bytes written. On failure the partial file is
/// removed and `target` is left as it was.
#[instrument(skip(content), fields(path = %target.display()))]
pub async fn write_stream_atomic(target: &Path, mut content: ByteStream) -> Result<u64, SyncError> {
    let tmp_path = partial_path(target);
    debug!(tmp_path = %tmp_path.display(), "writing to temporary file");

    let result: Result<u64, SyncError> = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        let mut written = 0u64;
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(SyncError::Transfer)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // A directory at the target means the remote entry changed kind.
        if let Ok(meta) = tokio::fs::symlink_metadata(target).await {
            if meta.is_dir() {
                debug!("removing directory occupying file path");
                tokio::fs::remove_dir_all(target).await?;
            }
        }

        tokio::fs::rename(&tmp_path, target).await?;
        Ok(written)
    }
    .await;

    match result {
        Ok(written) => {
            debug!(bytes = written, "write complete");
            Ok(written)
        }
        Err(err) => {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    debug!(error = %cleanup, "failed to remove partial file");
                }
            }
            Err(err)
        }
    }
}

/// Make sure `path` is a directory.
///
/// Returns `true` if it had to be created. A non-directory occupying the
/// path is removed first.
pub async fn ensure_directory(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => {
            debug!(path = %path.display(), "removing non-directory occupying folder path");
            tokio::fs::remove_file(path).await?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(path).await?;
    Ok(true)
}

/// True if `path` is a regular file (symlinks are not followed).
pub async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Lowercase hex SHA-256 of the file at `path`.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
