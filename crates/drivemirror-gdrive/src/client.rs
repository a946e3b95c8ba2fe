//! Google Drive v3 HTTP client
//!
//! Provides a typed HTTP client for the three Drive calls the mirror makes:
//! folder lookup by name, paged child listing and media download. Handles
//! the bearer header, query construction, status mapping and 429 back-off.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivemirror_gdrive::client::DriveClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! if let Some(id) = client.find_folder("agents").await? {
//!     let files = client.list_folder(&id).await?;
//!     println!("{} children", files.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use drivemirror_core::domain::RemoteId;
use drivemirror_core::ports::ByteStream;

use crate::DriveError;

/// Base URL for the Google Drive v3 API
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Prefix shared by every Drive-native document type
pub const WORKSPACE_MIME_PREFIX: &str = "application/vnd.google-apps.";

/// Largest page size `files.list` accepts
const PAGE_SIZE: &str = "1000";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime, sha256Checksum)";

const RESOLVE_FIELDS: &str = "files(id, name)";

// ============================================================================
// Drive API response types
// ============================================================================

/// One page of a `files.list` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    /// Present while more pages remain
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// File resource as returned by `files.list`
///
/// Only the fields requested through `fields=` are populated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub modified_time: Option<DateTime<Utc>>,
    /// Hex SHA-256 of the content; absent for folders and Drive-native docs
    pub sha256_checksum: Option<String>,
}

/// Standard Google API error envelope
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ============================================================================
// DriveClient
// ============================================================================

/// Retry-After used when a 429 carries no usable header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Upper bound on a single back-off, whatever the server asks for
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Retries after the first 429; the request is sent at most this plus one times
const DEFAULT_MAX_RETRIES: u32 = 3;

/// HTTP client for Google Drive v3 calls
///
/// Wraps `reqwest::Client` with the bearer header and base URL construction.
/// Read-only: nothing here creates, modifies or trashes remote files.
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    ///
    /// # Arguments
    /// * `access_token` - An OAuth2 access token with a Drive read scope
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DRIVE_BASE_URL)
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - An OAuth2 access token
    /// * `base_url` - Base URL that `/files` is appended to
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an authenticated request against `base_url + path`
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url).bearer_auth(&self.access_token)
    }

    /// Looks up a folder by exact name
    ///
    /// # Arguments
    /// * `name` - Folder name; quotes and backslashes are escaped
    ///
    /// # Returns
    /// The id of the first non-trashed folder with that name, or `None`
    pub async fn find_folder(&self, name: &str) -> Result<Option<RemoteId>> {
        let q = format!(
            "mimeType='{}' and name='{}' and trashed = false",
            FOLDER_MIME_TYPE,
            escape_query_value(name)
        );
        debug!(name, "Resolving folder by name");

        let response = self
            .execute_with_retry(
                "/files",
                &[("q", q.as_str()), ("pageSize", "1"), ("fields", RESOLVE_FIELDS)],
            )
            .await
            .with_context(|| format!("Failed to resolve folder {name:?}"))?;
        let page: FileListResponse = parse_json(response)
            .await
            .context("Failed to parse folder lookup response")?;

        match page.files.into_iter().next() {
            Some(file) => {
                let id = RemoteId::new(file.id).context("Drive returned an invalid folder id")?;
                debug!(name, id = %id, "Folder resolved");
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Lists every non-trashed child of a folder, following pagination
    ///
    /// # Arguments
    /// * `folder_id` - Id of the parent folder
    pub async fn list_folder(&self, folder_id: &RemoteId) -> Result<Vec<DriveFile>> {
        let q = format!(
            "'{}' in parents and trashed = false",
            escape_query_value(folder_id.as_str())
        );
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut query = vec![
                ("q", q.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .execute_with_retry("/files", &query)
                .await
                .with_context(|| format!("Failed to list folder {}", folder_id))?;
            let page: FileListResponse = parse_json(response)
                .await
                .context("Failed to parse folder listing")?;

            pages += 1;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(folder = %folder_id, pages, entries = files.len(), "Listed folder");
        Ok(files)
    }

    /// Opens the content of a file as a byte stream
    ///
    /// Makes `GET /files/{id}?alt=media`. The body is not buffered; chunk
    /// errors surface through the stream.
    pub async fn download(&self, file_id: &RemoteId) -> Result<ByteStream> {
        let path = format!("/files/{}", file_id.as_str());
        debug!(id = %file_id, "Starting download");

        let response = self
            .execute_with_retry(&path, &[("alt", "media")])
            .await
            .with_context(|| format!("Failed to download file {}", file_id))?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.context("Failed to read download body"))
            .boxed();
        Ok(stream)
    }

    // ========================================================================
    // 429 handling
    // ========================================================================

    /// Sends a GET and retries on HTTP 429.
    ///
    /// Each retry waits for the server's `Retry-After` (capped). Any other
    /// non-success status is mapped to a [`DriveError`] without retrying.
    pub async fn execute_with_retry(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, DriveError> {
        let mut attempt = 0u32;

        loop {
            let response = self.request(Method::GET, path).query(query).send().await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if attempt > 0 {
                    info!(path, attempt, "Request succeeded after retry");
                }
                return check_status(response).await;
            }

            if attempt >= DEFAULT_MAX_RETRIES {
                warn!(path, attempts = attempt + 1, "429 retry limit exhausted");
                return Err(DriveError::Throttled {
                    attempts: attempt + 1,
                });
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                .unwrap_or(DEFAULT_RETRY_AFTER);

            info!(
                path,
                attempt,
                retry_after_ms = retry_after.as_millis() as u64,
                "Received 429, backing off"
            );
            tokio::time::sleep(retry_after).await;
            attempt += 1;
        }
    }
}

/// Escapes a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Parses a `Retry-After` value (delta-seconds or HTTP-date), capped at 30 s.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        let wait = date.with_timezone(&Utc) - Utc::now();
        return wait.to_std().unwrap_or(Duration::ZERO).min(MAX_RETRY_AFTER);
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}

async fn check_status(response: Response) -> Result<Response, DriveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body
            }
        });

    debug!(status = status.as_u16(), url = %url, message = %message, "Drive request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED => DriveError::Unauthorized(message),
        StatusCode::NOT_FOUND => DriveError::NotFound(format!("{url}: {message}")),
        _ => DriveError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, DriveError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| DriveError::InvalidResponse(e.to_string()))
}
