//! Shared test helpers for Drive API integration tests
//!
//! Provides a wiremock server plus a store pointed at it, and builders for
//! `files.list` JSON bodies.

use serde_json::{json, Value};
use wiremock::MockServer;

use drivemirror_gdrive::{DriveClient, DriveRemoteStore};

pub const TOKEN: &str = "test-access-token";

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Starts a mock server and returns it with a store targeting it.
pub async fn setup_drive_mock() -> (MockServer, DriveRemoteStore) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url(TOKEN, server.uri());
    (server, DriveRemoteStore::new(client))
}

pub fn file_json(id: &str, name: &str, mime: &str, sha256: Option<&str>) -> Value {
    let mut file = json!({
        "id": id,
        "name": name,
        "mimeType": mime,
        "modifiedTime": "2024-03-01T10:00:00.000Z"
    });
    if let Some(sum) = sha256 {
        file["sha256Checksum"] = json!(sum);
    }
    file
}

pub fn page(files: Vec<Value>, next_page_token: Option<&str>) -> Value {
    let mut body = json!({ "files": files });
    if let Some(token) = next_page_token {
        body["nextPageToken"] = json!(token);
    }
    body
}
