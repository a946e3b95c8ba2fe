//! Media download and throttling tests

use drivemirror_core::domain::RemoteId;
use drivemirror_core::ports::IRemoteStore;
use drivemirror_gdrive::DriveError;
use futures_util::StreamExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::setup_drive_mock;

async fn collect(mut stream: drivemirror_core::ports::ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test]
async fn test_download_streams_media() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello drive".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let stream = store
        .download_content(&RemoteId::new("file-1").unwrap())
        .await
        .unwrap();
    assert_eq!(collect(stream).await, b"hello drive");
}

#[tokio::test]
async fn test_download_missing_file_is_not_found() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": 404, "message": "File not found: gone." }
        })))
        .mount(&server)
        .await;

    let err = match store.download_content(&RemoteId::new("gone").unwrap()).await {
        Ok(_) => panic!("download of a missing file should fail"),
        Err(err) => err,
    };
    match err.downcast_ref::<DriveError>() {
        Some(DriveError::NotFound(message)) => assert!(message.contains("File not found")),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files/file-1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/file-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"finally".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let stream = store
        .download_content(&RemoteId::new("file-1").unwrap())
        .await
        .unwrap();
    assert_eq!(collect(stream).await, b"finally");
}

#[tokio::test]
async fn test_throttling_gives_up_after_retries() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(4)
        .mount(&server)
        .await;

    let err = store.resolve_folder("agents").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::Throttled { attempts: 4 })
    ));
}
