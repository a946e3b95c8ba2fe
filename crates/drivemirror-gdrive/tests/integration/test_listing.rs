//! Folder lookup and listing tests

use drivemirror_core::domain::{DomainError, EntryKind, RemoteId};
use drivemirror_core::ports::IRemoteStore;
use drivemirror_gdrive::DriveError;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{file_json, page, setup_drive_mock, FOLDER_MIME, TOKEN};

#[tokio::test]
async fn test_resolve_folder_by_name() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(query_param(
            "q",
            "mimeType='application/vnd.google-apps.folder' and name='agents' and trashed = false",
        ))
        .and(query_param("pageSize", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![serde_json::json!({ "id": "folder-123", "name": "agents" })],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let id = store.resolve_folder("agents").await.unwrap();
    assert_eq!(id, Some(RemoteId::new("folder-123").unwrap()));
}

#[tokio::test]
async fn test_resolve_missing_folder_returns_none() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], None)))
        .mount(&server)
        .await;

    assert_eq!(store.resolve_folder("nowhere").await.unwrap(), None);
}

#[tokio::test]
async fn test_resolve_escapes_quotes_in_name() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param(
            "q",
            "mimeType='application/vnd.google-apps.folder' and name='bob\\'s' and trashed = false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![serde_json::json!({ "id": "f-bob", "name": "bob's" })],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let id = store.resolve_folder("bob's").await.unwrap();
    assert_eq!(id, Some(RemoteId::new("f-bob").unwrap()));
}

#[tokio::test]
async fn test_list_children_maps_kinds() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", "'root-1' in parents and trashed = false"))
        .and(query_param("pageSize", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![
                file_json("f1", "a.txt", "text/plain", Some("aa11")),
                file_json("d1", "sub", FOLDER_MIME, None),
                file_json("g1", "Plan", "application/vnd.google-apps.document", None),
            ],
            None,
        )))
        .mount(&server)
        .await;

    let entries = store
        .list_children(&RemoteId::new("root-1").unwrap())
        .await
        .unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].kind, EntryKind::File);
    assert_eq!(entries[0].checksum.as_ref().unwrap().as_str(), "aa11");
    assert!(entries[0].modified.is_some());
    assert_eq!(entries[1].kind, EntryKind::Folder);
    assert_eq!(entries[1].name, "sub");
    assert_eq!(entries[2].kind, EntryKind::WorkspaceDoc);
}

#[tokio::test]
async fn test_list_children_follows_page_tokens() {
    let (server, store) = setup_drive_mock().await;

    // More specific mock first so it wins when the token is present.
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![file_json("f2", "b.txt", "text/plain", Some("bb22"))],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![file_json("f1", "a.txt", "text/plain", Some("aa11"))],
            Some("page-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let entries = store
        .list_children(&RemoteId::new("root-1").unwrap())
        .await
        .unwrap();

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_unauthorized_maps_to_drive_error() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "code": 401, "message": "Invalid Credentials" }
        })))
        .mount(&server)
        .await;

    let err = store
        .list_children(&RemoteId::new("root-1").unwrap())
        .await
        .unwrap_err();

    match err.downcast_ref::<DriveError>() {
        Some(DriveError::Unauthorized(message)) => assert_eq!(message, "Invalid Credentials"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = store.resolve_folder("agents").await.unwrap_err();

    match err.downcast_ref::<DriveError>() {
        Some(DriveError::Api { status, message }) => {
            assert_eq!(*status, 500);
            assert_eq!(message, "backend exploded");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_listing_is_invalid_response() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = store
        .list_children(&RemoteId::new("root-1").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_invalid_entry_id_fails_the_listing() {
    let (server, store) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![
                file_json("good-1", "keep.txt", "text/plain", Some("abc")),
                file_json("bad id", "lost.txt", "text/plain", Some("def")),
            ],
            None,
        )))
        .mount(&server)
        .await;

    let err = store
        .list_children(&RemoteId::new("root-1").unwrap())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("root-1"));
    assert!(matches!(
        err.downcast_ref::<DomainError>(),
        Some(DomainError::InvalidRemoteId(_))
    ));
}
