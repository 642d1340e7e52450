//! Integration tests for the drive client and remote adapter
//!
//! Uses wiremock to stand in for the drive API so the full HTTP path
//! (request shape, JSON mapping, error handling, streaming bodies) is
//! exercised without a real server.

use std::io::Cursor;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skyvault_core::domain::relpath::RelPath;
use skyvault_core::ports::FileSystem;
use skyvault_crypto::{derive_key, encrypt_name};
use skyvault_remote::{DriveClient, RemoteError, RemoteFileSystem};

fn client_for(server: &MockServer) -> Arc<DriveClient> {
    Arc::new(DriveClient::new(&server.uri(), "test-token", "skyvault-tests").unwrap())
}

fn listing_json(entries: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "entries": entries })
}

// ============================================================================
// DriveClient
// ============================================================================

#[tokio::test]
async fn list_dir_parses_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("dir", "/apps/skyvault"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json(serde_json::json!([
            {
                "server_filename": "a.txt",
                "size": 100,
                "server_mtime": 1700000000,
                "is_dir": false,
                "md5": "9e107d9d372bb6826bd81d3542a419d6"
            },
            { "server_filename": "docs", "size": 0, "is_dir": true }
        ]))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let entries = client.list_dir("/apps/skyvault").await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].server_filename, "a.txt");
    assert_eq!(entries[0].size, 100);
    assert_eq!(
        entries[0].md5.as_deref(),
        Some("9e107d9d372bb6826bd81d3542a419d6")
    );
    assert!(entries[1].is_dir);
    assert_eq!(entries[1].server_mtime, 0);
    assert_eq!(entries[1].md5, None);
}

#[tokio::test]
async fn upload_streams_body_and_returns_server_md5() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/files/content"))
        .and(query_param("path", "/apps/skyvault/a.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "md5": "feedc0de" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let stream = Box::new(Cursor::new(b"hello drive".to_vec()));
    let md5 = client.upload("/apps/skyvault/a.txt", stream).await.unwrap();
    assert_eq!(md5, "feedc0de");
}

#[tokio::test]
async fn download_yields_the_body_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files/content"))
        .and(query_param("path", "/apps/skyvault/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file-content".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut stream = client.download("/apps/skyvault/a.txt").await.unwrap();
    let mut body = Vec::new();
    stream.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"file-content");
}

#[tokio::test]
async fn delete_and_rename_post_json_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/files/delete"))
        .and(body_json(serde_json::json!({ "path": "/apps/skyvault/a.txt" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/files/rename"))
        .and(body_json(serde_json::json!({
            "path": "/apps/skyvault/a.txt",
            "new_name": "b.txt"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.delete("/apps/skyvault/a.txt").await.unwrap();
    client
        .rename("/apps/skyvault/a.txt", "b.txt")
        .await
        .unwrap();
}

#[tokio::test]
async fn api_errors_carry_status_and_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "message": "no such directory" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.list_dir("/apps/skyvault/missing").await.unwrap_err();
    match err {
        RemoteError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "no such directory");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

// ============================================================================
// RemoteFileSystem
// ============================================================================

#[tokio::test]
async fn list_all_walks_directories_recursively() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("dir", "/apps/skyvault"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json(serde_json::json!([
            { "server_filename": "top.txt", "size": 5, "server_mtime": 1700000000,
              "is_dir": false, "md5": "aa" },
            { "server_filename": "docs", "size": 0, "is_dir": true }
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("dir", "/apps/skyvault/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json(serde_json::json!([
            { "server_filename": "nested.txt", "size": 7, "server_mtime": 1700000001,
              "is_dir": false, "md5": "bb" }
        ]))))
        .mount(&server)
        .await;

    let fs = RemoteFileSystem::new(client_for(&server), "/apps/skyvault", None);
    let listing = fs.list_all().await.unwrap();

    assert_eq!(listing.len(), 3);
    let nested = &listing[&RelPath::new("docs/nested.txt").unwrap()];
    assert_eq!(nested.size, 7);
    assert_eq!(nested.remote_hash.as_deref(), Some("bb"));
    assert!(!nested.is_dir);
    assert!(listing[&RelPath::new("docs").unwrap()].is_dir);
}

#[tokio::test]
async fn list_all_decrypts_filenames() {
    let key = derive_key("filenames");
    let sealed_dir = encrypt_name("docs", &key).unwrap();
    let sealed_file = encrypt_name("secret.txt", &key).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("dir", "/apps/skyvault"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json(serde_json::json!([
            { "server_filename": sealed_dir, "size": 0, "is_dir": true }
        ]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param(
            "dir",
            format!("/apps/skyvault/{sealed_dir}"),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json(serde_json::json!([
            { "server_filename": sealed_file, "size": 9, "is_dir": false, "md5": "cc" }
        ]))))
        .mount(&server)
        .await;

    let fs = RemoteFileSystem::new(client_for(&server), "/apps/skyvault", Some(key));
    let listing = fs.list_all().await.unwrap();

    // Wire paths were encrypted, surfaced paths are plaintext.
    assert!(listing.contains_key(&RelPath::new("docs/secret.txt").unwrap()));
}

#[tokio::test]
async fn stat_finds_the_entry_in_its_parent_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("dir", "/apps/skyvault/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_json(serde_json::json!([
            { "server_filename": "other.txt", "size": 1, "is_dir": false },
            { "server_filename": "wanted.txt", "size": 42, "server_mtime": 1700000002,
              "is_dir": false, "md5": "dd" }
        ]))))
        .mount(&server)
        .await;

    let fs = RemoteFileSystem::new(client_for(&server), "/apps/skyvault", None);
    let meta = fs
        .stat(&RelPath::new("docs/wanted.txt").unwrap())
        .await
        .unwrap();
    assert_eq!(meta.size, 42);
    assert_eq!(meta.remote_hash.as_deref(), Some("dd"));

    let missing = fs.stat(&RelPath::new("docs/gone.txt").unwrap()).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn rename_rejects_cross_directory_moves() {
    let server = MockServer::start().await;
    let fs = RemoteFileSystem::new(client_for(&server), "/apps/skyvault", None);

    let err = fs
        .rename(
            &RelPath::new("docs/a.txt").unwrap(),
            &RelPath::new("archive/a.txt").unwrap(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("in-place"));
}
