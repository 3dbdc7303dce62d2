//! Upload Flow Integration Tests
//!
//! Drives a running server over real HTTP with an in-memory object store.

mod common;

use common::{client, photo_form, RecordingStore, TestServer, JPEG_BYTES};
use photo_relay::upload::ObjectAcl;
use reqwest::StatusCode;

#[tokio::test]
async fn test_landing_page_shows_upload_form() {
    let server = TestServer::start(RecordingStore::new()).await;

    let response = client().get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let body = response.text().await.unwrap();
    assert!(body.contains("Welcome to Baby Photos!"));
    assert!(body.contains(r#"action="/upload""#));
    assert!(body.contains(r#"enctype="multipart/form-data""#));
    assert!(body.contains(r#"name="file""#));

    server.shutdown().await;
}

#[tokio::test]
async fn test_upload_redirects_and_stores_public_object() {
    let store = RecordingStore::new();
    let server = TestServer::start(store.clone()).await;

    let response = client()
        .post(server.url("/upload"))
        .multipart(photo_form("photo1.jpg", JPEG_BYTES))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/");

    let puts = store.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].key, "photo1.jpg");
    assert_eq!(puts[0].body.as_ref(), JPEG_BYTES);
    assert_eq!(puts[0].acl, ObjectAcl::PublicRead);
    assert_eq!(puts[0].content_type.as_deref(), Some("image/jpeg"));

    assert_eq!(server.context.streams().open_streams(), 0);
    assert_eq!(server.context.streams().released_streams(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_missing_file_field_is_bad_request() {
    let store = RecordingStore::new();
    let server = TestServer::start(store.clone()).await;

    let form = reqwest::multipart::Form::new().text("caption", "first bath");
    let response = client()
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Could not read uploaded file"), "body: {}", body);

    assert!(store.puts().is_empty());
    assert_eq!(server.context.streams().released_streams(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_non_multipart_body_is_bad_request() {
    let store = RecordingStore::new();
    let server = TestServer::start(store.clone()).await;

    let response = client()
        .post(server.url("/upload"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("file=photo1.jpg")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.puts().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_storage_failure_is_reported_and_stream_released() {
    let store = RecordingStore::failing("AccessDenied: Access Denied");
    let server = TestServer::start(store.clone()).await;

    let response = client()
        .post(server.url("/upload"))
        .multipart(photo_form("photo1.jpg", JPEG_BYTES))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Failed to upload file"), "body: {}", body);
    assert!(body.contains("AccessDenied"));

    // Exactly one attempt, and the stream was still released
    assert_eq!(store.puts().len(), 1);
    assert_eq!(server.context.streams().open_streams(), 0);
    assert_eq!(server.context.streams().released_streams(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_same_filename_overwrites() {
    let store = RecordingStore::new();
    let server = TestServer::start(store.clone()).await;
    let client = client();

    for content in [&b"first"[..], &b"second"[..]] {
        let response = client
            .post(server.url("/upload"))
            .multipart(photo_form("photo1.jpg", content))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    assert_eq!(store.puts().len(), 2);
    assert_eq!(store.object_count(), 1);
    assert_eq!(store.object("photo1.jpg").unwrap().as_ref(), b"second");

    server.shutdown().await;
}

#[tokio::test]
async fn test_filename_is_used_verbatim() {
    let store = RecordingStore::new();
    let server = TestServer::start(store.clone()).await;

    let response = client()
        .post(server.url("/upload"))
        .multipart(photo_form("first steps (1).jpeg", JPEG_BYTES))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(store.puts()[0].key, "first steps (1).jpeg");

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_uploads_are_independent() {
    let store = RecordingStore::new();
    let server = TestServer::start(store.clone()).await;
    let client = client();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        let url = server.url("/upload");
        tasks.push(tokio::spawn(async move {
            let name = format!("photo{}.jpg", i);
            let content = format!("content of {}", name);
            client
                .post(url)
                .multipart(photo_form(&name, content.as_bytes()))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::SEE_OTHER);
    }

    assert_eq!(store.object_count(), 8);
    for i in 0..8 {
        let name = format!("photo{}.jpg", i);
        let expected = format!("content of {}", name);
        assert_eq!(store.object(&name).unwrap().as_ref(), expected.as_bytes());
    }
    assert_eq!(server.context.streams().open_streams(), 0);
    assert_eq!(server.context.streams().released_streams(), 8);

    server.shutdown().await;
}

#[tokio::test]
async fn test_large_upload_accepted_by_default() {
    let store = RecordingStore::new();
    let server = TestServer::start(store.clone()).await;
    let photo = vec![0x5Au8; 33 * 1024 * 1024];

    let response = client()
        .post(server.url("/upload"))
        .multipart(photo_form("newborn.jpg", &photo))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(store.object("newborn.jpg").unwrap().len(), photo.len());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_body_is_rejected_when_capped() {
    let store = RecordingStore::new();
    let server = TestServer::start_with_limit(store.clone(), 64).await;

    let response = client()
        .post(server.url("/upload"))
        .multipart(photo_form("big.jpg", &[0u8; 1024]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.puts().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route_and_wrong_method() {
    let server = TestServer::start(RecordingStore::new()).await;
    let client = client();

    let response = client.get(server.url("/photos")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get(server.url("/upload")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "POST");

    let response = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");

    server.shutdown().await;
}
