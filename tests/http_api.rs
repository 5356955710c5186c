//! HTTP round trips against an in-process server

mod common;

use common::start_server;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::StatusCode;
use webstore::cipher::NONCE_LEN;
use webstore::harness::data_bank::generate_data;
use webstore::{Metrics, WriteMode};

async fn upload(client: &reqwest::Client, url: String, data: Vec<u8>) -> StatusCode {
    client.post(url).body(data).send().await.unwrap().status()
}

#[tokio::test]
async fn test_upload_then_download() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();
    let data = generate_data(256 * 1024, &mut StdRng::seed_from_u64(1));

    let status = upload(&client, server.url("/upload/abc-123.txt"), data.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let resp = client
        .get(server.url("/download/abc-123.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(reqwest::header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(resp.bytes().await.unwrap(), data);

    // Ciphertext on disk, never plaintext
    let on_disk = std::fs::read(server.blobs_dir.join("abc-123.txt")).unwrap();
    assert_eq!(on_disk.len(), NONCE_LEN + data.len());
    assert_ne!(&on_disk[NONCE_LEN..], &data[..]);
}

#[tokio::test]
async fn test_empty_upload_roundtrip() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();

    assert_eq!(
        upload(&client, server.url("/upload/empty"), Vec::new()).await,
        StatusCode::OK
    );

    let resp = client.get(server.url("/download/empty")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overwrite_same_name() {
    let server = start_server(WriteMode::Staged, Metrics::disabled()).await;
    let client = reqwest::Client::new();

    upload(&client, server.url("/upload/doc"), b"first".to_vec()).await;
    upload(&client, server.url("/upload/doc"), b"second".to_vec()).await;

    let body = client
        .get(server.url("/download/doc"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&body[..], b"second");
}

#[tokio::test]
async fn test_invalid_names_are_not_found() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();

    for path in ["/upload/abc/def", "/upload/abc?x=1", "/upload/", "/upload/a_b"] {
        let status = upload(&client, server.url(path), b"data".to_vec()).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
    }

    assert_eq!(std::fs::read_dir(&server.blobs_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_download_unknown_name() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(server.url("/download/never-uploaded"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(!server.blobs_dir.join("never-uploaded").exists());
}

#[tokio::test]
async fn test_empty_blob_file_is_busy() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();
    std::fs::File::create(server.blobs_dir.join("in-flight")).unwrap();

    let resp = client
        .get(server.url("/download/in-flight"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp
        .text()
        .await
        .unwrap()
        .starts_with(webstore::error::BUSY_MESSAGE));
}

#[tokio::test]
async fn test_clear() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();

    for name in ["a", "b", "c"] {
        upload(&client, server.url(&format!("/upload/{name}")), b"x".to_vec()).await;
    }

    let resp = client.get(server.url("/clear")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    for name in ["a", "b", "c"] {
        let resp = client
            .get(server.url(&format!("/download/{name}")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
    assert!(server.blobs_dir.is_dir());

    assert_eq!(
        upload(&client, server.url("/upload/after-clear"), b"y".to_vec()).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_wrong_method() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/upload/name")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(!server.blobs_dir.join("name").exists());
}

#[tokio::test]
async fn test_health() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();
    upload(&client, server.url("/upload/one"), vec![b'a'; 10]).await;

    let body: serde_json::Value = serde_json::from_slice(
        &client
            .get(server.url("/health"))
            .send()
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap(),
    )
    .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["blobs"], 1);
    assert_eq!(body["bytes"], (NONCE_LEN + 10) as u64);
}

#[tokio::test]
#[ignore = "moves 100 MB through the server"]
async fn test_large_blob_roundtrip() {
    let server = start_server(WriteMode::Direct, Metrics::disabled()).await;
    let client = reqwest::Client::new();
    let data = generate_data(webstore::SizeClass::Large.bytes(), &mut StdRng::seed_from_u64(2));

    assert_eq!(
        upload(&client, server.url("/upload/large.bin"), data.clone()).await,
        StatusCode::OK
    );
    let body = client
        .get(server.url("/download/large.bin"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert!(body == data);
}
