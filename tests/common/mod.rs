//! Shared helpers: an in-process webstore on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use webstore::{BlobStore, CipherKey, HttpServer, Metrics, StoreService, WriteMode};

pub struct TestServer {
    pub addr: SocketAddr,
    pub blobs_dir: std::path::PathBuf,
    _temp: TempDir,
}

impl TestServer {
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_server(mode: WriteMode, metrics: Metrics) -> TestServer {
    let temp = TempDir::new().unwrap();
    let blobs_dir = temp.path().join("blobs");
    let store = BlobStore::open(&blobs_dir, temp.path().join("staging"), mode)
        .await
        .unwrap();
    let service = Arc::new(StoreService::new(
        Arc::new(store),
        CipherKey::from_secret("integration secret"),
        metrics,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(HttpServer::new(service, addr));
    tokio::spawn(server.serve(listener));

    TestServer {
        addr,
        blobs_dir,
        _temp: temp,
    }
}
