//! Store service: upload, download and clear orchestration.
//!
//! Upload path: read body -> encrypt -> write file.
//! Download path: read file -> decrypt.
//!
//! Each phase boundary is reported to the metrics collector. Encryption and
//! decryption run on the blocking pool since payloads reach hundreds of MB.

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info};

use crate::blob_store::BlobStore;
use crate::cipher::{self, CipherKey};
use crate::error::StoreError;
use crate::metrics::{record, ActiveRequest, Metrics, PhaseTimer};
use crate::name::validate_name;

/// Orchestrates the cipher and the blob store for each request
pub struct StoreService {
    blob_store: Arc<BlobStore>,
    key: CipherKey,
    metrics: Metrics,
}

impl StoreService {
    pub fn new(blob_store: Arc<BlobStore>, key: CipherKey, metrics: Metrics) -> Self {
        Self {
            blob_store,
            key,
            metrics,
        }
    }

    pub fn blob_store(&self) -> &Arc<BlobStore> {
        &self.blob_store
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Read the whole body, encrypt it and store it under `name`.
    ///
    /// Returns the number of plaintext bytes stored.
    pub async fn handle_upload<B>(&self, name: &str, body: B) -> Result<u64, StoreError>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let _active = ActiveRequest::start(&self.metrics, "upload");
        let result = self.upload(name, body).await;
        record::request_finished(&self.metrics, "upload", outcome(&result));
        result
    }

    async fn upload<B>(&self, name: &str, body: B) -> Result<u64, StoreError>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        validate_name(name)?;
        let mut timer = PhaseTimer::start(&self.metrics, "upload");

        let data = body
            .collect()
            .await
            .map_err(|e| StoreError::Internal(format!("Failed to read body: {}", e)))?
            .to_bytes();
        let size = data.len() as u64;
        timer.mark("read");

        let key = self.key.clone();
        let envelope = tokio::task::spawn_blocking(move || cipher::encrypt(&data, &key))
            .await
            .map_err(|e| StoreError::Internal(format!("Encryption task failed: {}", e)))??;
        timer.mark("encrypt");

        self.blob_store.put(name, &envelope).await?;
        timer.mark("write");

        record::bytes_uploaded(&self.metrics, size);
        info!(name = %name, size, "Stored blob");
        Ok(size)
    }

    /// Load and decrypt the blob stored under `name`.
    pub async fn handle_download(&self, name: &str) -> Result<Bytes, StoreError> {
        let _active = ActiveRequest::start(&self.metrics, "download");
        let result = self.download(name).await;
        record::request_finished(&self.metrics, "download", outcome(&result));
        result
    }

    async fn download(&self, name: &str) -> Result<Bytes, StoreError> {
        validate_name(name)?;

        if !self.blob_store.exists(name).await {
            debug!(name = %name, "Blob does not exist");
            return Err(StoreError::NotFound(name.to_string()));
        }

        let mut timer = PhaseTimer::start(&self.metrics, "download");

        // An empty file means an upload has truncated it and not written yet
        let envelope = self.blob_store.get(name).await?;
        timer.mark("read");

        let key = self.key.clone();
        let plaintext = tokio::task::spawn_blocking(move || cipher::decrypt(&envelope, &key))
            .await
            .map_err(|e| StoreError::Internal(format!("Decryption task failed: {}", e)))??;
        timer.mark("decrypt");

        record::bytes_downloaded(&self.metrics, plaintext.len() as u64);
        info!(name = %name, size = plaintext.len(), "Serving blob");
        Ok(Bytes::from(plaintext))
    }

    /// Remove every stored blob.
    pub async fn handle_clear(&self) -> Result<u64, StoreError> {
        let _active = ActiveRequest::start(&self.metrics, "clear");
        let result = self.blob_store.clear_all().await;
        record::request_finished(&self.metrics, "clear", outcome(&result));
        result
    }
}

fn outcome<T>(result: &Result<T, StoreError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(StoreError::NotFound(_)) => "not_found",
        Err(StoreError::InvalidName(_)) => "invalid_name",
        Err(StoreError::Busy(_)) => "busy",
        Err(_) => "error",
    }
}
