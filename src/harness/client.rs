//! Clients the harness drives round trips through.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::HarnessError;
use crate::error::{StoreError, BUSY_MESSAGE};
use crate::service::StoreService;

/// Result of a download that reached the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    Found(Bytes),
    NotFound,
    /// The blob file was empty, a write is in flight
    Busy,
}

/// Upload, download and clear against some store
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn upload(&self, name: &str, data: Bytes) -> Result<(), HarnessError>;

    async fn download(&self, name: &str) -> Result<Download, HarnessError>;

    async fn clear(&self) -> Result<(), HarnessError>;
}

/// Talks to a running store over HTTP
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStoreClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, HarnessError> {
        Self::with_timeout(endpoint, Duration::from_secs(300))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, op: &str, name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, op, name)
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn upload(&self, name: &str, data: Bytes) -> Result<(), HarnessError> {
        let url = self.url("upload", name);
        debug!(url = %url, size = data.len(), "Uploading");

        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(data)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(HarnessError::UploadRejected {
                name: name.to_string(),
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Download, HarnessError> {
        let url = self.url("download", name);
        debug!(url = %url, "Downloading");

        let resp = self.client.get(&url).send().await?;

        match resp.status() {
            StatusCode::OK => Ok(Download::Found(resp.bytes().await?)),
            StatusCode::NOT_FOUND => Ok(Download::NotFound),
            status => {
                let message = resp.text().await.unwrap_or_default();
                if status == StatusCode::INTERNAL_SERVER_ERROR && message.starts_with(BUSY_MESSAGE) {
                    Ok(Download::Busy)
                } else {
                    Err(HarnessError::UnexpectedStatus {
                        name: name.to_string(),
                        status: status.as_u16(),
                        message,
                    })
                }
            }
        }
    }

    async fn clear(&self) -> Result<(), HarnessError> {
        let url = format!("{}/clear", self.endpoint);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(HarnessError::UnexpectedStatus {
                name: "/clear".to_string(),
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Calls a [`StoreService`] in the same process, skipping HTTP
#[derive(Clone)]
pub struct LocalStoreClient {
    service: Arc<StoreService>,
}

impl LocalStoreClient {
    pub fn new(service: Arc<StoreService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StoreClient for LocalStoreClient {
    async fn upload(&self, name: &str, data: Bytes) -> Result<(), HarnessError> {
        self.service.handle_upload(name, Full::new(data)).await?;
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Download, HarnessError> {
        match self.service.handle_download(name).await {
            Ok(data) => Ok(Download::Found(data)),
            Err(StoreError::NotFound(_)) => Ok(Download::NotFound),
            Err(StoreError::Busy(_)) => Ok(Download::Busy),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<(), HarnessError> {
        self.service.handle_clear().await?;
        Ok(())
    }
}
