//! HTTP API for the blob store
//!
//! - `POST /upload/{name}` - Store the request body under `name`
//! - `GET /download/{name}` - Retrieve the blob stored under `name`
//! - `GET /clear` - Remove every stored blob
//! - `GET /metrics` - Prometheus metrics
//! - `GET /health` - Health check with storage statistics
//!
//! Names must match `[a-zA-Z0-9.-]+`; anything else is answered with 404
//! before storage is touched.
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST --data-binary @notes.txt http://localhost:8080/upload/notes.txt
//! curl http://localhost:8080/download/notes.txt > notes-copy.txt
//! curl http://localhost:8080/clear
//! ```

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::name::{parse_request_path, Operation};
use crate::service::StoreService;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// HTTP server state
pub struct HttpServer {
    service: Arc<StoreService>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(service: Arc<StoreService>, bind_addr: SocketAddr) -> Self {
        Self { service, bind_addr }
    }

    /// Bind to the configured address and run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), StoreError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), StoreError> {
        info!(addr = %listener.local_addr()?, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route requests to handlers
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        // The query string is part of what gets validated: `/upload/a?x=1` is not a name
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "Incoming request");

        let result = match (&method, path.as_str()) {
            (&Method::GET, "/health") => self.handle_health().await,
            (&Method::GET, "/metrics") => Ok(self.handle_metrics()),
            (&Method::GET, "/clear") => self.handle_clear().await,
            _ => self.handle_blob(req, &method, &path).await,
        };

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                let status = e.status_code();
                if status == StatusCode::NOT_FOUND {
                    debug!(method = %method, path = %path, error = %e, "Not found");
                } else {
                    error!(method = %method, path = %path, error = %e, "Request error");
                }
                Ok(text_response(status, e.to_string()))
            }
        }
    }

    /// Upload or download, depending on the path
    async fn handle_blob(
        &self,
        req: Request<Incoming>,
        method: &Method,
        path: &str,
    ) -> Result<Response<Full<Bytes>>, StoreError> {
        let (op, name) = parse_request_path(path)?;

        match (op, method) {
            (Operation::Upload, &Method::POST) | (Operation::Upload, &Method::PUT) => {
                info!(name = %name, "Processing upload request");
                self.service.handle_upload(name, req.into_body()).await?;
                Ok(text_response(StatusCode::OK, ""))
            }
            (Operation::Download, &Method::GET) => {
                info!(name = %name, "Processing download request");
                let data = self.service.handle_download(name).await?;
                Ok(text_response(StatusCode::OK, data))
            }
            _ => Ok(text_response(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{} not allowed for {}", method, op),
            )),
        }
    }

    /// GET /clear - Remove every blob
    async fn handle_clear(&self) -> Result<Response<Full<Bytes>>, StoreError> {
        let removed = self.service.handle_clear().await?;
        Ok(text_response(StatusCode::OK, format!("Removed {} blobs", removed)))
    }

    /// GET /metrics - Prometheus exposition
    fn handle_metrics(&self) -> Response<Full<Bytes>> {
        let mut response = text_response(StatusCode::OK, self.service.metrics().render());
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
        );
        response
    }

    /// Health check endpoint
    async fn handle_health(&self) -> Result<Response<Full<Bytes>>, StoreError> {
        let stats = self.service.blob_store().stats().await?;
        let body = serde_json::json!({
            "status": "ok",
            "blobs": stats.total_blobs,
            "bytes": stats.total_bytes,
        });

        let mut response = text_response(StatusCode::OK, body.to_string());
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(response)
    }
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let response = text_response(StatusCode::NOT_FOUND, "Blob not found: x");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
    }
}
