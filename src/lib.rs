//! Webstore - encrypted-at-rest blob store over HTTP
//!
//! Clients upload named byte payloads and later download them unmodified.
//!
//! ## Architecture
//!
//! - **name**: validates `/upload/{name}` and `/download/{name}` paths
//! - **cipher**: XChaCha20 envelopes (random nonce prefix + ciphertext)
//! - **blob_store**: one file per name on the local filesystem
//! - **service**: encrypt-then-write uploads, read-then-decrypt downloads
//! - **http**: hyper server exposing the service and `/metrics`
//! - **harness**: concurrent load generator that verifies every round trip
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/webstore/
//! ├── blobs/                 # One envelope file per blob name
//! │   ├── notes.txt
//! │   └── load-abcdefghijkl
//! ├── staging/               # In-progress uploads (staged write mode only)
//! └── config.toml            # Configuration
//! ```
//!
//! ## Concurrency
//!
//! There is no locking per name. A download that finds an empty file reports
//! the blob as busy rather than returning an empty body.

pub mod blob_store;
pub mod cipher;
pub mod config;
pub mod error;
pub mod harness;
pub mod http;
pub mod metrics;
pub mod name;
pub mod service;

// Re-exports
pub use blob_store::{BlobStore, StorageStats};
pub use cipher::CipherKey;
pub use config::{Config, SizeClass, WriteMode};
pub use error::StoreError;
pub use harness::{HarnessConfig, HarnessError, HarnessReport, LoadHarness};
pub use http::HttpServer;
pub use metrics::Metrics;
pub use service::StoreService;

/// Initialize tracing with `RUST_LOG`, defaulting this crate to `info`.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("webstore=info".parse()?),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
