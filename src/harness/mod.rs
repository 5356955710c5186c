//! Load and verification harness
//!
//! Builds a data bank of random bytes once, then runs many workers that each
//! pick a random slice, upload it under a fresh name, download it again and
//! compare byte for byte.
//!
//! ## Failure policy
//!
//! | Outcome | Default | Strict |
//! |---------|---------|--------|
//! | Download not found / busy | logged, counted as transient | fatal |
//! | Downloaded bytes differ | fatal | fatal |
//! | Upload rejected, transport error | fatal | fatal |

pub mod client;
pub mod data_bank;
pub mod functional;
pub mod worker;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::error::StoreError;

pub use client::{Download, HttpStoreClient, LocalStoreClient, StoreClient};
pub use data_bank::{DataBank, Payload};
pub use worker::{run_once, RunOutcome, StopSignal, TransientKind, WorkerOptions, WorkerSet};

/// Default endpoint of a locally running store
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

/// Bank size as a multiple of the largest payload
pub const BANK_MULTIPLIER: usize = 20;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(
        "Integrity mismatch for {name}: expected {expected_len} bytes, got {actual_len}, first difference at byte {first_difference}"
    )]
    IntegrityMismatch {
        name: String,
        expected_len: usize,
        actual_len: usize,
        first_difference: usize,
    },

    #[error("Download of {name} failed: {kind}")]
    Transient { name: String, kind: TransientKind },

    #[error("Upload of {name} rejected with status {status}: {message}")]
    UploadRejected {
        name: String,
        status: u16,
        message: String,
    },

    #[error("Unexpected status {status} for {name}: {message}")]
    UnexpectedStatus {
        name: String,
        status: u16,
        message: String,
    },

    #[error("Invalid payload range {min}..={max} for a bank of {bank} bytes")]
    InvalidPayloadRange { min: usize, max: usize, bank: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Aggregated counts from one or more workers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessReport {
    pub workers: usize,
    pub iterations: u64,
    pub verified: u64,
    pub transient: u64,
    pub bytes_verified: u64,
}

impl HarnessReport {
    pub fn merge(&mut self, other: &HarnessReport) {
        self.iterations += other.iterations;
        self.verified += other.verified;
        self.transient += other.transient;
        self.bytes_verified += other.bytes_verified;
    }
}

/// Load test settings
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of concurrent workers
    pub parallelism: usize,
    /// Smallest payload in bytes
    pub bytes_min: usize,
    /// Largest payload in bytes
    pub bytes_max: usize,
    /// Bank size; defaults to `BANK_MULTIPLIER * bytes_max`
    pub bank_size: Option<usize>,
    /// Iterations per worker; `None` runs until stopped
    pub iterations: Option<u64>,
    /// Treat not-found / busy downloads as fatal
    pub strict: bool,
    /// Seed for the bank and per-worker payload selection
    pub seed: Option<u64>,
    /// Prefix of generated blob names
    pub name_prefix: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            bytes_min: 1024 * 1024,
            bytes_max: 10 * 1024 * 1024,
            bank_size: None,
            iterations: None,
            strict: false,
            seed: None,
            name_prefix: "load".to_string(),
        }
    }
}

impl HarnessConfig {
    pub fn bank_size(&self) -> usize {
        self.bank_size
            .unwrap_or_else(|| self.bytes_max.saturating_mul(BANK_MULTIPLIER))
    }

    fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            bytes_min: self.bytes_min,
            bytes_max: self.bytes_max,
            iterations: self.iterations,
            strict: self.strict,
            name_prefix: self.name_prefix.clone(),
            seed: self.seed,
        }
    }
}

/// Drives concurrent round trips against a store
pub struct LoadHarness {
    config: HarnessConfig,
    client: Arc<dyn StoreClient>,
    bank: Arc<DataBank>,
}

impl LoadHarness {
    /// Build the data bank and check the payload range against it.
    ///
    /// Generation runs on the blocking pool; banks reach hundreds of MB.
    pub async fn new(
        config: HarnessConfig,
        client: Arc<dyn StoreClient>,
    ) -> Result<Self, HarnessError> {
        let size = config.bank_size();
        info!(size, "Generating data bank");

        let seed = config.seed;
        let bank = tokio::task::spawn_blocking(move || {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            DataBank::build(size, &mut rng)
        })
        .await
        .map_err(|e| HarnessError::Worker(format!("Data bank generation failed: {}", e)))?;
        bank.check_range(config.bytes_min, config.bytes_max)?;

        Ok(Self {
            config,
            client,
            bank: Arc::new(bank),
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn bank(&self) -> &DataBank {
        &self.bank
    }

    /// Remove everything from the store before a run.
    pub async fn clear_store(&self) -> Result<(), HarnessError> {
        self.client.clear().await
    }

    /// Start the workers; stop them with [`WorkerSet::stop`].
    pub fn start(&self) -> WorkerSet {
        WorkerSet::spawn(
            self.config.parallelism,
            Arc::clone(&self.bank),
            Arc::clone(&self.client),
            self.config.worker_options(),
        )
    }

    /// Start the workers and wait for them to finish their iterations.
    ///
    /// Without an iteration cap this only returns on a fatal error.
    pub async fn run(&self) -> Result<HarnessReport, HarnessError> {
        self.start().wait().await
    }
}
