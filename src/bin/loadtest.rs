//! Continuous load test against a running webstore.
//!
//! Clears the store, builds a data bank of `20 * bytes-max` random bytes and
//! runs `--parallelism` workers until Ctrl+C (or `--iterations` per worker).
//!
//! ```bash
//! webstore-loadtest --parallelism 10 --bytes-min 1048576 --bytes-max 10485760
//! ```

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use webstore::harness::{HttpStoreClient, DEFAULT_ENDPOINT};
use webstore::{HarnessConfig, LoadHarness};

#[derive(Parser, Debug)]
#[command(name = "webstore-loadtest")]
#[command(about = "Concurrent upload/download/verify load test")]
struct Args {
    /// Store endpoint
    #[arg(long, env = "WEBSTORE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Number of parallel tests running continuously
    #[arg(long, default_value_t = 1)]
    parallelism: usize,

    /// Lower bound of test data size
    #[arg(long = "bytes-min", default_value_t = 1024 * 1024)]
    bytes_min: usize,

    /// Upper bound of test data size
    #[arg(long = "bytes-max", default_value_t = 10 * 1024 * 1024)]
    bytes_max: usize,

    /// Stop each worker after this many round trips
    #[arg(long)]
    iterations: Option<u64>,

    /// Treat not-found / busy downloads as fatal
    #[arg(long)]
    strict: bool,

    /// Seed for reproducible payloads
    #[arg(long)]
    seed: Option<u64>,

    /// Keep existing blobs instead of clearing the store first
    #[arg(long)]
    no_clear: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webstore::init_tracing()?;

    let args = Args::parse();

    let config = HarnessConfig {
        parallelism: args.parallelism,
        bytes_min: args.bytes_min,
        bytes_max: args.bytes_max,
        iterations: args.iterations,
        strict: args.strict,
        seed: args.seed,
        ..HarnessConfig::default()
    };

    let client = Arc::new(HttpStoreClient::new(&args.endpoint)?);
    let harness = LoadHarness::new(config, client).await?;

    if !args.no_clear {
        harness.clear_store().await?;
        info!(endpoint = %args.endpoint, "Cleared store");
    }

    let workers = harness.start();
    let stop = workers.stop_signal();

    // Raise the stop signal on Ctrl+C; workers finish their current round trip
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping tests...");
            stop.raise();
        }
    });

    match workers.wait().await {
        Ok(report) => {
            info!(
                workers = report.workers,
                iterations = report.iterations,
                verified = report.verified,
                transient = report.transient,
                bytes = report.bytes_verified,
                "Stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Load test failed");
            Err(e.into())
        }
    }
}
