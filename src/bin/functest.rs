//! Functional check: concurrent upload/download/compare cycles.
//!
//! ```bash
//! webstore-functest --size medium --concurrency 10
//! ```

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use webstore::harness::functional::validate_round_trips;
use webstore::harness::{HttpStoreClient, DEFAULT_ENDPOINT};
use webstore::SizeClass;

#[derive(Parser, Debug)]
#[command(name = "webstore-functest")]
#[command(about = "Verify that uploaded blobs download unchanged")]
struct Args {
    /// Store endpoint
    #[arg(long, env = "WEBSTORE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Payload size
    #[arg(long, value_enum, default_value_t = SizeClass::Medium)]
    size: SizeClass,

    /// Number of concurrent round trips
    #[arg(long, default_value_t = 10)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webstore::init_tracing()?;

    let args = Args::parse();
    let client = Arc::new(HttpStoreClient::new(&args.endpoint)?);

    let verified = validate_round_trips(client, args.size, args.concurrency).await?;
    info!(verified, size = args.size.label(), "All round trips verified");

    Ok(())
}
