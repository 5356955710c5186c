//! Generate files of random lowercase data.
//!
//! ```bash
//! webstore-genfile --dir ./data --size medium --total 5
//! webstore-genfile --megabytes 3 --total 2
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use webstore::harness::functional::generate_files;
use webstore::SizeClass;

#[derive(Parser, Debug)]
#[command(name = "webstore-genfile")]
#[command(about = "Create random test files")]
struct Args {
    /// Directory to create files in
    #[arg(long, default_value = "./data")]
    dir: PathBuf,

    /// Named file size
    #[arg(long, value_enum, conflicts_with = "megabytes")]
    size: Option<SizeClass>,

    /// File size in megabytes
    #[arg(long, default_value_t = 1)]
    megabytes: usize,

    /// How many files to create
    #[arg(long, default_value_t = 1)]
    total: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webstore::init_tracing()?;

    let args = Args::parse();
    let size = args
        .size
        .map(SizeClass::bytes)
        .unwrap_or(args.megabytes * 1024 * 1024);

    info!(dir = %args.dir.display(), size, total = args.total, "Generating files...");
    let paths = generate_files(&args.dir, size, args.total).await?;
    info!(count = paths.len(), "Done");

    Ok(())
}
