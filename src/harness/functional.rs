//! One-shot functional checks and test-file generation.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::info;

use super::client::StoreClient;
use super::data_bank::{generate_data, random_name};
use super::worker::{run_once, RunOutcome};
use super::HarnessError;
use crate::config::SizeClass;

/// Run `concurrency` independent strict round trips of `size` bytes each.
///
/// Every payload is freshly generated; any failure fails the whole check.
/// Returns the number of verified round trips.
pub async fn validate_round_trips(
    client: Arc<dyn StoreClient>,
    size: SizeClass,
    concurrency: usize,
) -> Result<usize, HarnessError> {
    let mut tasks = JoinSet::new();

    for _ in 0..concurrency {
        let client = Arc::clone(&client);
        tasks.spawn(async move {
            let (name, data) = {
                let mut rng = StdRng::from_entropy();
                let name = format!("{}.txt", random_name(size.label(), &mut rng));
                (name, Bytes::from(generate_data(size.bytes(), &mut rng)))
            };

            let outcome = run_once(client.as_ref(), &name, data, true).await?;
            info!(name = %name, "Uploaded and downloaded blobs are equal");
            Ok::<_, HarnessError>(outcome)
        });
    }

    let mut verified = 0;
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(|e| HarnessError::Worker(e.to_string())).and_then(|r| r) {
            Ok(RunOutcome::Verified { .. }) => verified += 1,
            Ok(RunOutcome::Transient(kind)) => {
                first_error.get_or_insert(HarnessError::Worker(format!(
                    "unexpected transient outcome: {}",
                    kind
                )));
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(verified),
    }
}

/// Create `total` files of `size` random lowercase bytes under `dir`.
///
/// File names are eight random letters plus `.txt`.
pub async fn generate_files(
    dir: &Path,
    size: usize,
    total: usize,
) -> Result<Vec<PathBuf>, HarnessError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut rng = StdRng::from_entropy();
    let mut paths = Vec::with_capacity(total);

    for _ in 0..total {
        let mut name = random_name("", &mut rng);
        name.truncate(8);
        let path = dir.join(format!("{}.txt", name));

        info!(path = %path.display(), size, "Generating file");
        let data = generate_data(size, &mut rng);
        tokio::fs::write(&path, data).await?;
        paths.push(path);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_generate_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("generated");

        let paths = generate_files(&dir, 1000, 3).await.unwrap();

        assert_eq!(paths.len(), 3);
        for path in paths {
            let content = std::fs::read(&path).unwrap();
            assert_eq!(content.len(), 1000);
            assert!(content.iter().all(|b| b.is_ascii_lowercase()));
            assert!(path.extension().is_some_and(|ext| ext == "txt"));
        }
    }
}
