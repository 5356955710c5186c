//! Round trips and the concurrent worker pool.
//!
//! Workers loop upload -> download -> compare until the shared stop signal is
//! raised. The signal is only checked between iterations, so a round trip is
//! never cut in half. [`WorkerSet::stop`] and [`WorkerSet::wait`] return only
//! after every worker task has exited.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::client::{Download, StoreClient};
use super::data_bank::DataBank;
use super::{HarnessError, HarnessReport};

/// Why a round trip could not be verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    NotFound,
    Busy,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::NotFound => write!(f, "not found"),
            TransientKind::Busy => write!(f, "busy"),
        }
    }
}

/// Outcome of a round trip that did not fail the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Downloaded bytes matched the upload
    Verified { bytes: usize },
    /// Download came back not found or busy
    Transient(TransientKind),
}

/// Upload `expected` under `name`, download it again and compare.
///
/// In strict mode a not-found or busy download is an error. A byte mismatch
/// is always an error.
pub async fn run_once(
    client: &dyn StoreClient,
    name: &str,
    expected: Bytes,
    strict: bool,
) -> Result<RunOutcome, HarnessError> {
    client.upload(name, expected.clone()).await?;

    let kind = match client.download(name).await? {
        Download::Found(actual) => {
            verify(name, &expected, &actual)?;
            return Ok(RunOutcome::Verified {
                bytes: expected.len(),
            });
        }
        Download::NotFound => TransientKind::NotFound,
        Download::Busy => TransientKind::Busy,
    };

    if strict {
        return Err(HarnessError::Transient {
            name: name.to_string(),
            kind,
        });
    }
    warn!(name = %name, reason = %kind, "Failed to download");
    Ok(RunOutcome::Transient(kind))
}

/// Byte-for-byte comparison of a round trip
pub fn verify(name: &str, expected: &[u8], actual: &[u8]) -> Result<(), HarnessError> {
    if expected == actual {
        return Ok(());
    }

    let first_difference = expected
        .iter()
        .zip(actual.iter())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| expected.len().min(actual.len()));

    Err(HarnessError::IntegrityMismatch {
        name: name.to_string(),
        expected_len: expected.len(),
        actual_len: actual.len(),
        first_difference,
    })
}

/// Broadcast stop flag observed by every worker
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-worker settings
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub bytes_min: usize,
    pub bytes_max: usize,
    /// Stop after this many iterations even if the signal is never raised
    pub iterations: Option<u64>,
    pub strict: bool,
    pub name_prefix: String,
    /// Base seed; worker `i` uses `seed + i + 1`
    pub seed: Option<u64>,
}

/// Running pool of test workers
pub struct WorkerSet {
    tasks: JoinSet<Result<HarnessReport, HarnessError>>,
    stop: StopSignal,
    workers: usize,
}

impl WorkerSet {
    /// Start `count` workers over a shared bank and client.
    pub fn spawn(
        count: usize,
        bank: Arc<DataBank>,
        client: Arc<dyn StoreClient>,
        options: WorkerOptions,
    ) -> Self {
        info!(workers = count, "Starting test workers");

        let stop = StopSignal::new();
        let mut tasks = JoinSet::new();

        for id in 0..count {
            let rng = match options.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64 + 1)),
                None => StdRng::from_entropy(),
            };
            tasks.spawn(worker_loop(
                id,
                Arc::clone(&bank),
                Arc::clone(&client),
                options.clone(),
                stop.clone(),
                rng,
            ));
        }

        Self {
            tasks,
            stop,
            workers: count,
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Raise the stop signal and wait for every worker to finish its current iteration.
    pub async fn stop(self) -> Result<HarnessReport, HarnessError> {
        info!("Stopping all test workers...");
        self.stop.raise();
        self.wait().await
    }

    /// Wait for every worker to exit.
    ///
    /// The first fatal error raises the stop signal for the others; it is
    /// returned once all of them have exited.
    pub async fn wait(mut self) -> Result<HarnessReport, HarnessError> {
        let mut report = HarnessReport {
            workers: self.workers,
            ..HarnessReport::default()
        };
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.map_err(|e| HarnessError::Worker(e.to_string())).and_then(|r| r);
            match result {
                Ok(worker_report) => report.merge(&worker_report),
                Err(e) => {
                    self.stop.raise();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        info!(
            iterations = report.iterations,
            verified = report.verified,
            transient = report.transient,
            bytes = report.bytes_verified,
            "All test workers stopped"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

async fn worker_loop(
    id: usize,
    bank: Arc<DataBank>,
    client: Arc<dyn StoreClient>,
    options: WorkerOptions,
    stop: StopSignal,
    mut rng: StdRng,
) -> Result<HarnessReport, HarnessError> {
    info!(worker = id, "Test worker started");
    let mut report = HarnessReport::default();

    while !stop.is_raised() {
        if options.iterations.is_some_and(|max| report.iterations >= max) {
            break;
        }

        let payload = bank.pick_payload(
            &mut rng,
            options.bytes_min,
            options.bytes_max,
            &options.name_prefix,
        )?;
        report.iterations += 1;

        match run_once(client.as_ref(), &payload.name, payload.data, options.strict).await {
            Ok(RunOutcome::Verified { bytes }) => {
                report.verified += 1;
                report.bytes_verified += bytes as u64;
            }
            Ok(RunOutcome::Transient(_)) => report.transient += 1,
            Err(e) => {
                error!(worker = id, name = %payload.name, error = %e, "Test worker aborting");
                stop.raise();
                return Err(e);
            }
        }

        tokio::task::yield_now().await;
    }

    info!(worker = id, iterations = report.iterations, "Test worker stopped");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    /// In-memory store with switchable misbehavior
    #[derive(Default)]
    struct FakeStore {
        blobs: Mutex<HashMap<String, Bytes>>,
        busy: bool,
        drop_uploads: bool,
        corrupt: bool,
        uploads: AtomicU64,
    }

    #[async_trait]
    impl StoreClient for FakeStore {
        async fn upload(&self, name: &str, data: Bytes) -> Result<(), HarnessError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if !self.drop_uploads {
                self.blobs.lock().unwrap().insert(name.to_string(), data);
            }
            Ok(())
        }

        async fn download(&self, name: &str) -> Result<Download, HarnessError> {
            if self.busy {
                return Ok(Download::Busy);
            }
            match self.blobs.lock().unwrap().get(name) {
                Some(data) if self.corrupt => {
                    let mut bytes = data.to_vec();
                    if let Some(last) = bytes.last_mut() {
                        *last ^= 0xff;
                    }
                    Ok(Download::Found(Bytes::from(bytes)))
                }
                Some(data) => Ok(Download::Found(data.clone())),
                None => Ok(Download::NotFound),
            }
        }

        async fn clear(&self) -> Result<(), HarnessError> {
            self.blobs.lock().unwrap().clear();
            Ok(())
        }
    }

    fn options(iterations: Option<u64>, strict: bool) -> WorkerOptions {
        WorkerOptions {
            bytes_min: 16,
            bytes_max: 256,
            iterations,
            strict,
            name_prefix: "test".into(),
            seed: Some(9),
        }
    }

    fn bank() -> Arc<DataBank> {
        Arc::new(DataBank::build(8192, &mut StdRng::seed_from_u64(9)))
    }

    #[tokio::test]
    async fn test_run_once_verified() {
        let store = FakeStore::default();
        let outcome = run_once(&store, "a", Bytes::from_static(b"hello"), true)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Verified { bytes: 5 });
    }

    #[tokio::test]
    async fn test_run_once_transient_and_strict() {
        let store = FakeStore {
            busy: true,
            ..FakeStore::default()
        };

        let outcome = run_once(&store, "a", Bytes::from_static(b"x"), false)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Transient(TransientKind::Busy));

        let result = run_once(&store, "a", Bytes::from_static(b"x"), true).await;
        assert!(matches!(
            result,
            Err(HarnessError::Transient {
                kind: TransientKind::Busy,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_run_once_mismatch_is_fatal() {
        let store = FakeStore {
            corrupt: true,
            ..FakeStore::default()
        };

        let result = run_once(&store, "a", Bytes::from_static(b"abcdef"), false).await;
        match result {
            Err(HarnessError::IntegrityMismatch {
                expected_len,
                actual_len,
                first_difference,
                ..
            }) => {
                assert_eq!(expected_len, 6);
                assert_eq!(actual_len, 6);
                assert_eq!(first_difference, 5);
            }
            other => panic!("expected integrity mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_length_mismatch() {
        assert!(verify("n", b"abc", b"abc").is_ok());
        assert!(matches!(
            verify("n", b"abc", b"ab"),
            Err(HarnessError::IntegrityMismatch {
                first_difference: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_workers_run_fixed_iterations() {
        let store = Arc::new(FakeStore::default());
        let set = WorkerSet::spawn(4, bank(), store.clone(), options(Some(25), true));

        let report = set.wait().await.unwrap();
        assert_eq!(report.workers, 4);
        assert_eq!(report.iterations, 100);
        assert_eq!(report.verified, 100);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_stop_waits_for_all_workers() {
        let store = Arc::new(FakeStore::default());
        let set = WorkerSet::spawn(8, bank(), store.clone(), options(None, false));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let report = set.stop().await.unwrap();

        // Every started round trip completed: one upload per iteration
        assert_eq!(report.iterations, store.uploads.load(Ordering::SeqCst));
        assert_eq!(report.verified, report.iterations);
    }

    #[tokio::test]
    async fn test_transient_failures_do_not_abort() {
        let store = Arc::new(FakeStore {
            drop_uploads: true,
            ..FakeStore::default()
        });
        let set = WorkerSet::spawn(3, bank(), store, options(Some(5), false));

        let report = set.wait().await.unwrap();
        assert_eq!(report.iterations, 15);
        assert_eq!(report.transient, 15);
        assert_eq!(report.verified, 0);
    }

    #[tokio::test]
    async fn test_mismatch_stops_every_worker() {
        let store = Arc::new(FakeStore {
            corrupt: true,
            ..FakeStore::default()
        });
        let set = WorkerSet::spawn(4, bank(), store, options(None, false));

        let result = set.wait().await;
        assert!(matches!(result, Err(HarnessError::IntegrityMismatch { .. })));
    }
}
