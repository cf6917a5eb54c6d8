//! Concurrent batch extraction with retries.
//!
//! Files are processed on a fixed-size rayon pool in chunks of
//! `workers × batch_size_multiplier`. Each file runs through its own retry
//! state machine and produces a [`BatchItem`]; items are collected in
//! completion order over a crossbeam channel. A failing file never aborts
//! the batch.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::extractor::OutlineExtractor;
use crate::model::ExtractionResult;

/// Retry schedule for a single file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per file, including the first
    pub max_attempts: u32,

    /// Multiplier applied to the delay after each failed attempt
    pub backoff_base: f64,

    /// Delay after the first failed attempt, in seconds
    pub initial_delay_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2.0,
            initial_delay_secs: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff base.
    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the delay after the first failure.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_secs = delay.as_secs_f64();
        self
    }

    /// Delay before the attempt that follows failed attempt `attempt`
    /// (1-based): `initial × base^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay_secs * self.backoff_base.powi(exponent);
        if secs.is_nan() || secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        }
    }
}

/// Options for the batch driver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Upper bound on worker threads
    pub max_workers: usize,

    /// Files submitted per chunk, in multiples of the worker count
    pub batch_size_multiplier: usize,

    /// Per-file retry schedule
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_workers: 6,
            batch_size_multiplier: 2,
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchOptions {
    /// Create batch options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker limit.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Set the chunk multiplier.
    pub fn with_batch_size_multiplier(mut self, multiplier: usize) -> Self {
        self.batch_size_multiplier = multiplier.max(1);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry state of one file. Attempt numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Waiting to run attempt `n`
    Pending(u32),
    /// Attempt `n` is running
    Attempting(u32),
    /// Attempt `n` succeeded
    Succeeded(u32),
    /// All `n` attempts failed
    PermanentlyFailed(u32),
}

impl AttemptState {
    /// Start the pending attempt.
    pub fn start(self) -> Self {
        match self {
            AttemptState::Pending(n) => AttemptState::Attempting(n),
            other => other,
        }
    }

    /// Record a successful attempt.
    pub fn succeed(self) -> Self {
        match self {
            AttemptState::Attempting(n) => AttemptState::Succeeded(n),
            other => other,
        }
    }

    /// Record a failed attempt: retry while attempts remain.
    pub fn fail(self, max_attempts: u32) -> Self {
        match self {
            AttemptState::Attempting(n) if n < max_attempts => AttemptState::Pending(n + 1),
            AttemptState::Attempting(n) => AttemptState::PermanentlyFailed(n),
            other => other,
        }
    }

    /// Whether no further attempt will run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Succeeded(_) | AttemptState::PermanentlyFailed(_)
        )
    }
}

/// Outcome of one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub file_name: String,
    /// Wall time across all attempts, including backoff
    pub duration: Duration,
    pub success: bool,
    pub attempts: u32,
    /// Message of the last failed attempt
    pub error: Option<String>,
    /// Headings written for a successful file
    pub outline_items: usize,
}

/// Aggregate of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Items in completion order
    pub items: Vec<BatchItem>,
    /// Worker threads used
    pub workers: usize,
    /// Elapsed time of the whole run
    pub wall_time: Duration,
}

impl BatchSummary {
    /// Number of files processed.
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Number of files written successfully.
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.success).count()
    }

    /// Number of files that exhausted their retries.
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Sum of per-file durations.
    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(|i| i.duration).sum()
    }

    /// Mean per-file duration (zero for an empty run).
    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.items.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.total_duration() / n,
        }
    }

    /// Items that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.iter().filter(|i| !i.success)
    }
}

/// List the PDF files of a directory, sorted by name.
///
/// Matches `*.pdf` case-insensitively; a missing directory is an error.
pub fn discover_inputs(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Path of the JSON artifact for `input`: `<output_dir>/<stem>.json`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.json", stem))
}

/// Runs an [`OutlineExtractor`] over many files.
pub struct BatchProcessor {
    extractor: Arc<OutlineExtractor>,
    options: BatchOptions,
}

impl BatchProcessor {
    /// Create a batch processor.
    pub fn new(extractor: Arc<OutlineExtractor>, options: BatchOptions) -> Self {
        Self { extractor, options }
    }

    /// Get the batch options.
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Worker count for `file_count` files:
    /// `min(max_workers, available parallelism, file_count)`.
    pub fn worker_count(&self, file_count: usize) -> usize {
        let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        self.options.max_workers.min(cpus).min(file_count).max(1)
    }

    /// Discover the PDFs in `input_dir` and process them into `output_dir`.
    pub fn run_dir(&self, input_dir: &Path, output_dir: &Path) -> Result<BatchSummary> {
        let files = discover_inputs(input_dir)?;
        Ok(self.run(&files, output_dir))
    }

    /// Process `files`; never fails.
    pub fn run(&self, files: &[PathBuf], output_dir: &Path) -> BatchSummary {
        self.run_with_progress(files, output_dir, |_| {})
    }

    /// Process `files`, calling `progress` as each file completes.
    pub fn run_with_progress<F>(
        &self,
        files: &[PathBuf],
        output_dir: &Path,
        progress: F,
    ) -> BatchSummary
    where
        F: Fn(&BatchItem) + Sync,
    {
        let start = Instant::now();
        if files.is_empty() {
            log::info!("No PDF files to process");
            return BatchSummary::default();
        }

        let workers = self.worker_count(files.len());
        let chunk_size = workers * self.options.batch_size_multiplier.max(1);
        log::info!(
            "Processing {} files with {} workers (chunks of {})",
            files.len(),
            workers,
            chunk_size
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pdf-outline-{}", i))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()));

        let mut items = Vec::with_capacity(files.len());
        for chunk in files.chunks(chunk_size) {
            match &pool {
                Ok(pool) => pool.in_place_scope(|scope| {
                    let (tx, rx) = crossbeam_channel::unbounded();
                    for path in chunk {
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            let _ = tx.send(self.process_file(path, output_dir));
                        });
                    }
                    drop(tx);

                    for item in rx.iter() {
                        progress(&item);
                        items.push(item);
                    }
                }),
                Err(e) => {
                    log::warn!("{}; processing sequentially", e);
                    for path in chunk {
                        let item = self.process_file(path, output_dir);
                        progress(&item);
                        items.push(item);
                    }
                }
            }
        }

        let summary = BatchSummary {
            items,
            workers,
            wall_time: start.elapsed(),
        };
        log::info!(
            "Batch complete: {}/{} succeeded in {:.2?}",
            summary.succeeded(),
            summary.total(),
            summary.wall_time
        );
        summary
    }

    /// Drive one file through its retry state machine.
    fn process_file(&self, path: &Path, output_dir: &Path) -> BatchItem {
        let start = Instant::now();
        let max_attempts = self.options.retry.max_attempts.max(1);
        let mut state = AttemptState::Pending(1);
        let mut error = None;
        let mut outline_items = 0;

        while !state.is_terminal() {
            state = state.start();
            let AttemptState::Attempting(n) = state else {
                break;
            };

            match self.attempt(path, output_dir) {
                Ok(result) => {
                    outline_items = result.outline.len();
                    error = None;
                    state = state.succeed();
                }
                Err(e) => {
                    log::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        n,
                        max_attempts,
                        path.display(),
                        e
                    );
                    error = Some(e.to_string());
                    state = state.fail(max_attempts);
                    if let AttemptState::Pending(_) = state {
                        thread::sleep(self.options.retry.delay_after(n));
                    }
                }
            }
        }

        let (success, attempts) = match state {
            AttemptState::Succeeded(n) => (true, n),
            AttemptState::PermanentlyFailed(n) => (false, n),
            AttemptState::Pending(n) | AttemptState::Attempting(n) => (false, n),
        };

        BatchItem {
            file_name: path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            duration: start.elapsed(),
            success,
            attempts,
            error,
            outline_items,
        }
    }

    /// One attempt: extract, then write `<stem>.json`.
    ///
    /// A panic inside the decoder fails the attempt like any decode error.
    fn attempt(&self, path: &Path, output_dir: &Path) -> Result<ExtractionResult> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.extractor.extract(path)))
            .map_err(|payload| {
                Error::Decode(format!("decoder panicked: {}", panic_message(&*payload)))
            })??;
        fs::create_dir_all(output_dir)?;
        fs::write(output_path_for(path, output_dir), result.to_json_pretty()?)?;
        Ok(result)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_retry_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));

        let none = RetryPolicy::new().with_initial_delay(Duration::ZERO);
        assert_eq!(none.delay_after(3), Duration::ZERO);

        let huge = RetryPolicy {
            initial_delay_secs: 1e30,
            ..RetryPolicy::default()
        };
        assert_eq!(huge.delay_after(1), Duration::MAX);
        let infinite = RetryPolicy::new().with_backoff_base(f64::INFINITY);
        assert_eq!(infinite.delay_after(3), Duration::MAX);
    }

    #[test]
    fn test_attempt_state_machine() {
        let state = AttemptState::Pending(1).start();
        assert_eq!(state, AttemptState::Attempting(1));
        assert_eq!(state.fail(3), AttemptState::Pending(2));
        assert_eq!(state.succeed(), AttemptState::Succeeded(1));

        let last = AttemptState::Pending(3).start();
        assert_eq!(last.fail(3), AttemptState::PermanentlyFailed(3));
        assert!(last.fail(3).is_terminal());
        assert!(!AttemptState::Pending(2).is_terminal());
    }

    #[test]
    fn test_discover_inputs() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.bak"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let names: Vec<String> = discover_inputs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);

        assert!(discover_inputs(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_output_path() {
        let out = output_path_for(Path::new("/in/report.v2.pdf"), Path::new("/out"));
        assert_eq!(out, PathBuf::from("/out/report.v2.json"));
    }

    #[test]
    fn test_worker_count_bounds() {
        let batch = BatchProcessor::new(
            Arc::new(OutlineExtractor::new()),
            BatchOptions::new().with_max_workers(6),
        );
        assert_eq!(batch.worker_count(1), 1);
        assert!(batch.worker_count(100) <= 6);
        assert!(batch.worker_count(0) >= 1);
    }

    #[test]
    fn test_summary_durations() {
        let item = |ms, success| BatchItem {
            file_name: "f.pdf".to_string(),
            duration: Duration::from_millis(ms),
            success,
            attempts: 1,
            error: None,
            outline_items: 0,
        };
        let summary = BatchSummary {
            items: vec![item(100, true), item(300, false)],
            workers: 2,
            wall_time: Duration::from_millis(320),
        };
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.total_duration(), Duration::from_millis(400));
        assert_eq!(summary.average_duration(), Duration::from_millis(200));
        assert_eq!(BatchSummary::default().average_duration(), Duration::ZERO);
    }

    #[test]
    fn test_empty_run() {
        let dir = TempDir::new().unwrap();
        let batch = BatchProcessor::new(Arc::new(OutlineExtractor::new()), BatchOptions::default());
        let summary = batch.run(&[], dir.path());
        assert_eq!(summary.total(), 0);
    }
}
