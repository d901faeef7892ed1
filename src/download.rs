//! Concurrent GPX download into a [`GpxStore`].
//!
//! Downloads run with bounded concurrency; results are reported in input
//! order. A failing activity is recorded and does not stop the others,
//! unless the error is fatal for the whole session (authentication, rate
//! limit after retries): then no further downloads are started.

use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::directory::ActivityDirectory;
use crate::error::{DownloaderError, Result};
use crate::store::{GpxStore, WriteOutcome};
use crate::Activity;

/// Progress callback type: `(completed, total)`
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum downloads in flight
    pub concurrency: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// A download or write that failed.
#[derive(Debug)]
pub struct DownloadFailure {
    pub activity_id: u64,
    pub file_name: String,
    pub error: DownloaderError,
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub written: Vec<PathBuf>,
    /// Files that already existed
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<DownloadFailure>,
    /// Activities never requested because a fatal error stopped the batch
    pub not_attempted: Vec<u64>,
}

impl DownloadReport {
    /// Activities that were requested.
    pub fn total(&self) -> usize {
        self.written.len() + self.skipped.len() + self.failed.len()
    }

    /// The first failure that stopped the batch, if any.
    pub fn fatal(&self) -> Option<&DownloadFailure> {
        self.failed.iter().find(|f| f.error.is_fatal())
    }

    /// Take the first fatal error out of the report.
    pub fn take_fatal(&mut self) -> Option<DownloadFailure> {
        let index = self.failed.iter().position(|f| f.error.is_fatal())?;
        Some(self.failed.remove(index))
    }
}

async fn fetch_and_store<D: ActivityDirectory + ?Sized>(
    directory: &D,
    store: &GpxStore,
    activity: &Activity,
    file_name: &str,
) -> Result<WriteOutcome> {
    let gpx = directory.download_gpx(activity.id).await?;
    store.write(file_name, &gpx)
}

/// Download the GPX track of every activity and write it to `store`.
pub async fn download_all<D: ActivityDirectory + ?Sized>(
    directory: &D,
    store: &GpxStore,
    activities: &[Activity],
    config: &DownloadConfig,
    on_progress: Option<ProgressCallback>,
) -> DownloadReport {
    let total = activities.len() as u32;
    let completed = AtomicU32::new(0);
    let stopped = AtomicBool::new(false);
    let start = Instant::now();

    info!(
        "[Download] Fetching {} GPX files into {} ({} concurrent)",
        total,
        store.dir().display(),
        config.concurrency
    );

    let results: Vec<_> = stream::iter(activities)
        .map(|activity| {
            let completed = &completed;
            let stopped = &stopped;
            let callback = on_progress.clone();

            async move {
                if stopped.load(Ordering::Relaxed) {
                    return (activity, None);
                }
                let file_name = activity.file_name();
                let result = fetch_and_store(directory, store, activity, &file_name).await;
                if matches!(&result, Err(e) if e.is_fatal()) {
                    stopped.store(true, Ordering::Relaxed);
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref cb) = callback {
                    cb(done, total);
                }
                (activity, Some((file_name, result)))
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let mut report = DownloadReport::default();
    for (activity, attempt) in results {
        let Some((file_name, result)) = attempt else {
            report.not_attempted.push(activity.id);
            continue;
        };
        match result {
            Ok(WriteOutcome::Written(path)) => report.written.push(path),
            Ok(WriteOutcome::Skipped(path)) => report.skipped.push(path),
            Err(error) => {
                warn!(
                    "[Download] Activity {} ({}) failed: {}",
                    activity.id, file_name, error
                );
                report.failed.push(DownloadFailure {
                    activity_id: activity.id,
                    file_name,
                    error,
                });
            }
        }
    }

    if let Some(failure) = report.fatal() {
        warn!(
            "[Download] Stopped after activity {}: {} ({} not attempted)",
            failure.activity_id,
            failure.error,
            report.not_attempted.len()
        );
    }

    info!(
        "[Download] Completed in {:.2}s: {} written, {} skipped, {} failed",
        start.elapsed().as_secs_f64(),
        report.written.len(),
        report.skipped.len(),
        report.failed.len()
    );
    report
}
