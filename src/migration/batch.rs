//! Windowed batch writes with progress reporting and per-window fault isolation
//!
//! A record set is cut into consecutive windows of at most `batch_size`
//! items. Windows are written strictly in order. A window whose write
//! function fails with [`BatchFailure::Skip`] is logged and dropped; the
//! processor then continues with the next window. Only
//! [`BatchFailure::Abort`] stops processing and reaches the caller.

use crate::constants::DEFAULT_PROGRESS_INTERVAL_MS;
use crate::error::{MigratorError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Callback receiving every emitted `(processed, total)` progress pair
pub type ProgressObserver = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Batch processing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum items per window; must be greater than 0
    pub batch_size: usize,
    /// Minimum time between two progress reports
    pub progress_interval: Duration,
    pub report_progress: bool,
    /// Draw an indicatif bar on stderr in addition to log lines
    pub show_progress_bar: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: crate::constants::DEFAULT_BATCH_SIZE,
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            report_progress: true,
            show_progress_bar: false,
        }
    }
}

impl BatchOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_report_progress(mut self, enabled: bool) -> Self {
        self.report_progress = enabled;
        self
    }

    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.show_progress_bar = enabled;
        self
    }
}

/// Failure of a single window write
#[derive(Debug)]
pub enum BatchFailure {
    /// Drop this window and continue with the next one
    Skip(MigratorError),
    /// Stop processing and propagate the error
    Abort(MigratorError),
}

impl BatchFailure {
    /// Lost connections and closed sessions make every later window fail
    /// as well, so those abort; anything else only costs this window.
    pub fn from_store_error(err: MigratorError) -> Self {
        match err {
            MigratorError::NotConnected | MigratorError::TransactionState { .. } => {
                BatchFailure::Abort(err)
            }
            other => BatchFailure::Skip(other),
        }
    }

    pub fn error(&self) -> &MigratorError {
        match self {
            BatchFailure::Skip(err) | BatchFailure::Abort(err) => err,
        }
    }
}

impl From<MigratorError> for BatchFailure {
    fn from(err: MigratorError) -> Self {
        BatchFailure::Skip(err)
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.error(), f)
    }
}

/// Outcome of processing a full record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<R> {
    /// Results of every successful window, in window order
    pub results: Vec<R>,
    /// Windows attempted
    pub windows: usize,
    /// Windows dropped after a failed write
    pub failed_windows: usize,
    /// Items handed to the write function, including failed windows
    pub processed: usize,
}

impl<R> BatchReport<R> {
    fn empty() -> Self {
        Self {
            results: Vec::new(),
            windows: 0,
            failed_windows: 0,
            processed: 0,
        }
    }
}

pub struct BatchProcessor {
    options: BatchOptions,
    label: String,
    observer: Option<ProgressObserver>,
}

impl BatchProcessor {
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options,
            label: "records".to_string(),
            observer: None,
        }
    }

    /// Name used in log lines, usually the target collection
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Number of windows `total` items are cut into
    pub fn window_count(&self, total: usize) -> usize {
        if self.options.batch_size == 0 {
            return 0;
        }
        total.div_ceil(self.options.batch_size)
    }

    /// Run `write(window, start, end)` over consecutive windows of `items`.
    ///
    /// `start..end` is the window's position in `items`.
    pub async fn process<'a, T, R, F, Fut>(
        &self,
        items: &'a [T],
        mut write: F,
    ) -> Result<BatchReport<R>>
    where
        F: FnMut(&'a [T], usize, usize) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<R>, BatchFailure>>,
    {
        let batch_size = self.options.batch_size;
        if batch_size == 0 {
            return Err(MigratorError::configuration(
                "batch_size must be greater than 0",
            ));
        }

        let total = items.len();
        let started = Instant::now();
        info!(
            label = %self.label,
            total,
            batch_size,
            "Starting batch processing of {} {} in {} batches",
            total,
            self.label,
            self.window_count(total)
        );

        let progress_bar = self.progress_bar(total);
        let mut report = BatchReport::empty();
        let mut last_report = Instant::now();

        for (window, chunk) in items.chunks(batch_size).enumerate() {
            let start = window * batch_size;
            let end = start + chunk.len();
            report.windows += 1;

            debug!(batch_start = start, batch_end = end, "Writing batch {}", window + 1);
            match write(chunk, start, end).await {
                Ok(results) => report.results.extend(results),
                Err(BatchFailure::Skip(err)) => {
                    report.failed_windows += 1;
                    warn!(
                        batch_start = start,
                        batch_end = end,
                        "Batch {}-{} of {} failed, skipping: {}",
                        start,
                        end,
                        self.label,
                        err
                    );
                }
                Err(BatchFailure::Abort(err)) => {
                    if let Some(pb) = &progress_bar {
                        pb.abandon_with_message(format!("Aborted at {}/{}", start, total));
                    }
                    return Err(err);
                }
            }

            report.processed = end;
            if let Some(pb) = &progress_bar {
                pb.set_position(end as u64);
            }
            if self.options.report_progress
                && last_report.elapsed() >= self.options.progress_interval
            {
                self.report_progress(end, total);
                last_report = Instant::now();
            }
        }

        if let Some(pb) = &progress_bar {
            pb.finish_with_message(format!("{} done", self.label));
        }
        info!(
            label = %self.label,
            "Batch processing of {} complete: {} batches, {} failed, {} results in {:.2?}",
            self.label,
            report.windows,
            report.failed_windows,
            report.results.len(),
            started.elapsed()
        );
        Ok(report)
    }

    fn report_progress(&self, processed: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 / total as f64 * 100.0
        };
        info!(
            "Progress: {}/{} {} ({:.1}%)",
            processed, total, self.label, percent
        );
        if let Some(observer) = &self.observer {
            observer(processed, total);
        }
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.options.show_progress_bar || total == 0 {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message(self.label.clone());
        Some(pb)
    }
}
