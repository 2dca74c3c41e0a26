//! Progress-callback trait for per-run conversion events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the run converts and patches documents.
//!
//! Counters live in a [`ConversionCounters`] owned by the run and handed to
//! every callback, so there is no process-wide state and two runs in one
//! process never see each other's numbers.
//!
//! # Example
//!
//! ```rust
//! use archive_imagefill::{ConversionCounters, ConversionResult, RunConfig, RunProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl RunProgressCallback for Printer {
//!     fn on_job_complete(&self, counters: &ConversionCounters, result: &ConversionResult) {
//!         eprintln!("[{}/{}] {}", counters.completed, counters.total, result.job.source.filename);
//!     }
//! }
//!
//! let config = RunConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ConversionOutcome, ConversionResult, PatchSizes, ReaderPage};
use serde::Serialize;
use std::sync::Arc;

/// Running tally of the conversion phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounters {
    pub total: usize,
    pub completed: usize,
    pub with_images: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl ConversionCounters {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Account for one finished job.
    pub fn record(&mut self, result: &ConversionResult) {
        self.completed += 1;
        match result.outcome {
            ConversionOutcome::Error(_) => self.errors += 1,
            ConversionOutcome::Skipped => self.skipped += 1,
            ConversionOutcome::Success(_) => self.with_images += 1,
        }
    }

    /// Whether a quiet completion should surface, given a cadence of `every`.
    pub fn is_progress_tick(&self, every: usize) -> bool {
        self.completed == self.total || (every > 0 && self.completed % every == 0)
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }
}

/// Called by the run as it converts and patches documents.
///
/// Conversion events arrive in completion order, one at a time, from the
/// task driving the run. All methods default to no-ops.
pub trait RunProgressCallback: Send + Sync {
    /// Called once before any converter is started.
    fn on_conversion_start(&self, total_jobs: usize, workers: usize) {
        let _ = (total_jobs, workers);
    }

    /// Called after each job finishes, with counters already updated.
    fn on_job_complete(&self, counters: &ConversionCounters, result: &ConversionResult) {
        let _ = (counters, result);
    }

    /// Called once after every job has finished.
    fn on_conversion_complete(&self, counters: &ConversionCounters) {
        let _ = counters;
    }

    /// Called after each page in the patch phase; `sizes` is `None` when
    /// the page could not be patched.
    fn on_page_patched(&self, page: &ReaderPage, sizes: Option<PatchSizes>) {
        let _ = (page, sizes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::output::{ConversionJob, SourceDocument};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn result(outcome: ConversionOutcome) -> ConversionResult {
        ConversionResult {
            job: ConversionJob {
                index: 1,
                source: SourceDocument {
                    theme: "01-a".into(),
                    filename: "a.doc".into(),
                    path: PathBuf::from("a.doc"),
                },
                page: ReaderPage {
                    theme: "01-a".into(),
                    slug: "a".into(),
                    path: PathBuf::from("a.html"),
                },
            },
            outcome,
        }
    }

    #[test]
    fn counters_tally_outcomes() {
        let mut c = ConversionCounters::new(3);
        c.record(&result(ConversionOutcome::Skipped));
        c.record(&result(ConversionOutcome::Error(JobError::NoOutput)));
        assert_eq!((c.completed, c.skipped, c.errors), (2, 1, 1));
        assert!(!c.is_done());
        c.record(&result(ConversionOutcome::Skipped));
        assert!(c.is_done());
    }

    #[test]
    fn progress_tick_cadence() {
        let mut c = ConversionCounters::new(250);
        c.completed = 99;
        assert!(!c.is_progress_tick(100));
        c.completed = 100;
        assert!(c.is_progress_tick(100));
        c.completed = 250;
        assert!(c.is_progress_tick(100));
    }

    struct Tracking {
        jobs: AtomicUsize,
    }

    impl RunProgressCallback for Tracking {
        fn on_job_complete(&self, _counters: &ConversionCounters, _result: &ConversionResult) {
            self.jobs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn arc_dyn_callback_works() {
        let t = Arc::new(Tracking {
            jobs: AtomicUsize::new(0),
        });
        let cb: ProgressCallback = t.clone();
        let c = ConversionCounters::new(1);
        cb.on_conversion_start(1, 4);
        cb.on_job_complete(&c, &result(ConversionOutcome::Skipped));
        cb.on_conversion_complete(&c);
        assert_eq!(t.jobs.load(Ordering::SeqCst), 1);

        let noop: ProgressCallback = Arc::new(NoopProgressCallback);
        noop.on_page_patched(&result(ConversionOutcome::Skipped).job.page, None);
    }
}
