//! Run orchestration: discover, convert, patch, report.
//!
//! ```text
//! mapping ──▶ work list ──▶ conversion_stream (≤ workers at once)
//!                                  │  completion order
//!                                  ▼
//!                         collect + progress
//!                                  │  sorted by reader page
//!                                  ▼
//!                          patch_page (one at a time) ──▶ RunReport
//! ```
//!
//! The archive is only read while converters run. All page writes happen
//! afterwards, sequentially and in reader-page order, so the final tree and
//! the report do not depend on which conversion finished first.

use crate::config::RunConfig;
use crate::error::ImagefillError;
use crate::output::{ConversionJob, ConversionOutcome, ConversionResult};
use crate::pipeline::{mapping, patch};
use crate::progress::ConversionCounters;
use crate::report::RunReport;
use crate::stream::conversion_stream;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// What a run did, phase by phase.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Page ↔ source pairs found in the archive.
    pub discovered: usize,
    /// Pairs dropped because the page already carries the marker.
    pub skipped_existing: usize,
    /// Jobs handed to the converter.
    pub queued: usize,
    pub counters: ConversionCounters,
    /// `None` when there was nothing to update.
    pub report: Option<RunReport>,
    /// Where the report was written; `None` in dry-run or when nothing changed.
    pub report_path: Option<PathBuf>,
}

impl RunSummary {
    fn nothing_to_do(discovered: usize, skipped_existing: usize, queued: usize, counters: ConversionCounters) -> Self {
        Self {
            discovered,
            skipped_existing,
            queued,
            counters,
            report: None,
            report_path: None,
        }
    }
}

/// Run the full pipeline described by `config`.
///
/// # Errors
/// Only fatal conditions: the archive cannot be listed, or the report
/// cannot be written. Per-document failures are counted in the report.
pub async fn run(config: &RunConfig) -> Result<RunSummary, ImagefillError> {
    // ── Phase 1: Discover ────────────────────────────────────────────────
    let start = Instant::now();
    let root = config.archive_root.clone();
    let theme = config.theme.clone();
    let force = config.force;
    let (jobs, discovered, skipped_existing) = tokio::task::spawn_blocking(move || {
        let found = mapping::build_mapping(&root, theme.as_deref())?;
        let discovered = found.len();
        let (remaining, skipped) = mapping::drop_processed(found, force);
        Ok::<_, ImagefillError>((mapping::work_list(&root, remaining), discovered, skipped))
    })
    .await
    .map_err(|e| ImagefillError::Internal(format!("Discovery task panicked: {e}")))??;

    info!(
        "Found {} source↔reader pairs in {:.1}s",
        discovered,
        start.elapsed().as_secs_f64()
    );
    if skipped_existing > 0 {
        info!(
            "Skipping {} already-processed pages (use --force to redo)",
            skipped_existing
        );
    }
    info!("{} files to convert", jobs.len());

    let queued = jobs.len();
    if jobs.is_empty() {
        info!("Nothing to convert");
        return Ok(RunSummary::nothing_to_do(
            discovered,
            skipped_existing,
            0,
            ConversionCounters::default(),
        ));
    }

    // ── Phase 2: Convert ─────────────────────────────────────────────────
    let (results, counters) = convert_all(jobs, config).await;

    if counters.with_images == 0 {
        info!("No files with images found. Nothing to update.");
        return Ok(RunSummary::nothing_to_do(
            discovered,
            skipped_existing,
            queued,
            counters,
        ));
    }

    // ── Phase 3: Patch ───────────────────────────────────────────────────
    let report = patch_all(results, config, skipped_existing, &counters).await;

    // ── Phase 4: Report ──────────────────────────────────────────────────
    let report_path = if config.dry_run {
        None
    } else {
        let path = config.resolved_report_path();
        report.write_to(&path)?;
        info!("Report written to {}", path.display());
        Some(path)
    };

    Ok(RunSummary {
        discovered,
        skipped_existing,
        queued,
        counters,
        report: Some(report),
        report_path,
    })
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(config: &RunConfig) -> Result<RunSummary, ImagefillError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ImagefillError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(run(config))
}

/// Convert every job, reporting progress as results arrive.
pub async fn convert_all(
    jobs: Vec<ConversionJob>,
    config: &RunConfig,
) -> (Vec<ConversionResult>, ConversionCounters) {
    let start = Instant::now();
    let mut counters = ConversionCounters::new(jobs.len());
    info!(
        "Converting {} files with {} workers",
        counters.total, config.workers
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(counters.total, config.workers);
    }

    let mut results = Vec::with_capacity(counters.total);
    let mut stream = conversion_stream(jobs, config);
    while let Some(result) = stream.next().await {
        counters.record(&result);
        log_completion(&counters, &result, config.progress_every);
        if let Some(ref cb) = config.progress_callback {
            cb.on_job_complete(&counters, &result);
        }
        results.push(result);
    }

    info!(
        "Done in {:.1}s: {} files with images, {} without, {} errors",
        start.elapsed().as_secs_f64(),
        counters.with_images,
        counters.skipped,
        counters.errors
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(&counters);
    }
    (results, counters)
}

fn log_completion(counters: &ConversionCounters, result: &ConversionResult, every: usize) {
    let src = &result.job.source;
    match &result.outcome {
        ConversionOutcome::Error(e) => warn!(
            "[{}/{}] {} {}/{}: {}",
            counters.completed,
            counters.total,
            e.kind(),
            src.theme,
            src.filename,
            e
        ),
        ConversionOutcome::Success(doc) => info!(
            "[{}/{}] {}/{} → {} image{}",
            counters.completed,
            counters.total,
            src.theme,
            src.filename,
            doc.images.len(),
            if doc.images.len() == 1 { "" } else { "s" }
        ),
        ConversionOutcome::Skipped if counters.is_progress_tick(every) => info!(
            "[{}/{}] progress... ({} with images, {} without)",
            counters.completed, counters.total, counters.with_images, counters.skipped
        ),
        ConversionOutcome::Skipped => {}
    }
}

/// Patch every successful result in reader-page order and build the report.
pub async fn patch_all(
    mut results: Vec<ConversionResult>,
    config: &RunConfig,
    skipped_existing: usize,
    counters: &ConversionCounters,
) -> RunReport {
    let start = Instant::now();
    let mut report = RunReport::new(config.dry_run, skipped_existing, counters);
    results.sort_by(|a, b| a.job.page.path.cmp(&b.job.page.path));

    let updates = results.iter().filter(|r| r.image_count() > 0).count();
    info!("Updating {} reader pages", updates);

    for result in results {
        let ConversionResult { job, outcome } = result;
        let doc = match outcome {
            ConversionOutcome::Success(doc) => doc,
            ConversionOutcome::Error(e) => {
                report.record_job_error(&job, &e);
                continue;
            }
            ConversionOutcome::Skipped => continue,
        };

        let images = doc.images.len();
        match patch::patch_page(&job.page, doc, config.dry_run).await {
            Ok(sizes) => {
                report.record_patched(&job, images, sizes);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_patched(&job.page, Some(sizes));
                }
            }
            Err(e) => {
                warn!("{}: {}", e.kind(), e);
                report.record_patch_failure(&job, e.kind(), e.to_string());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_patched(&job.page, None);
                }
            }
        }
    }

    info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    report
}
