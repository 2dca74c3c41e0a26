//! Run report: per-theme and total statistics.
//!
//! Built once per run from the conversion results and the patcher's byte
//! counts. The report makes no decisions; it only adds things up, renders a
//! terminal table, and persists a JSON record for later auditing.

use crate::error::{ImagefillError, JobError};
use crate::output::{ConversionJob, PatchSizes};
use crate::progress::ConversionCounters;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Counts and sizes for one theme (or the whole run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThemeStats {
    pub updated: usize,
    pub images: usize,
    pub before_bytes: u64,
    pub after_bytes: u64,
}

impl ThemeStats {
    fn add(&mut self, images: usize, sizes: PatchSizes) {
        self.updated += 1;
        self.images += images;
        self.before_bytes += sizes.before;
        self.after_bytes += sizes.after;
    }

    pub fn delta(&self) -> i64 {
        self.after_bytes as i64 - self.before_bytes as i64
    }
}

/// One patched (or, in dry-run, estimated) document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub theme: String,
    pub source: String,
    pub reader: String,
    pub num_images: usize,
}

/// One document that could not be converted or patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub theme: String,
    pub source: String,
    pub reader: String,
    pub kind: String,
    pub detail: String,
}

/// Aggregate record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub dry_run: bool,
    pub themes: BTreeMap<String, ThemeStats>,
    pub totals: ThemeStats,
    pub errors: usize,
    pub skipped_no_images: usize,
    pub skipped_existing: usize,
    pub structural_mismatches: usize,
    pub files: Vec<FileEntry>,
    pub failures: Vec<FailureEntry>,
}

impl RunReport {
    pub fn new(dry_run: bool, skipped_existing: usize, counters: &ConversionCounters) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            dry_run,
            themes: BTreeMap::new(),
            totals: ThemeStats::default(),
            errors: counters.errors,
            skipped_no_images: counters.skipped,
            skipped_existing,
            structural_mismatches: 0,
            files: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Account for a page the patcher updated (or estimated).
    pub fn record_patched(&mut self, job: &ConversionJob, images: usize, sizes: PatchSizes) {
        self.themes
            .entry(job.page.theme.clone())
            .or_default()
            .add(images, sizes);
        self.totals.add(images, sizes);
        self.files.push(FileEntry {
            theme: job.source.theme.clone(),
            source: job.source.filename.clone(),
            reader: job.page.slug.clone(),
            num_images: images,
        });
    }

    /// Account for a conversion that failed.
    pub fn record_job_error(&mut self, job: &ConversionJob, error: &JobError) {
        self.failures.push(failure(job, error.kind(), error.to_string()));
    }

    /// Account for a page the patcher had to leave alone.
    pub fn record_patch_failure(&mut self, job: &ConversionJob, kind: &str, detail: String) {
        if kind == "structural-mismatch" {
            self.structural_mismatches += 1;
        }
        self.failures.push(failure(job, kind, detail));
    }

    /// Fixed-width summary table for the terminal.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let prefix = if self.dry_run { "[DRY RUN] " } else { "" };
        let _ = writeln!(out, "{prefix}Summary\n");
        let _ = writeln!(
            out,
            "{:<30} | {:>7} | {:>6} | {:>10} | {:>10} | {:>10}",
            "Theme", "Updated", "Images", "Before", "After", "Delta"
        );
        let _ = writeln!(out, "{}", "-".repeat(85));
        for (theme, s) in &self.themes {
            let _ = writeln!(out, "{}", row(theme, s));
        }
        let _ = writeln!(out, "{}", "-".repeat(85));
        let _ = writeln!(out, "{}", row("TOTAL", &self.totals));
        out
    }

    /// Serialise to `path` via a temp file and rename.
    pub fn write_to(&self, path: &Path) -> Result<(), ImagefillError> {
        let write_err = |source| ImagefillError::ReportWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| ImagefillError::Internal(format!("report serialisation: {e}")))?;
        json.push('\n');

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(write_err)?;
        std::fs::rename(&tmp_path, path).map_err(write_err)
    }
}

fn failure(job: &ConversionJob, kind: &str, detail: String) -> FailureEntry {
    FailureEntry {
        theme: job.source.theme.clone(),
        source: job.source.filename.clone(),
        reader: job.page.slug.clone(),
        kind: kind.to_string(),
        detail,
    }
}

fn row(label: &str, s: &ThemeStats) -> String {
    format!(
        "{:<30} | {:>7} | {:>6} | {:>10} | {:>10} | {:>10}",
        label,
        s.updated,
        s.images,
        format_size(s.before_bytes as f64),
        format_size(s.after_bytes as f64),
        format_delta(s.delta()),
    )
}

/// Human-readable size, 1024-based, one decimal.
pub fn format_size(mut bytes: f64) -> String {
    for unit in ["B", "KB", "MB", "GB"] {
        if bytes.abs() < 1024.0 {
            return format!("{bytes:.1} {unit}");
        }
        bytes /= 1024.0;
    }
    format!("{bytes:.1} TB")
}

fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { "-" } else { "+" };
    format!("{sign}{}", format_size(delta.unsigned_abs() as f64))
}
