//! Data model shared by the pipeline stages.
//!
//! ```text
//! SourceDocument ─┐
//!                 ├─▶ ConversionJob ──▶ ConversionResult ──▶ PatchSizes
//! ReaderPage ─────┘                     (Error | Skipped | Success)
//! ```
//!
//! A [`ConversionResult`] carries its [`ConversionJob`] so it can be patched
//! and reported independently of the task that produced it.

use crate::error::JobError;
use serde::Serialize;
use std::path::PathBuf;
use tempfile::TempDir;

/// An office document under `<theme>/files/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDocument {
    pub theme: String,
    pub filename: String,
    pub path: PathBuf,
}

/// A reader page under `<theme>/read/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReaderPage {
    pub theme: String,
    pub slug: String,
    pub path: PathBuf,
}

/// One document queued for conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    /// 1-based position in the work list.
    pub index: usize,
    pub source: SourceDocument,
    pub page: ReaderPage,
}

/// A harvested image: where it sits now and what it will be called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub original: String,
    pub renamed: String,
    /// Current location inside the job's temporary directory.
    pub source_path: PathBuf,
}

/// A successful conversion awaiting the patch phase.
///
/// Owns the job's temporary directory: the image files in `images` live
/// there until the patcher has copied them.
#[derive(Debug)]
pub struct ConvertedDocument {
    pub fragment: String,
    pub images: Vec<ImageAsset>,
    pub workdir: TempDir,
}

#[derive(Debug)]
pub enum ConversionOutcome {
    Error(JobError),
    /// The converter ran fine but produced no images.
    Skipped,
    Success(ConvertedDocument),
}

/// Outcome of one job, tagged with the job it belongs to.
#[derive(Debug)]
pub struct ConversionResult {
    pub job: ConversionJob,
    pub outcome: ConversionOutcome,
}

impl ConversionResult {
    pub fn error(&self) -> Option<&JobError> {
        match &self.outcome {
            ConversionOutcome::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ConversionOutcome::Skipped)
    }

    /// Number of images harvested (zero unless successful).
    pub fn image_count(&self) -> usize {
        match &self.outcome {
            ConversionOutcome::Success(doc) => doc.images.len(),
            _ => 0,
        }
    }
}

/// Byte counts returned by the patcher.
///
/// `after` includes the copied (or, in dry-run, estimated) image bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchSizes {
    pub before: u64,
    pub after: u64,
}

impl PatchSizes {
    pub fn delta(&self) -> i64 {
        self.after as i64 - self.before as i64
    }
}
