//! Error types for the archive-imagefill library.
//!
//! Three error types reflect three failure scopes:
//!
//! * [`ImagefillError`]: **Fatal**: the run cannot proceed at all
//!   (archive root unreadable, invalid configuration, report not writable).
//!   Returned as `Err(ImagefillError)` from [`crate::run::run`].
//!
//! * [`JobError`]: **Per document**: one conversion failed. Stored in
//!   [`crate::output::ConversionOutcome::Error`] and counted in the report;
//!   every other document is unaffected.
//!
//! * [`PatchError`]: **Per page**: a successful conversion could not be
//!   spliced into its reader page. Logged as a warning and counted.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the library.
#[derive(Debug, Error)]
pub enum ImagefillError {
    /// The archive root (or a theme's reader area) could not be listed.
    #[error("Cannot read archive at '{path}': {source}")]
    ArchiveUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write the run report.
    #[error("Failed to write report '{path}': {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single conversion job.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum JobError {
    /// The converter exited unsuccessfully. `code` is `None` when it was
    /// terminated by a signal.
    #[error("converter exit code {}: {stderr}", exit_label(.code))]
    ConverterFailed { code: Option<i32>, stderr: String },

    /// The converter exceeded the wall-clock limit and was killed.
    #[error("timeout after {secs}s")]
    Timeout { secs: u64 },

    /// The converter succeeded but left no HTML file behind.
    #[error("no HTML output produced")]
    NoOutput,

    /// Anything else that went wrong around the conversion.
    #[error("{0}")]
    Internal(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "signal".to_string(),
    }
}

impl JobError {
    /// Stable classification used in logs and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::ConverterFailed { .. } => "converter-error",
            JobError::Timeout { .. } => "timeout",
            JobError::NoOutput => "no-output",
            JobError::Internal(_) => "internal-error",
        }
    }
}

/// A non-fatal error while patching one reader page.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The page lacks the expected container or its closing tag.
    #[error("{path}: {detail}")]
    StructuralMismatch { path: PathBuf, detail: String },

    /// Copying an image into the page's asset directory failed. The job's
    /// temporary directory has been preserved at `kept`.
    #[error("Failed to copy image to '{dest}' (temporary files kept in '{kept}'): {source}")]
    AssetCopyFailed {
        dest: PathBuf,
        kept: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing the reader page failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            PatchError::StructuralMismatch { .. } => "structural-mismatch",
            PatchError::AssetCopyFailed { .. } => "asset-copy-failed",
            PatchError::Io { .. } => "page-io-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converter_failed_display_with_code() {
        let e = JobError::ConverterFailed {
            code: Some(77),
            stderr: "Error: source file could not be loaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("77"), "got: {msg}");
        assert!(msg.contains("could not be loaded"), "got: {msg}");
        assert_eq!(e.kind(), "converter-error");
    }

    #[test]
    fn converter_failed_display_by_signal() {
        let e = JobError::ConverterFailed {
            code: None,
            stderr: String::new(),
        };
        assert!(e.to_string().contains("signal"));
    }

    #[test]
    fn job_error_kinds() {
        assert_eq!(JobError::Timeout { secs: 60 }.kind(), "timeout");
        assert_eq!(JobError::NoOutput.kind(), "no-output");
        assert_eq!(JobError::Internal("x".into()).kind(), "internal-error");
        assert!(JobError::Timeout { secs: 60 }.to_string().contains("60s"));
    }

    #[test]
    fn structural_mismatch_kind() {
        let e = PatchError::StructuralMismatch {
            path: PathBuf::from("read/letter.html"),
            detail: "no reader-content container".into(),
        };
        assert_eq!(e.kind(), "structural-mismatch");
        assert!(e.to_string().contains("letter.html"));
    }
}
