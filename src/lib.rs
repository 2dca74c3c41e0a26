//! # archive-imagefill
//!
//! Restore embedded images to the reader pages of a static document archive.
//!
//! ## Why this crate?
//!
//! The archive's reader pages were generated from legacy office documents
//! (`.doc`, `.docx`, `.rtf`, `.odt`) by a text-only extractor, so every
//! figure, scan, and letterhead was lost. This crate re-converts the
//! originals with a headless LibreOffice, harvests the images it writes out,
//! cleans the HTML, and splices it into the existing pages. A marker comment
//! makes the operation idempotent.
//!
//! ## Pipeline Overview
//!
//! ```text
//! archive root
//!  │
//!  ├─ 1. Map      reader page ↔ source document via the download link
//!  ├─ 2. Filter   drop pages already carrying the marker (unless forced)
//!  ├─ 3. Convert  soffice → HTML + images, ≤ workers at once, own profile each
//!  ├─ 4. Clean    strip fonts/sizes/columns, rename images, rewrite <img src>
//!  ├─ 5. Patch    copy images, splice fragment, atomic page write (sequential)
//!  └─ 6. Report   per-theme table + JSON record
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archive_imagefill::{run, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::builder()
//!         .archive_root("/srv/archive")
//!         .workers(8)
//!         .build()?;
//!     let summary = run(&config).await?;
//!     if let Some(report) = summary.report {
//!         print!("{}", report.render_table());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `add-images` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! archive-imagefill = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod run;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RunConfig, RunConfigBuilder};
pub use error::{ImagefillError, JobError, PatchError};
pub use output::{
    ConversionJob, ConversionOutcome, ConversionResult, ConvertedDocument, ImageAsset,
    PatchSizes, ReaderPage, SourceDocument,
};
pub use progress::{ConversionCounters, NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use report::{RunReport, ThemeStats};
pub use run::{run, run_sync, RunSummary};
pub use stream::conversion_stream;
