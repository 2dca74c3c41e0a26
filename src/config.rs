//! Configuration for an image-embedding run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. The CLI maps its flags onto the builder; tests and
//! library callers set only the fields they care about.

use crate::error::ImagefillError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for one run over the archive.
///
/// # Example
/// ```rust
/// use archive_imagefill::RunConfig;
///
/// let config = RunConfig::builder()
///     .archive_root("/srv/archive")
///     .workers(8)
///     .theme("02-family-chronicle")
///     .dry_run(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 8);
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Directory holding the `NN-theme/` directories. Default: `.`.
    pub archive_root: PathBuf,

    /// Number of converter invocations allowed to run at once. Default: 4.
    ///
    /// Each invocation is a full office-suite process; memory rather than
    /// CPU is usually the limit.
    pub workers: usize,

    /// Restrict the run to a single theme directory (e.g. `02-family-chronicle`).
    pub theme: Option<String>,

    /// Re-process pages that already carry the marker. Default: false.
    pub force: bool,

    /// Estimate size deltas without touching the archive. Default: false.
    pub dry_run: bool,

    /// Converter program. Default: `soffice`.
    pub converter: String,

    /// Arguments placed before the standard converter flags, for wrappers
    /// such as `flatpak run org.libreoffice.LibreOffice`.
    pub converter_args: Vec<String>,

    /// Wall-clock limit per converter invocation in seconds. Default: 60.
    pub timeout_secs: u64,

    /// Parent of the per-slot converter profile directories. Default: the
    /// system temporary directory.
    pub profile_root: PathBuf,

    /// Parent of each job's temporary output directory (`lo_conv_*`).
    /// Default: the system temporary directory.
    pub work_root: PathBuf,

    /// Where the run report is written. Default: `<archive_root>/scripts/image_report.json`.
    pub report_path: Option<PathBuf>,

    /// Emit a progress event for image-less completions every N jobs. Default: 100.
    pub progress_every: usize,

    /// Receives per-run progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            archive_root: PathBuf::from("."),
            workers: 4,
            theme: None,
            force: false,
            dry_run: false,
            converter: "soffice".to_string(),
            converter_args: Vec::new(),
            timeout_secs: 60,
            profile_root: std::env::temp_dir(),
            work_root: std::env::temp_dir(),
            report_path: None,
            progress_every: 100,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("archive_root", &self.archive_root)
            .field("workers", &self.workers)
            .field("theme", &self.theme)
            .field("force", &self.force)
            .field("dry_run", &self.dry_run)
            .field("converter", &self.converter)
            .field("converter_args", &self.converter_args)
            .field("timeout_secs", &self.timeout_secs)
            .field("profile_root", &self.profile_root)
            .field("work_root", &self.work_root)
            .field("report_path", &self.report_path)
            .field("progress_every", &self.progress_every)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
        }
    }

    /// Report location, falling back to `<archive_root>/scripts/image_report.json`.
    pub fn resolved_report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| self.archive_root.join("scripts").join("image_report.json"))
    }

    /// Profile directory for a worker slot.
    pub fn profile_dir(&self, slot: usize) -> PathBuf {
        self.profile_root.join(format!("lo_profile_{slot}"))
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn archive_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.archive_root = root.as_ref().to_path_buf();
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.config.theme = Some(theme.into());
        self
    }

    pub fn force(mut self, v: bool) -> Self {
        self.config.force = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn converter(mut self, program: impl Into<String>) -> Self {
        self.config.converter = program.into();
        self
    }

    pub fn converter_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.converter_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn profile_root(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.profile_root = dir.as_ref().to_path_buf();
        self
    }

    pub fn work_root(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.work_root = dir.as_ref().to_path_buf();
        self
    }

    pub fn report_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.report_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn progress_every(mut self, n: usize) -> Self {
        self.config.progress_every = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, ImagefillError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(ImagefillError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.timeout_secs == 0 {
            return Err(ImagefillError::InvalidConfig(
                "Converter timeout must be ≥ 1 second".into(),
            ));
        }
        if c.converter.trim().is_empty() {
            return Err(ImagefillError::InvalidConfig(
                "Converter program must not be empty".into(),
            ));
        }
        if let Some(theme) = &c.theme {
            if theme.contains('/') || theme.contains('\\') {
                return Err(ImagefillError::InvalidConfig(format!(
                    "Theme must be a directory name, got '{theme}'"
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RunConfig::default();
        assert_eq!(c.workers, 4);
        assert_eq!(c.timeout_secs, 60);
        assert_eq!(c.converter, "soffice");
        assert!(!c.force);
        assert!(!c.dry_run);
        assert_eq!(
            c.resolved_report_path(),
            PathBuf::from("./scripts/image_report.json")
        );
    }

    #[test]
    fn workers_are_clamped() {
        let c = RunConfig::builder().workers(0).build().unwrap();
        assert_eq!(c.workers, 1);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = RunConfig::builder().timeout_secs(0).build().unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn theme_must_be_a_name() {
        assert!(RunConfig::builder().theme("01-letters").build().is_ok());
        assert!(RunConfig::builder().theme("../etc").build().is_err());
    }

    #[test]
    fn profile_dirs_are_per_slot() {
        let c = RunConfig::builder().profile_root("/tmp/x").build().unwrap();
        assert_eq!(c.profile_dir(2), PathBuf::from("/tmp/x/lo_profile_2"));
    }

    #[test]
    fn explicit_report_path_wins() {
        let c = RunConfig::builder()
            .archive_root("/srv/archive")
            .report_path("/tmp/report.json")
            .build()
            .unwrap();
        assert_eq!(c.resolved_report_path(), PathBuf::from("/tmp/report.json"));
    }
}
