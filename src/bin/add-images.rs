//! CLI binary for archive-imagefill.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RunConfig` and prints the run report.

use anyhow::{Context, Result};
use archive_imagefill::{
    run, ConversionCounters, ConversionOutcome, ConversionResult, PatchSizes, ProgressCallback,
    ReaderPage, RunConfig, RunProgressCallback, RunSummary,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar for the conversion phase, one log
/// line per document that yields images or fails, and one per patched page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Cadence of progress lines for image-less completions.
    every: usize,
}

impl CliProgressCallback {
    fn new(every: usize) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Mapping reader pages…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar, every })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>5}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_jobs: usize, workers: usize) {
        self.activate_bar(total_jobs);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_jobs} files with {workers} workers…"))
        ));
    }

    fn on_job_complete(&self, counters: &ConversionCounters, result: &ConversionResult) {
        let src = &result.job.source;
        match &result.outcome {
            ConversionOutcome::Success(doc) => self.bar.println(format!(
                "  {} {:>5}/{:<5}  {}/{}  {}",
                green("✓"),
                counters.completed,
                counters.total,
                src.theme,
                src.filename,
                dim(&format!("{} images", doc.images.len())),
            )),
            ConversionOutcome::Error(e) => {
                let msg = e.to_string();
                let msg = match msg.char_indices().nth(79) {
                    Some((cut, _)) => format!("{}\u{2026}", &msg[..cut]),
                    None => msg,
                };
                self.bar.println(format!(
                    "  {} {:>5}/{:<5}  {}/{}  {}",
                    red("✗"),
                    counters.completed,
                    counters.total,
                    src.theme,
                    src.filename,
                    red(&msg),
                ));
            }
            ConversionOutcome::Skipped if counters.is_progress_tick(self.every) => {
                self.bar.println(format!(
                    "  {} {:>5}/{:<5}  {}",
                    dim("·"),
                    counters.completed,
                    counters.total,
                    dim(&format!(
                        "progress ({} with images, {} without)",
                        counters.with_images, counters.skipped
                    )),
                ))
            }
            ConversionOutcome::Skipped => {}
        }
        self.bar.set_message(format!(
            "{} with images, {} without, {} errors",
            counters.with_images, counters.skipped, counters.errors
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, counters: &ConversionCounters) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} files converted  ({} with images, {} without, {})",
            if counters.errors == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&counters.completed.to_string()),
            counters.with_images,
            counters.skipped,
            if counters.errors == 0 {
                "0 errors".to_string()
            } else {
                red(&format!("{} errors", counters.errors))
            },
        );
    }

    fn on_page_patched(&self, page: &ReaderPage, sizes: Option<PatchSizes>) {
        match sizes {
            Some(s) => eprintln!(
                "  {} {}/{}  {}",
                green("✓"),
                page.theme,
                page.slug,
                dim(&format!("{:+} bytes", s.delta())),
            ),
            None => eprintln!("  {} {}/{}", red("✗"), page.theme, page.slug),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process the whole archive in the current directory
  add-images

  # One theme, eight converters at once
  add-images --root /srv/archive --theme 02-family-chronicle -w 8

  # Estimate size changes without writing anything
  add-images --dry-run

  # Redo pages that were already processed
  add-images --force

  # LibreOffice from flatpak
  add-images --converter flatpak --converter-arg run --converter-arg org.libreoffice.LibreOffice

ARCHIVE LAYOUT:
  <root>/NN-theme/files/<document>.{doc,docx,rtf,odt}
  <root>/NN-theme/read/<slug>.html        reader page, links ../files/<document>
  <root>/NN-theme/read/img/<slug>/        harvested images (created)
  <root>/scripts/image_report.json        run report (created)

ENVIRONMENT VARIABLES:
  IMAGEFILL_ROOT, IMAGEFILL_WORKERS, IMAGEFILL_THEME, IMAGEFILL_FORCE,
  IMAGEFILL_DRY_RUN, IMAGEFILL_CONVERTER, IMAGEFILL_CONVERTER_ARGS (comma-separated),
  IMAGEFILL_TIMEOUT, IMAGEFILL_PROFILE_DIR, IMAGEFILL_WORK_DIR, IMAGEFILL_REPORT, IMAGEFILL_JSON,
  IMAGEFILL_NO_PROGRESS, IMAGEFILL_VERBOSE, IMAGEFILL_QUIET
  RUST_LOG                overrides the log filter
"#;

/// Restore embedded images to archive reader pages.
#[derive(Parser, Debug)]
#[command(
    name = "add-images",
    version,
    about = "Restore embedded images to archive reader pages",
    long_about = "Re-convert the archive's original office documents with headless LibreOffice, \
harvest the images they contain, and splice cleaned HTML into the matching reader pages. \
Pages already processed are skipped unless --force is given.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Archive root holding the NN-theme directories.
    #[arg(long, env = "IMAGEFILL_ROOT", default_value = ".")]
    root: PathBuf,

    /// Number of converter processes run at once.
    #[arg(short, long, env = "IMAGEFILL_WORKERS", default_value_t = 4,
          value_parser = clap::value_parser!(u64).range(1..))]
    workers: u64,

    /// Process only this theme directory (e.g. 02-family-chronicle).
    #[arg(long, env = "IMAGEFILL_THEME")]
    theme: Option<String>,

    /// Re-process pages that already carry the marker.
    #[arg(long, env = "IMAGEFILL_FORCE")]
    force: bool,

    /// Report what would change without writing anything.
    #[arg(long, env = "IMAGEFILL_DRY_RUN")]
    dry_run: bool,

    /// Converter program.
    #[arg(long, env = "IMAGEFILL_CONVERTER", default_value = "soffice")]
    converter: String,

    /// Extra argument placed before the converter flags (repeatable).
    #[arg(long = "converter-arg", env = "IMAGEFILL_CONVERTER_ARGS", value_name = "ARG",
          value_delimiter = ',', allow_hyphen_values = true)]
    converter_args: Vec<String>,

    /// Per-document converter timeout in seconds.
    #[arg(long, env = "IMAGEFILL_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Parent directory for per-worker converter profiles.
    #[arg(long, env = "IMAGEFILL_PROFILE_DIR")]
    profile_dir: Option<PathBuf>,

    /// Parent directory for each document's temporary converter output.
    #[arg(long, env = "IMAGEFILL_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Report path (default: <root>/scripts/image_report.json).
    #[arg(long, env = "IMAGEFILL_REPORT")]
    report: Option<PathBuf>,

    /// Print the report as JSON on stdout instead of a table.
    #[arg(long, env = "IMAGEFILL_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMAGEFILL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMAGEFILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMAGEFILL_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let every = RunConfig::default().progress_every;
        Some(CliProgressCallback::new(every) as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = run(&config).await.context("Run failed")?;

    // ── Output ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&summary.report)
            .context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Map CLI args to `RunConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RunConfig> {
    let mut builder = RunConfig::builder()
        .archive_root(&cli.root)
        .workers(cli.workers as usize)
        .force(cli.force)
        .dry_run(cli.dry_run)
        .converter(cli.converter.clone())
        .converter_args(cli.converter_args.iter())
        .timeout_secs(cli.timeout);

    if let Some(ref theme) = cli.theme {
        builder = builder.theme(theme.clone());
    }
    if let Some(ref dir) = cli.profile_dir {
        builder = builder.profile_root(dir);
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_root(dir);
    }
    if let Some(ref path) = cli.report {
        builder = builder.report_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &RunSummary) {
    let Some(ref report) = summary.report else {
        eprintln!(
            "{} Nothing to update  {}",
            green("✔"),
            dim(&format!(
                "({} pairs, {} already processed, {} converted)",
                summary.discovered, summary.skipped_existing, summary.queued
            )),
        );
        return;
    };

    println!();
    print!("{}", report.render_table());
    println!();
    println!(
        "Errors: {}  |  Skipped (no images): {}  |  Skipped (already done): {}",
        report.errors, report.skipped_no_images, report.skipped_existing
    );
    if report.structural_mismatches > 0 {
        println!(
            "{}",
            red(&format!(
                "Pages with unexpected structure (left unchanged): {}",
                report.structural_mismatches
            ))
        );
    }
    if let Some(ref path) = summary.report_path {
        println!("Report: {}", bold(&path.display().to_string()));
    }
}
