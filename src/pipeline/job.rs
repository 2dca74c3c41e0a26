//! Conversion of one source document.
//!
//! ## Lifecycle of the working directory
//!
//! Every job gets a fresh [`tempfile::TempDir`] the converter writes into. Its fate
//! depends on the outcome:
//!
//! | Outcome | Working directory |
//! |---------|-------------------|
//! | error (any kind) | deleted when the job returns |
//! | skipped (no images) | deleted when the job returns |
//! | success | moved into [`ConvertedDocument`]; the patcher deletes it after copying the images |
//!
//! ## Timeout
//!
//! The converter runs under `tokio::time::timeout` with `kill_on_drop`, so
//! dropping the timed-out `output()` future kills the process.

use crate::config::RunConfig;
use crate::error::JobError;
use crate::layout;
use crate::output::{ConversionJob, ConversionOutcome, ConversionResult, ConvertedDocument, ImageAsset};
use crate::pipeline::markup;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Characters of converter stderr kept in a `converter-error`.
pub const STDERR_PREFIX_CHARS: usize = 200;

/// Convert `job.source` using the profile directory `profile_dir`.
///
/// Never fails: every problem is folded into the returned
/// [`ConversionResult`] so one bad document cannot stop the batch.
pub async fn run_job(job: ConversionJob, profile_dir: &Path, config: &RunConfig) -> ConversionResult {
    let start = Instant::now();
    let outcome = match convert(&job, profile_dir, config).await {
        Ok(Some(doc)) => ConversionOutcome::Success(doc),
        Ok(None) => ConversionOutcome::Skipped,
        Err(e) => ConversionOutcome::Error(e),
    };
    debug!(
        "Job {} ({}/{}): {} in {:?}",
        job.index,
        job.source.theme,
        job.source.filename,
        match &outcome {
            ConversionOutcome::Success(d) => format!("{} images", d.images.len()),
            ConversionOutcome::Skipped => "no images".to_string(),
            ConversionOutcome::Error(e) => e.kind().to_string(),
        },
        start.elapsed()
    );
    ConversionResult { job, outcome }
}

/// `Ok(None)` means the document converted but carried no images.
async fn convert(
    job: &ConversionJob,
    profile_dir: &Path,
    config: &RunConfig,
) -> Result<Option<ConvertedDocument>, JobError> {
    if !job.source.path.is_file() {
        return Err(JobError::Internal(format!(
            "source file missing: {}",
            job.source.path.display()
        )));
    }

    tokio::fs::create_dir_all(profile_dir)
        .await
        .map_err(|e| JobError::Internal(format!("profile dir {}: {e}", profile_dir.display())))?;

    tokio::fs::create_dir_all(&config.work_root)
        .await
        .map_err(|e| JobError::Internal(format!("work dir {}: {e}", config.work_root.display())))?;
    let workdir = tempfile::Builder::new()
        .prefix("lo_conv_")
        .tempdir_in(&config.work_root)
        .map_err(|e| JobError::Internal(format!("tempdir: {e}")))?;

    invoke_converter(config, profile_dir, workdir.path(), &job.source.path).await?;

    let (html_path, image_paths) = scan_output(workdir.path()).await?;
    let Some(html_path) = html_path else {
        return Err(JobError::NoOutput);
    };
    if image_paths.is_empty() {
        return Ok(None);
    }

    let bytes = tokio::fs::read(&html_path)
        .await
        .map_err(|e| JobError::Internal(format!("read {}: {e}", html_path.display())))?;
    let document = String::from_utf8_lossy(&bytes);
    let body = markup::extract_body(&document);

    let names: Vec<String> = image_paths.iter().map(|p| file_name(p)).collect();
    let cleaned = markup::clean_fragment(body, &names, &job.page.slug);

    let images = image_paths
        .into_iter()
        .zip(names)
        .map(|(source_path, original)| ImageAsset {
            renamed: cleaned
                .renames
                .get(&original)
                .cloned()
                .unwrap_or_else(|| original.clone()),
            original,
            source_path,
        })
        .collect();

    Ok(Some(ConvertedDocument {
        fragment: cleaned.html,
        images,
        workdir,
    }))
}

/// Full argument list for one converter invocation.
pub fn converter_args(config: &RunConfig, profile_dir: &Path, outdir: &Path, source: &Path) -> Vec<String> {
    let mut args = config.converter_args.clone();
    args.extend([
        "--headless".to_string(),
        "--norestore".to_string(),
        format!("-env:UserInstallation={}", file_url(profile_dir)),
        "--convert-to".to_string(),
        "html".to_string(),
        "--outdir".to_string(),
        outdir.display().to_string(),
        source.display().to_string(),
    ]);
    args
}

async fn invoke_converter(
    config: &RunConfig,
    profile_dir: &Path,
    outdir: &Path,
    source: &Path,
) -> Result<(), JobError> {
    let mut cmd = Command::new(&config.converter);
    cmd.args(converter_args(config, profile_dir, outdir, source))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let limit = Duration::from_secs(config.timeout_secs);
    let output = match tokio::time::timeout(limit, cmd.output()).await {
        Err(_elapsed) => {
            return Err(JobError::Timeout {
                secs: config.timeout_secs,
            })
        }
        Ok(Err(e)) => {
            return Err(JobError::Internal(format!(
                "failed to start '{}': {e}",
                config.converter
            )))
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(JobError::ConverterFailed {
            code: output.status.code(),
            stderr: stderr.chars().take(STDERR_PREFIX_CHARS).collect(),
        });
    }
    Ok(())
}

/// The converter's HTML file (first by name) and its image companions,
/// both sorted by path.
async fn scan_output(dir: &Path) -> Result<(Option<PathBuf>, Vec<PathBuf>), JobError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| JobError::Internal(format!("read_dir {}: {e}", dir.display())))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| JobError::Internal(format!("read_dir {}: {e}", dir.display())))?
    {
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let html = files.iter().find(|p| layout::is_html(p)).cloned();
    let images = files
        .into_iter()
        .filter(|p| Some(p) != html.as_ref() && layout::is_image(p))
        .collect();
    Ok((html, images))
}

/// `file://` URL for an absolute path, each segment percent-encoded.
fn file_url(path: &Path) -> String {
    let encoded: Vec<String> = path
        .to_string_lossy()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("file://{}", encoded.join("/"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ReaderPage, SourceDocument};
    use tempfile::TempDir;

    fn job_for(source: PathBuf) -> ConversionJob {
        ConversionJob {
            index: 1,
            source: SourceDocument {
                theme: "01-letters".into(),
                filename: "letter.docx".into(),
                path: source,
            },
            page: ReaderPage {
                theme: "01-letters".into(),
                slug: "letter".into(),
                path: PathBuf::from("/archive/01-letters/read/letter.html"),
            },
        }
    }

    #[test]
    fn converter_args_layout() {
        let config = RunConfig::builder()
            .converter_args(["run", "org.libreoffice.LibreOffice"])
            .build()
            .unwrap();
        let args = converter_args(
            &config,
            Path::new("/tmp/lo_profile_0"),
            Path::new("/tmp/lo_conv_x"),
            Path::new("/a/files/letter.docx"),
        );
        assert_eq!(
            args,
            vec![
                "run",
                "org.libreoffice.LibreOffice",
                "--headless",
                "--norestore",
                "-env:UserInstallation=file:///tmp/lo_profile_0",
                "--convert-to",
                "html",
                "--outdir",
                "/tmp/lo_conv_x",
                "/a/files/letter.docx",
            ]
        );
    }

    #[tokio::test]
    async fn scan_output_separates_html_and_images() {
        let dir = TempDir::new().unwrap();
        for name in ["letter.html", "letter_html_b.png", "letter_html_a.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let (html, images) = scan_output(dir.path()).await.unwrap();
        assert_eq!(html.unwrap(), dir.path().join("letter.html"));
        let names: Vec<String> = images.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["letter_html_a.jpg", "letter_html_b.png"]);
    }

    #[tokio::test]
    async fn missing_source_is_internal_error() {
        let profiles = TempDir::new().unwrap();
        let config = RunConfig::default();
        let result = run_job(
            job_for(PathBuf::from("/definitely/not/here.docx")),
            profiles.path(),
            &config,
        )
        .await;
        assert_eq!(result.error().map(|e| e.kind()), Some("internal-error"));
    }

    #[tokio::test]
    async fn unknown_converter_is_internal_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("letter.docx");
        std::fs::write(&source, b"PK").unwrap();
        let config = RunConfig::builder()
            .converter("imagefill-no-such-converter")
            .build()
            .unwrap();
        let result = run_job(job_for(source), &dir.path().join("profile"), &config).await;
        let err = result.error().expect("spawn failure must be reported");
        assert_eq!(err.kind(), "internal-error");
        assert!(err.to_string().contains("imagefill-no-such-converter"));
    }

    #[test]
    fn profile_url_is_percent_encoded() {
        let config = RunConfig::default();
        let args = converter_args(
            &config,
            Path::new("/tmp/lo profiles/100%/lo_profile_0"),
            Path::new("/tmp/out"),
            Path::new("/a/letter.docx"),
        );
        assert_eq!(
            args[2],
            "-env:UserInstallation=file:///tmp/lo%20profiles/100%25/lo_profile_0"
        );
    }

    /// Config running `sh -c <script>` as the converter, with job temp
    /// directories created under `work_root`.
    fn shell_config(script: &str, work_root: &Path) -> RunConfig {
        RunConfig::builder()
            .converter("sh")
            .converter_args(["-c", script, "fake-soffice"])
            .work_root(work_root)
            .build()
            .unwrap()
    }

    fn conv_dirs(work_root: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(work_root)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| file_name(p).starts_with("lo_conv_"))
            .collect()
    }

    // The converter sees `--headless … --outdir DIR SOURCE`; "$7" is DIR.
    const WRITE_HTML_ONLY: &str = r#"printf '<html><body><p>x</p></body></html>' > "$7/letter.html""#;
    const WRITE_IMAGE_ONLY: &str = r#"printf 'PNG' > "$7/pic.png""#;
    const FAIL: &str = "echo broken >&2; exit 2";

    async fn run_with(script: &str) -> (ConversionResult, TempDir) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("letter.docx");
        std::fs::write(&source, b"PK").unwrap();
        let work_root = dir.path().join("work");
        let config = shell_config(script, &work_root);
        let result = run_job(job_for(source), &dir.path().join("profile"), &config).await;
        (result, dir)
    }

    #[tokio::test]
    async fn skipped_job_removes_its_temp_dir() {
        let (result, dir) = run_with(WRITE_HTML_ONLY).await;
        assert!(result.is_skipped(), "{:?}", result.outcome);
        assert!(conv_dirs(&dir.path().join("work")).is_empty());
    }

    #[tokio::test]
    async fn converter_error_removes_its_temp_dir() {
        let (result, dir) = run_with(FAIL).await;
        let err = result.error().expect("non-zero exit must fail the job");
        assert_eq!(err.kind(), "converter-error");
        assert!(err.to_string().contains("exit code 2"));
        assert!(err.to_string().contains("broken"));
        assert!(conv_dirs(&dir.path().join("work")).is_empty());
    }

    #[tokio::test]
    async fn images_without_html_is_no_output() {
        let (result, dir) = run_with(WRITE_IMAGE_ONLY).await;
        assert_eq!(result.error(), Some(&JobError::NoOutput));
        assert!(conv_dirs(&dir.path().join("work")).is_empty());
    }

    #[tokio::test]
    async fn success_keeps_its_temp_dir_until_patched() {
        let script = format!("{WRITE_HTML_ONLY}; {WRITE_IMAGE_ONLY}");
        let (result, dir) = run_with(&script).await;
        let doc = match result.outcome {
            ConversionOutcome::Success(doc) => doc,
            other => panic!("expected success, got {other:?}"),
        };
        let work = dir.path().join("work");
        assert_eq!(conv_dirs(&work), vec![doc.workdir.path().to_path_buf()]);
        assert_eq!(doc.images[0].renamed, "img001.png");
        drop(doc);
        assert!(conv_dirs(&work).is_empty());
    }
}
