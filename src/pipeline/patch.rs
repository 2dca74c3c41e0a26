//! Splicing converted fragments into reader pages.
//!
//! ## Splice region
//!
//! ```text
//! …<div class="reader-content">│ replaced │</div>\n<a class="file-link-btn" …
//!                              ▲          ▲
//!                    content_start     close
//! ```
//!
//! `close` is the last `</div>` before the download link (the container's
//! own closer), or the first `</div>` after the container opens when the
//! page has no download link. Bytes outside `[content_start, close)` are
//! never touched.
//!
//! ## Write order
//!
//! Images are copied first, the page is written second, and the job's
//! temporary directory is deleted last. If a copy fails the temporary
//! directory is kept on disk and the page is left unpatched, so the next
//! run picks it up again.

use crate::error::PatchError;
use crate::layout;
use crate::output::{ConvertedDocument, PatchSizes, ReaderPage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Byte range of the container's current content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceRegion {
    pub content_start: usize,
    pub close: usize,
}

/// Locate the container content inside `page`.
pub fn locate_region(page: &str) -> Result<SpliceRegion, &'static str> {
    let open = page
        .find(layout::CONTAINER_OPEN)
        .ok_or("no reader-content container")?;
    let content_start = open + layout::CONTAINER_OPEN.len();

    let before_link = page[content_start..]
        .find(layout::FILE_LINK_ANCHOR)
        .and_then(|rel| page[content_start..content_start + rel].rfind(layout::CONTAINER_CLOSE));
    let close_rel = before_link
        .or_else(|| page[content_start..].find(layout::CONTAINER_CLOSE))
        .ok_or("no closing </div> after reader-content")?;

    Ok(SpliceRegion {
        content_start,
        close: content_start + close_rel,
    })
}

/// Page text with the container content replaced by marker + fragment.
pub fn splice(page: &str, region: SpliceRegion, fragment: &str) -> String {
    let mut out = String::with_capacity(page.len() + fragment.len() + 32);
    out.push_str(&page[..region.content_start]);
    out.push('\n');
    out.push_str(layout::MARKER);
    out.push('\n');
    out.push_str(fragment);
    out.push('\n');
    out.push_str(&page[region.close..]);
    out
}

/// Patch `page` with `doc`, or only estimate the result when `dry_run`.
///
/// Consumes `doc`: its temporary directory is deleted once the images are
/// safely copied (or, in dry-run, once the estimate is taken).
pub async fn patch_page(
    page: &ReaderPage,
    doc: ConvertedDocument,
    dry_run: bool,
) -> Result<PatchSizes, PatchError> {
    let io_err = |source| PatchError::Io {
        path: page.path.clone(),
        source,
    };

    let bytes = tokio::fs::read(&page.path).await.map_err(io_err)?;
    let before = bytes.len() as u64;
    let content = String::from_utf8(bytes).map_err(|e| {
        io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let region = locate_region(&content).map_err(|detail| PatchError::StructuralMismatch {
        path: page.path.clone(),
        detail: detail.to_string(),
    })?;

    if dry_run {
        let mut image_bytes = 0;
        for image in &doc.images {
            image_bytes += tokio::fs::metadata(&image.source_path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
        }
        return Ok(PatchSizes {
            before,
            after: before + doc.fragment.len() as u64 + image_bytes,
        });
    }

    let patched = splice(&content, region, &doc.fragment);

    let ConvertedDocument { images, workdir, .. } = doc;
    let img_dir = layout::image_dir_for(&page.path, &page.slug);
    let image_bytes = match copy_images(&img_dir, &images).await {
        Ok(n) => n,
        Err((dest, source)) => {
            let kept = workdir.keep();
            warn!(
                "Image copy for {} failed; temporary files kept in {}",
                page.path.display(),
                kept.display()
            );
            return Err(PatchError::AssetCopyFailed { dest, kept, source });
        }
    };

    write_atomic(&page.path, patched.as_bytes())
        .await
        .map_err(io_err)?;
    let page_len = tokio::fs::metadata(&page.path).await.map_err(io_err)?.len();

    if let Err(e) = workdir.close() {
        debug!("Could not remove temporary directory: {}", e);
    }

    Ok(PatchSizes {
        before,
        after: page_len + image_bytes,
    })
}

/// Copy every image into `img_dir`; returns the bytes written.
async fn copy_images(
    img_dir: &Path,
    images: &[crate::output::ImageAsset],
) -> Result<u64, (PathBuf, std::io::Error)> {
    tokio::fs::create_dir_all(img_dir)
        .await
        .map_err(|e| (img_dir.to_path_buf(), e))?;
    let mut total = 0;
    for image in images {
        let dest = img_dir.join(&image.renamed);
        total += tokio::fs::copy(&image.source_path, &dest)
            .await
            .map_err(|e| (dest.clone(), e))?;
    }
    Ok(total)
}

/// Write via a sibling temp file and rename, so readers never see half a page.
///
/// The replacement keeps the original file's permissions. The temp file is
/// removed if anything fails after it was created.
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let permissions = tokio::fs::metadata(path).await?.permissions();
    let tmp_path = path.with_extension("html.tmp");
    tokio::fs::write(&tmp_path, contents).await?;

    let result = match tokio::fs::set_permissions(&tmp_path, permissions).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            debug!("Could not remove {}: {}", tmp_path.display(), e);
        }
    }
    result
}
