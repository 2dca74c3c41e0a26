//! Archive layout conventions.
//!
//! The archive is a plain directory tree. Every theme lives in a numbered
//! top-level directory and owns two areas:
//!
//! ```text
//! archive/
//! ├── 01-letters/                 # Theme (NN-name = scanned)
//! │   ├── files/                  # Source documents
//! │   │   ├── letter.docx
//! │   │   └── scan.pdf
//! │   └── read/                   # Reader pages, one per document
//! │       ├── letter.html
//! │       └── img/
//! │           └── letter/         # Per-slug image directory
//! │               ├── img001.jpg
//! │               └── img002.png
//! ├── 02-family-chronicle/
//! └── scripts/                    # Not a theme (no NN- prefix)
//! ```
//!
//! Reader pages link back to their source with a fixed anchor
//! (`<a class="file-link-btn" href="../files/NAME">`) and carry a
//! `<div class="reader-content">` container that receives the converted
//! fragment.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Source-document area inside a theme.
pub const FILES_DIR: &str = "files";

/// Reader-page area inside a theme.
pub const READ_DIR: &str = "read";

/// Image area inside the reader area; one sub-directory per slug.
pub const IMG_DIR: &str = "img";

/// Comment written immediately inside the container once a page is patched.
pub const MARKER: &str = "<!-- lo-images -->";

/// Opening tag of the embeddable content container.
pub const CONTAINER_OPEN: &str = r#"<div class="reader-content">"#;

/// Closing tag searched for when locating the end of the container.
pub const CONTAINER_CLOSE: &str = "</div>";

/// Start of the download-link anchor that follows the container.
pub const FILE_LINK_ANCHOR: &str = r#"<a class="file-link-btn""#;

/// Extensions (lower-case, no dot) the converter is asked to handle.
pub const CONVERTIBLE_EXTENSIONS: &[&str] = &["doc", "docx", "rtf", "odt"];

/// Extensions (lower-case, no dot) harvested from the converter's output.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif", "svg", "wmf", "emf",
];

static RE_THEME_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{2}-").unwrap());

/// Does this directory name follow the `NN-name` theme convention?
pub fn is_theme_dir_name(name: &str) -> bool {
    RE_THEME_DIR.is_match(name)
}

/// Lower-cased extension of `path`, without the dot.
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_convertible(path: &Path) -> bool {
    extension_lower(path).is_some_and(|e| CONVERTIBLE_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_image(path: &Path) -> bool {
    extension_lower(path).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_html(path: &Path) -> bool {
    matches!(extension_lower(path).as_deref(), Some("html") | Some("htm"))
}

/// Slug of a reader page: its file stem.
pub fn slug_for(reader_path: &Path) -> String {
    reader_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<theme>/read/img/<slug>` for a reader page at `<theme>/read/<slug>.html`.
pub fn image_dir_for(reader_path: &Path, slug: &str) -> PathBuf {
    let read_dir = reader_path.parent().unwrap_or_else(|| Path::new("."));
    read_dir.join(IMG_DIR).join(slug)
}

/// Relative reference used inside the embedded fragment.
pub fn image_href(slug: &str, renamed: &str) -> String {
    format!("{IMG_DIR}/{slug}/{renamed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_dir_names() {
        assert!(is_theme_dir_name("01-letters"));
        assert!(is_theme_dir_name("02-family-chronicle"));
        assert!(!is_theme_dir_name("scripts"));
        assert!(!is_theme_dir_name("1-short"));
        assert!(!is_theme_dir_name("ab-letters"));
    }

    #[test]
    fn convertible_set_excludes_pdf() {
        assert!(is_convertible(Path::new("letter.docx")));
        assert!(is_convertible(Path::new("OLD.DOC")));
        assert!(is_convertible(Path::new("notes.rtf")));
        assert!(!is_convertible(Path::new("scan.pdf")));
        assert!(!is_convertible(Path::new("README")));
    }

    #[test]
    fn image_and_html_detection() {
        assert!(is_image(Path::new("a_html_1.PNG")));
        assert!(is_image(Path::new("figure.emf")));
        assert!(!is_image(Path::new("letter.html")));
        assert!(is_html(Path::new("letter.htm")));
        assert!(is_html(Path::new("letter.HTML")));
    }

    #[test]
    fn image_dir_sits_under_read_area() {
        let page = Path::new("/a/01-letters/read/letter.html");
        let slug = slug_for(page);
        assert_eq!(slug, "letter");
        assert_eq!(
            image_dir_for(page, &slug),
            PathBuf::from("/a/01-letters/read/img/letter")
        );
        assert_eq!(image_href(&slug, "img001.png"), "img/letter/img001.png");
    }
}
