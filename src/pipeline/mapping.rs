//! Discovery of source documents and the reader pages that embed them.
//!
//! Stage 1 of a run. Walks `NN-theme/read/*.html`, follows each page's
//! download link back to `NN-theme/files/NAME`, and produces a sorted map
//! from `(theme, filename)` to the page. Pages whose link points at a file
//! that no longer exists are left out silently.

use crate::error::ImagefillError;
use crate::layout;
use crate::output::{ConversionJob, ReaderPage, SourceDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `(theme, source filename) → reader page`, ordered by key.
pub type SourceMap = BTreeMap<(String, String), ReaderPage>;

static RE_FILE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\s+class="file-link-btn"\s+href="\.\./files/([^"]+)""#).unwrap()
});

/// Scan the archive for page ↔ source pairs.
///
/// `theme` restricts the scan to one theme directory. Fails only when the
/// archive root or a theme's reader area cannot be listed.
pub fn build_mapping(root: &Path, theme: Option<&str>) -> Result<SourceMap, ImagefillError> {
    let mut mapping = SourceMap::new();

    for theme_dir in theme_dirs(root, theme)? {
        let theme_name = dir_name(&theme_dir);
        let read_dir = theme_dir.join(layout::READ_DIR);
        if !read_dir.is_dir() {
            continue;
        }

        for page_path in html_files(&read_dir)? {
            let content = match fs::read(&page_path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!("Skipping unreadable page {}: {}", page_path.display(), e);
                    continue;
                }
            };
            let Some(source_filename) = linked_source(&content) else {
                continue;
            };
            let source_path = theme_dir.join(layout::FILES_DIR).join(&source_filename);
            if !source_path.exists() {
                debug!(
                    "{}: linked source {} is gone",
                    page_path.display(),
                    source_filename
                );
                continue;
            }
            let page = ReaderPage {
                theme: theme_name.clone(),
                slug: layout::slug_for(&page_path),
                path: page_path,
            };
            mapping.insert((theme_name.clone(), source_filename), page);
        }
    }

    Ok(mapping)
}

/// Percent-decoded filename of the page's download link, if any.
pub fn linked_source(page: &str) -> Option<String> {
    let raw = RE_FILE_LINK.captures(page)?.get(1)?.as_str();
    Some(
        urlencoding::decode(raw)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

/// Drop pages that already carry the marker unless `force` is set.
///
/// Returns the remaining mapping and the number of pages dropped.
pub fn drop_processed(mapping: SourceMap, force: bool) -> (SourceMap, usize) {
    if force {
        return (mapping, 0);
    }
    let mut skipped = 0;
    let kept = mapping
        .into_iter()
        .filter(|(_, page)| {
            let patched = fs::read(&page.path)
                .map(|b| String::from_utf8_lossy(&b).contains(layout::MARKER))
                .unwrap_or(false);
            if patched {
                skipped += 1;
            }
            !patched
        })
        .collect();
    (kept, skipped)
}

/// Turn the mapping into numbered jobs, keeping convertible sources only.
pub fn work_list(root: &Path, mapping: SourceMap) -> Vec<ConversionJob> {
    mapping
        .into_iter()
        .filter_map(|((theme, filename), page)| {
            let path = root.join(&theme).join(layout::FILES_DIR).join(&filename);
            layout::is_convertible(&path).then(|| (SourceDocument { theme, filename, path }, page))
        })
        .enumerate()
        .map(|(i, (source, page))| ConversionJob {
            index: i + 1,
            source,
            page,
        })
        .collect()
}

fn theme_dirs(root: &Path, only: Option<&str>) -> Result<Vec<PathBuf>, ImagefillError> {
    let unreadable = |source| ImagefillError::ArchiveUnreadable {
        path: root.to_path_buf(),
        source,
    };
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        let name = dir_name(&path);
        if !path.is_dir() || !layout::is_theme_dir_name(&name) {
            continue;
        }
        if only.is_some_and(|t| t != name) {
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    Ok(dirs)
}

fn html_files(dir: &Path) -> Result<Vec<PathBuf>, ImagefillError> {
    let unreadable = |source| ImagefillError::ArchiveUnreadable {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && layout::extension_lower(&path).as_deref() == Some("html") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page_linking(file: &str) -> String {
        format!(
            "<html><body><div class=\"reader-content\">\n<p>text</p>\n</div>\n\
             <a class=\"file-link-btn\" href=\"../files/{file}\">Download</a></body></html>"
        )
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn archive() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "01-letters/files/letter.docx", "doc");
        write(root, "01-letters/files/My Note.rtf", "rtf");
        write(root, "01-letters/files/scan.pdf", "pdf");
        write(root, "01-letters/read/letter.html", &page_linking("letter.docx"));
        write(root, "01-letters/read/my-note.html", &page_linking("My%20Note.rtf"));
        write(root, "01-letters/read/scan.html", &page_linking("scan.pdf"));
        write(root, "01-letters/read/gone.html", &page_linking("removed.doc"));
        write(root, "01-letters/read/nolink.html", "<p>no link</p>");
        write(root, "02-diaries/files/day.odt", "odt");
        write(
            root,
            "02-diaries/read/day.html",
            &page_linking("day.odt").replace("\n<p>text</p>", "\n<!-- lo-images -->\n<p>x</p>"),
        );
        write(root, "scripts/files/tool.doc", "not a theme");
        write(root, "scripts/read/tool.html", &page_linking("tool.doc"));
        tmp
    }

    fn keys(m: &SourceMap) -> Vec<(&str, &str)> {
        m.keys().map(|(t, f)| (t.as_str(), f.as_str())).collect()
    }

    #[test]
    fn maps_existing_sources_in_theme_dirs() {
        let tmp = archive();
        let m = build_mapping(tmp.path(), None).unwrap();
        assert_eq!(
            keys(&m),
            vec![
                ("01-letters", "My Note.rtf"),
                ("01-letters", "letter.docx"),
                ("01-letters", "scan.pdf"),
                ("02-diaries", "day.odt"),
            ]
        );
        let page = &m[&("01-letters".to_string(), "My Note.rtf".to_string())];
        assert_eq!(page.slug, "my-note");
    }

    #[test]
    fn theme_filter() {
        let tmp = archive();
        let m = build_mapping(tmp.path(), Some("02-diaries")).unwrap();
        assert_eq!(keys(&m), vec![("02-diaries", "day.odt")]);
    }

    #[test]
    fn marked_pages_dropped_unless_forced() {
        let tmp = archive();
        let m = build_mapping(tmp.path(), None).unwrap();

        let (kept, skipped) = drop_processed(m.clone(), false);
        assert_eq!(skipped, 1);
        assert!(!kept.contains_key(&("02-diaries".to_string(), "day.odt".to_string())));

        let (kept, skipped) = drop_processed(m, true);
        assert_eq!(skipped, 0);
        assert!(kept.contains_key(&("02-diaries".to_string(), "day.odt".to_string())));
    }

    #[test]
    fn pdf_never_becomes_a_job() {
        let tmp = archive();
        let m = build_mapping(tmp.path(), None).unwrap();
        let jobs = work_list(tmp.path(), m);
        assert!(jobs.iter().all(|j| j.source.filename != "scan.pdf"));
        assert_eq!(jobs.len(), 3);
        assert_eq!(
            jobs.iter().map(|j| j.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(jobs[0].source.path.ends_with("01-letters/files/My Note.rtf"));
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = build_mapping(Path::new("/definitely/not/an/archive"), None).unwrap_err();
        assert!(matches!(err, ImagefillError::ArchiveUnreadable { .. }));
    }

    #[test]
    fn linked_source_decodes() {
        assert_eq!(
            linked_source(r#"<A class="file-link-btn" href="../files/a%20b.doc">"#).as_deref(),
            Some("a b.doc")
        );
        assert_eq!(linked_source("<a href=\"../files/x.doc\">"), None);
    }
}
