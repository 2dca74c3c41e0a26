//! Sequential renaming of harvested images.
//!
//! The converter names images after the source document plus an opaque
//! counter (`letter_html_3f9c1a.png`). Those names are unstable and ugly in
//! the published tree, so each page's images are renamed to a dense scheme:
//!
//! - `picture1.jpg` → `img001.jpg`
//! - `picture2.png` → `img002.png`
//! - `drawing`      → `img003.png` (no extension: `.png` assumed)
//!
//! Numbering follows the lexicographic order of the original names, never
//! the order the filesystem listed them in.

use std::collections::BTreeMap;
use std::path::Path;

/// Build the `original → renamed` map for a set of image filenames.
///
/// Duplicate input names collapse to one entry.
pub fn rename_map<S: AsRef<str>>(originals: &[S]) -> BTreeMap<String, String> {
    let mut sorted: Vec<&str> = originals.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), sequential_name(i + 1, name)))
        .collect()
}

/// `imgNNN` plus the original extension (default `.png`).
fn sequential_name(position: usize, original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("png");
    format!("img{position:03}.{ext}")
}
