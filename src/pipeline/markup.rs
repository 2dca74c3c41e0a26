//! Markup cleaning: turn converter HTML into an embeddable fragment.
//!
//! The converter emits a complete HTML document styled for print: `<font>`
//! wrappers, per-script paragraph classes, hard-coded font sizes,
//! multi-column layout `<div>`s, and `<img>` tags pointing at its own
//! generated filenames. Reader pages have their own stylesheet, so the body
//! is reduced to structure and the image references are rewritten to the
//! page's asset directory.
//!
//! Everything here is plain text substitution. Nothing is parsed into a
//! tree and non-image content is never reordered.
//!
//! ## Rule Order
//!
//! 1. Unwrap `<font>` tags (keep their content)
//! 2. Drop `class="western"`, `class="cjk"`, `class="ctl"`
//! 3. Drop `font-size` declarations from inline styles
//! 4. Drop `style` attributes left empty by rule 3
//! 5. Drop opening `<div>` tags carrying `column-count`
//! 6. Rewrite `<img>` tags whose file is in the rename map
//!
//! Rule 5 only removes the opening tag. The matching `</div>` cannot be
//! paired without a tree and is left in place; browsers tolerate the
//! stray closer inside the container.

use crate::layout;
use crate::pipeline::naming;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// Cleaned fragment plus the `original → renamed` image map used to build it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedFragment {
    pub html: String,
    pub renames: BTreeMap<String, String>,
}

/// Clean a converter body fragment for embedding in the page named `slug`.
///
/// `image_files` are the image filenames found next to the converter's HTML
/// output; they determine the rename map.
pub fn clean_fragment<S: AsRef<str>>(body: &str, image_files: &[S], slug: &str) -> CleanedFragment {
    let renames = naming::rename_map(image_files);

    let s = unwrap_font_tags(body);
    let s = strip_script_classes(&s);
    let s = strip_font_sizes(&s);
    let s = strip_empty_styles(&s);
    let s = strip_column_divs(&s);
    let html = rewrite_images(&s, &renames, slug);

    CleanedFragment { html, renames }
}

static RE_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap());

/// Content between `<body …>` and `</body>`, trimmed; the whole document
/// when no body element is present.
pub fn extract_body(document: &str) -> &str {
    match RE_BODY.captures(document).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => document,
    }
}

// ── Rule 1: Unwrap font tags ─────────────────────────────────────────────────

static RE_FONT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?font(?:\s[^>]*)?/?>").unwrap());

fn unwrap_font_tags(input: &str) -> String {
    RE_FONT_TAG.replace_all(input, "").into_owned()
}

// ── Rule 2: Per-script paragraph classes ─────────────────────────────────────

static RE_SCRIPT_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+class="(?:western|cjk|ctl)""#).unwrap());

fn strip_script_classes(input: &str) -> String {
    RE_SCRIPT_CLASS.replace_all(input, "").into_owned()
}

// ── Rules 3–4: Inline font sizes ─────────────────────────────────────────────

static RE_FONT_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"font-size\s*:\s*[^;"}]+;?\s*"#).unwrap());

static RE_EMPTY_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\s+style="\s*""#).unwrap());

fn strip_font_sizes(input: &str) -> String {
    RE_FONT_SIZE.replace_all(input, "").into_owned()
}

fn strip_empty_styles(input: &str) -> String {
    RE_EMPTY_STYLE.replace_all(input, "").into_owned()
}

// ── Rule 5: Column layout wrappers ───────────────────────────────────────────

static RE_COLUMN_DIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<div[^>]*column-count[^>]*>").unwrap());

fn strip_column_divs(input: &str) -> String {
    RE_COLUMN_DIV.replace_all(input, "").into_owned()
}

// ── Rule 6: Image references ─────────────────────────────────────────────────

static RE_IMG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\s+([^>]*)/?>").unwrap());

static RE_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)(^|\s)src="([^"]*)""#).unwrap());

static RE_PRESENTATIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\s+(?:width|height|border|name)="[^"]*""#).unwrap());

fn rewrite_images(input: &str, renames: &BTreeMap<String, String>, slug: &str) -> String {
    RE_IMG
        .replace_all(input, |caps: &Captures<'_>| {
            let attrs = &caps[1];
            let Some(src) = RE_SRC.captures(attrs).map(|c| c[2].to_string()) else {
                return caps[0].to_string();
            };
            let Some(renamed) = renames.get(&referenced_filename(&src)) else {
                // data: URIs, remote images, files the converter did not emit
                return caps[0].to_string();
            };

            let href = layout::image_href(slug, renamed);
            let stripped = RE_PRESENTATIONAL.replace_all(attrs, "");
            let rewritten = RE_SRC.replacen(&stripped, 1, |c: &Captures<'_>| {
                format!("{}src=\"{}\"", &c[1], href)
            });
            format!("<img {}>", rewritten.trim())
        })
        .into_owned()
}

/// Filename part of an `src` value, percent-decoded.
fn referenced_filename(src: &str) -> String {
    let decoded = urlencoding::decode(src)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| src.to_string());
    decoded
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
