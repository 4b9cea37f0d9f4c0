//! Slug normalization.
//!
//! Slugs are derived explicitly by callers before a record is written;
//! models never rewrite them behind the caller's back.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum length of a slug derived from an uploaded file name.
pub const MAX_FILENAME_SLUG_LEN: usize = 50;

static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[^a-z0-9_-]+").expect("slug character class is a valid regex")
});

static DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"-{2,}").expect("dash run pattern is a valid regex")
});

/// Convert human-readable text into a URL-safe slug.
///
/// Lowercases, replaces every run of characters outside `[a-z0-9_-]` with a
/// single dash, collapses dash runs and trims leading/trailing dashes.
pub fn slugify(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let dashed = NON_SLUG_CHARS.replace_all(&lower, "-");
    let collapsed = DASH_RUNS.replace_all(&dashed, "-");
    collapsed.trim_matches('-').to_string()
}

/// Slugify the base name of an uploaded file, limited to
/// [`MAX_FILENAME_SLUG_LEN`] characters.
///
/// Long slugs are cut at the last dash before the limit so words stay
/// whole; without such a dash the slug is cut hard at the limit.
pub fn slugify_filename(base_name: &str) -> String {
    let slug = slugify(base_name);
    if slug.len() <= MAX_FILENAME_SLUG_LEN {
        return slug;
    }

    // Slug output is pure ASCII, so byte slicing is char-safe.
    let head = &slug[..MAX_FILENAME_SLUG_LEN];
    match head.rfind('-') {
        Some(idx) if idx > 0 => head[..idx].to_string(),
        _ => head.to_string(),
    }
}

/// Use the explicit slug when given, otherwise derive one from `fallback`.
pub fn slug_or_derive(explicit: Option<&str>, fallback: &str) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slugify(slug),
        None => slugify(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust & Go!  "), "rust-go");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
    }

    #[test]
    fn slugify_collapses_and_trims_dashes() {
        assert_eq!(slugify("--a -- b--"), "a-b");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn filename_slug_cuts_at_last_dash() {
        let name = "a-very-long-file-name-that-keeps-going-and-going-past-fifty";
        let slug = slugify_filename(name);
        assert!(slug.len() <= MAX_FILENAME_SLUG_LEN);
        assert_eq!(slug, "a-very-long-file-name-that-keeps-going-and-going");
    }

    #[test]
    fn filename_slug_hard_cut_without_dash() {
        let name = "x".repeat(80);
        assert_eq!(slugify_filename(&name).len(), MAX_FILENAME_SLUG_LEN);
    }

    #[test]
    fn explicit_slug_wins() {
        assert_eq!(slug_or_derive(Some("Custom Slug"), "Title"), "custom-slug");
        assert_eq!(slug_or_derive(Some("   "), "My Title"), "my-title");
        assert_eq!(slug_or_derive(None, "My Title"), "my-title");
    }
}
