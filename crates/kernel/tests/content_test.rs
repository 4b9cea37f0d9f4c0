#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Content rendering tests: markdown, excerpts, slugs and the theme filters.

use quire_kernel::content::{
    DEFAULT_EXCERPT_CHARS, HighlightCss, derive_excerpt, render_markdown, slugify,
};
use quire_kernel::theme::ThemeEngine;

#[test]
fn post_body_renders_end_to_end() {
    let source = "\
# Getting started

Install it with `cargo install`, then read the [guide](https://example.com/guide).

```rust
fn main() {
    println!(\"hello\");
}
```

## Getting started

- [x] done
- [ ] todo
";
    let html = render_markdown(source);

    assert!(html.contains("<h1 id=\"getting-started\">"));
    assert!(html.contains("<h2 id=\"getting-started-1\">"));
    assert!(html.contains("<code>cargo install</code>"));
    assert!(html.contains("class=\"language-rust\""));
    assert!(html.contains("target=\"_blank\""));
    assert!(html.contains("type=\"checkbox\""));
    assert!(!html.contains("```"));
}

#[test]
fn raw_html_is_sanitized() {
    let html = render_markdown("<img src=x onerror=alert(1)><iframe src=\"https://evil\"></iframe>");
    assert!(!html.contains("onerror"));
    assert!(!html.contains("<iframe"));
}

#[test]
fn excerpt_prefers_the_explicit_one() {
    let content = "word ".repeat(100);

    let explicit = derive_excerpt(Some("A *short* teaser"), &content, DEFAULT_EXCERPT_CHARS);
    assert_eq!(explicit.trim(), "<p>A <em>short</em> teaser</p>");

    let derived = derive_excerpt(Some("   "), &content, DEFAULT_EXCERPT_CHARS);
    assert!(derived.contains("..."));
    assert!(derived.len() < content.len());
}

#[test]
fn excerpt_of_short_content_is_all_of_it() {
    let derived = derive_excerpt(None, "Just a line.", DEFAULT_EXCERPT_CHARS);
    assert_eq!(derived.trim(), "<p>Just a line.</p>");
}

#[test]
fn slugs_are_url_safe() {
    assert_eq!(slugify("Hello, World!"), "hello-world");
    assert_eq!(slugify("  Rust & WebAssembly  "), "rust-webassembly");
    assert_eq!(slugify("!!!"), "");
}

#[test]
fn highlight_stylesheet_is_generated_once() {
    let css = HighlightCss::new("InspiredGitHub");
    let sheet = css.sheet("InspiredGitHub");
    assert!(!sheet.is_generated());

    let first = sheet.css().to_string();
    assert!(sheet.is_generated());
    assert_eq!(first, sheet.css());
    assert!(!css.sheet("Solarized (dark)").is_generated());
}

#[test]
fn dates_render_in_the_site_timezone() {
    let mut engine = ThemeEngine::empty();
    engine
        .add_raw_template("when.html", "{{ at | format_date(tz=tz) }}")
        .unwrap();

    let mut context = tera::Context::new();
    context.insert("at", "2024-12-31T23:30:00Z");
    context.insert("tz", "Europe/Paris");
    assert_eq!(engine.render("when.html", &context).unwrap(), "January 1, 2025");

    context.insert("tz", "UTC");
    assert_eq!(engine.render("when.html", &context).unwrap(), "December 31, 2024");
}
