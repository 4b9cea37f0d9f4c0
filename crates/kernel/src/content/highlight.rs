//! Code block syntax highlighting.
//!
//! Code is tokenized with syntect and emitted as class-annotated spans; the
//! colors live in a stylesheet generated once per style.

use std::collections::HashMap;
use std::sync::{LazyLock, OnceLock};

use sha2::{Digest, Sha256};
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::warn;

use crate::config::DEFAULT_HIGHLIGHT_STYLE;
use super::escape::html_escape;

/// CSS class prefix shared by highlighted spans and the generated stylesheet.
pub const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

// Pre-loaded syntect resources (avoid reloading per call).
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Normalize a fenced code info string into a language tag.
///
/// Takes the first whitespace-separated word; empty info means plain text.
pub fn language_tag(info: &str) -> &str {
    info.split_whitespace().next().unwrap_or("text")
}

fn find_syntax(lang: &str) -> &'static SyntaxReference {
    let ss = &*SYNTAX_SET;
    ss.find_syntax_by_token(lang)
        .or_else(|| ss.find_syntax_by_name(lang))
        .unwrap_or_else(|| ss.find_syntax_plain_text())
}

fn tokenize(code: &str, syntax: &SyntaxReference) -> Result<String, syntect::Error> {
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

/// Render a code block as highlighted HTML.
///
/// Unknown languages are tokenized as plain text. If tokenizing fails the
/// block degrades to an unstyled `<pre><code>` with the escaped source.
pub fn highlight_code(code: &str, info: &str) -> String {
    let lang = language_tag(info);
    let syntax = find_syntax(lang);

    match tokenize(code, syntax) {
        Ok(highlighted) => format!(
            "<pre class=\"code\"><code class=\"language-{}\">{}</code></pre>\n",
            html_escape(lang),
            highlighted
        ),
        Err(e) => {
            warn!(error = %e, language = %lang, "code highlighting failed; rendering plain");
            plain_code_block(code)
        }
    }
}

/// Unstyled code block containing the escaped source.
pub fn plain_code_block(code: &str) -> String {
    format!("<pre><code>{}</code></pre>\n", html_escape(code))
}

/// Names of the bundled highlighting styles, sorted.
pub fn available_styles() -> Vec<String> {
    let mut names: Vec<String> = THEME_SET.themes.keys().cloned().collect();
    names.sort();
    names
}

/// Whether `name` is one of the bundled highlighting styles.
pub fn is_known_style(name: &str) -> bool {
    THEME_SET.themes.contains_key(name)
}

/// Stylesheet for one highlighting style.
///
/// The CSS is generated lazily on first use and kept for the life of the
/// process; concurrent first callers block until the single generation
/// finishes. The entity tag only depends on the style name.
#[derive(Debug)]
pub struct Stylesheet {
    style: String,
    etag: String,
    css: OnceLock<String>,
}

impl Stylesheet {
    fn new(style: &str) -> Self {
        Self {
            style: style.to_string(),
            etag: format!("\"{}\"", hex::encode(Sha256::digest(style.as_bytes()))),
            css: OnceLock::new(),
        }
    }

    /// Style name.
    pub fn style(&self) -> &str {
        &self.style
    }

    /// Quoted entity tag for conditional requests.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// The stylesheet, generated on first access.
    pub fn css(&self) -> &str {
        self.css.get_or_init(|| generate_css(&self.style))
    }

    /// Whether the stylesheet has been generated yet.
    pub fn is_generated(&self) -> bool {
        self.css.get().is_some()
    }
}

/// Stylesheets for every bundled style, keyed by name.
///
/// The site settings pick the active style; unknown names get the default
/// style's sheet.
#[derive(Debug)]
pub struct HighlightCss {
    default_style: String,
    sheets: HashMap<String, Stylesheet>,
    fallback: Stylesheet,
}

impl HighlightCss {
    /// Create the cache; `default_style` serves unknown style names.
    pub fn new(default_style: impl Into<String>) -> Self {
        let default_style = default_style.into();
        let sheets = THEME_SET
            .themes
            .keys()
            .map(|name| (name.clone(), Stylesheet::new(name)))
            .collect();
        Self {
            fallback: Stylesheet::new(&default_style),
            default_style,
            sheets,
        }
    }

    /// Style used when a requested one is unknown.
    pub fn default_style(&self) -> &str {
        &self.default_style
    }

    /// Stylesheet for `style`.
    pub fn sheet(&self, style: &str) -> &Stylesheet {
        self.sheets
            .get(style)
            .or_else(|| self.sheets.get(&self.default_style))
            .unwrap_or(&self.fallback)
    }
}

fn generate_css(style: &str) -> String {
    let themes = &THEME_SET.themes;
    let theme = match themes.get(style) {
        Some(theme) => theme,
        None => {
            warn!(style = %style, fallback = DEFAULT_HIGHLIGHT_STYLE, "unknown highlight style");
            match themes.get(DEFAULT_HIGHLIGHT_STYLE) {
                Some(theme) => theme,
                None => return String::new(),
            }
        }
    };

    css_for_theme_with_class_style(theme, CLASS_STYLE).unwrap_or_else(|e| {
        warn!(error = %e, style = %style, "failed to generate highlight CSS");
        String::new()
    })
}
