//! Post excerpts for list views.

use std::borrow::Cow;

use super::markdown::render_markdown;

/// Default excerpt length in characters.
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

const ELLIPSIS: &str = "...";

/// Shorten markdown source to at most `budget` characters plus an ellipsis.
///
/// The cut lands on a character boundary and backs off to the last space
/// so words are not split, unless the only space is at the very start.
/// Content within the budget is returned untouched.
pub fn truncate_source(content: &str, budget: usize) -> Cow<'_, str> {
    let Some((cut_at, _)) = content.char_indices().nth(budget) else {
        return Cow::Borrowed(content);
    };

    let mut cut = &content[..cut_at];
    if let Some(space) = cut.rfind(' ')
        && space > 0
    {
        cut = &cut[..space];
    }

    Cow::Owned(format!("{cut}{ELLIPSIS}"))
}

/// Rendered excerpt for a post.
///
/// A non-blank explicit excerpt wins; otherwise the content is truncated to
/// `budget` characters. Either way the result goes through the markdown
/// renderer.
pub fn derive_excerpt(explicit: Option<&str>, content: &str, budget: usize) -> String {
    match explicit.filter(|e| !e.trim().is_empty()) {
        Some(excerpt) => render_markdown(excerpt),
        None => render_markdown(&truncate_source(content, budget)),
    }
}
