//! Markdown to HTML rendering.
//!
//! Rendering is a pure function of its input: the same markdown always
//! yields the same HTML and no input makes it fail.

use std::collections::HashMap;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};

use super::highlight::highlight_code;
use super::slug::slugify;
use super::escape::html_escape;

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Render markdown to sanitized HTML.
///
/// Code blocks are highlighted, headings get stable ids and external links
/// open in a new tab. Empty input renders to an empty string.
pub fn render_markdown(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let events = transform_events(Parser::new_ext(text, parser_options()));
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    sanitize_html(&out)
}

/// Sanitize author-supplied HTML.
///
/// Keeps the markup the renderer itself emits (highlight classes, heading
/// ids, task list checkboxes, link targets) and strips scripts, event
/// handlers and unknown tags. Links get `rel="noopener noreferrer"`.
pub fn sanitize_html(html: &str) -> String {
    ammonia::Builder::default()
        .add_tags(["input"])
        .add_tag_attributes("input", ["type", "checked", "disabled"])
        .add_tag_attributes("a", ["target"])
        .add_generic_attributes(["class", "id"])
        .clean(html)
        .to_string()
}

fn is_external(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Rewrite the event stream: highlight code, assign heading ids, mark
/// external links.
fn transform_events<'a>(parser: Parser<'a>) -> Vec<Event<'a>> {
    let mut out: Vec<Event<'a>> = Vec::new();
    let mut used_ids: HashMap<String, usize> = HashMap::new();

    let mut code: Option<(String, String)> = None;
    let mut heading: Option<(Tag<'a>, Vec<Event<'a>>, String)> = None;
    let mut external_link_open = false;

    for event in parser {
        // Inside a code block: collect raw text until the block ends.
        if let Some((info, buf)) = code.as_mut() {
            match event {
                Event::Text(t) => buf.push_str(&t),
                Event::End(TagEnd::CodeBlock) => {
                    let (info, buf) = (std::mem::take(info), std::mem::take(buf));
                    code = None;
                    push_event(&mut out, &mut heading, Event::Html(highlight_code(&buf, &info).into()));
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code = Some((info, String::new()));
            }
            Event::Start(tag @ Tag::Heading { .. }) => {
                heading = Some((tag, Vec::new(), String::new()));
            }
            Event::End(TagEnd::Heading(level)) => {
                let Some((tag, inner, text)) = heading.take() else {
                    out.push(Event::End(TagEnd::Heading(level)));
                    continue;
                };
                let tag = match tag {
                    Tag::Heading {
                        level,
                        id,
                        classes,
                        attrs,
                    } => {
                        let id = match id {
                            Some(explicit) => explicit,
                            None => CowStr::from(unique_id(&text, &mut used_ids)),
                        };
                        Tag::Heading {
                            level,
                            id: Some(id),
                            classes,
                            attrs,
                        }
                    }
                    other => other,
                };
                out.push(Event::Start(tag));
                out.extend(inner);
                out.push(Event::End(TagEnd::Heading(level)));
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                if is_external(&dest_url) {
                    external_link_open = true;
                    let mut open = format!("<a href=\"{}\"", html_escape(&dest_url));
                    if !title.is_empty() {
                        open.push_str(&format!(" title=\"{}\"", html_escape(&title)));
                    }
                    open.push_str(" target=\"_blank\" rel=\"noopener noreferrer\">");
                    push_event(&mut out, &mut heading, Event::InlineHtml(open.into()));
                } else {
                    let start = Event::Start(Tag::Link {
                        link_type,
                        dest_url,
                        title,
                        id,
                    });
                    push_event(&mut out, &mut heading, start);
                }
            }
            Event::End(TagEnd::Link) if external_link_open => {
                external_link_open = false;
                push_event(&mut out, &mut heading, Event::InlineHtml("</a>".into()));
            }
            other => {
                if let Some((_, _, text)) = heading.as_mut()
                    && let Event::Text(t) | Event::Code(t) = &other
                {
                    text.push_str(t);
                }
                push_event(&mut out, &mut heading, other);
            }
        }
    }

    out
}

fn push_event<'a>(
    out: &mut Vec<Event<'a>>,
    heading: &mut Option<(Tag<'a>, Vec<Event<'a>>, String)>,
    event: Event<'a>,
) {
    match heading {
        Some((_, inner, _)) => inner.push(event),
        None => out.push(event),
    }
}

fn unique_id(text: &str, used: &mut HashMap<String, usize>) -> String {
    let base = match slugify(text) {
        s if s.is_empty() => "section".to_string(),
        s => s,
    };
    let count = used.entry(base.clone()).or_insert(0);
    let id = if *count == 0 {
        base
    } else {
        format!("{base}-{count}")
    };
    *count += 1;
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_renders_empty() {
        assert_eq!(render_markdown(""), "");
        assert_eq!(render_markdown("  \n\n"), "");
    }

    #[test]
    fn inline_code_and_fenced_python() {
        let html = render_markdown("Use `x` here.\n\n```python\nprint('hi')\n```\n");
        assert!(html.contains("<code>x</code>"));
        assert!(html.contains("<pre class=\"code\"><code class=\"language-python\">"));
        assert!(html.contains("hl-"));
        assert!(html.contains("print"));
    }

    #[test]
    fn indented_code_is_plain_text_block() {
        let html = render_markdown("para\n\n    let a = 1;\n");
        assert!(html.contains("language-text"));
        assert!(html.contains("let a = 1;"));
    }

    #[test]
    fn headings_get_deduplicated_ids() {
        let html = render_markdown("# Intro\n\n## Intro\n\n### Intro\n");
        assert!(html.contains("<h1 id=\"intro\">"));
        assert!(html.contains("<h2 id=\"intro-1\">"));
        assert!(html.contains("<h3 id=\"intro-2\">"));
    }

    #[test]
    fn explicit_heading_id_is_kept() {
        let html = render_markdown("# Title {#custom}\n");
        assert!(html.contains("id=\"custom\""));
    }

    #[test]
    fn heading_with_inline_code_uses_text_for_id() {
        let html = render_markdown("## Using `cargo` today\n");
        assert!(html.contains("id=\"using-cargo-today\""));
        assert!(html.contains("<code>cargo</code>"));
    }

    #[test]
    fn external_links_open_in_new_tab() {
        let html = render_markdown("[site](https://example.com) and [local](/pages/about)");
        assert!(html.contains("href=\"https://example.com\""));
        assert!(html.contains("target=\"_blank\""));
        assert!(html.contains("noopener"));
        assert_eq!(html.matches("target=\"_blank\"").count(), 1);
        assert!(html.contains("href=\"/pages/about\""));
    }

    #[test]
    fn scripts_are_stripped() {
        let html = render_markdown("hello <script>alert(1)</script> <b onclick=\"x()\">b</b>");
        assert!(!html.contains("<script"));
        assert!(!html.contains("onclick"));
        assert!(html.contains("<b>b</b>"));
    }

    #[test]
    fn tables_and_strikethrough() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let src = "# A\n\n```rust\nfn f() {}\n```\n\n[x](http://x.io)\n";
        assert_eq!(render_markdown(src), render_markdown(src));
    }

    #[test]
    fn sanitize_keeps_classes_drops_style() {
        let html = sanitize_html("<p class=\"lead\" style=\"color:red\">hi</p>");
        assert_eq!(html, "<p class=\"lead\">hi</p>");
    }
}
