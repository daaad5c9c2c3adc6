//! Markdown rendering.
//!
//! The parser only depends on [`MarkdownRenderer`]; [`CmarkRenderer`] is the
//! default implementation on top of `pulldown-cmark`.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;

use super::types::Heading;
use crate::error::ContentResult;

/// Output of a markdown render: HTML plus the headings found, in order.
#[derive(Debug, Clone, Default)]
pub struct RenderedMarkdown {
    pub html: String,
    pub headings: Vec<Heading>,
}

/// Converts a markdown body into HTML and reports its headings.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> ContentResult<RenderedMarkdown>;
}

/// CommonMark + GFM renderer.
///
/// - headings get an `id` (explicit `{#id}` or derived from the text, de-duplicated)
/// - soft line breaks render as `<br />`
/// - raw HTML passes through unchanged
#[derive(Debug, Clone, Copy)]
pub struct CmarkRenderer {
    options: Options,
}

impl Default for CmarkRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_HEADING_ATTRIBUTES,
        }
    }
}

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> ContentResult<RenderedMarkdown> {
        let mut events: Vec<Event> = Parser::new_ext(markdown, self.options).collect();
        let mut headings = Vec::new();
        let mut used_ids = FxHashMap::default();

        for i in 0..events.len() {
            if matches!(events[i], Event::SoftBreak) {
                events[i] = Event::HardBreak;
                continue;
            }
            let Event::Start(Tag::Heading { level, id, .. }) = &events[i] else {
                continue;
            };
            let (level, explicit_id) = (*level as u8, id.as_ref().map(|id| id.to_string()));

            let title = heading_text(&events[i + 1..]);
            let base = explicit_id.unwrap_or_else(|| heading_anchor(&title));
            let id = unique_id(base, &mut used_ids);

            if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[i] {
                *slot = Some(id.clone().into());
            }
            headings.push(Heading { level, id, title });
        }

        let mut html = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html, events.into_iter());

        Ok(RenderedMarkdown { html, headings })
    }
}

/// Plain text of a heading, from the events following its start tag.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(s) | Event::Code(s) => text.push_str(s),
            _ => {}
        }
    }
    text.trim().to_owned()
}

/// Lower-cased alphanumerics joined by single dashes.
fn heading_anchor(text: &str) -> String {
    let mut id = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            id.push(c);
        } else if !id.is_empty() && !id.ends_with('-') {
            id.push('-');
        }
    }
    let id = id.trim_end_matches('-');
    if id.is_empty() { "heading".to_owned() } else { id.to_owned() }
}

fn unique_id(base: String, used: &mut FxHashMap<String, usize>) -> String {
    let count = used.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}-{}", *count - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> RenderedMarkdown {
        CmarkRenderer::default().render(md).unwrap()
    }

    #[test]
    fn test_render_headings_with_ids() {
        let out = render("# Hello World\n\ntext\n\n## Second `part`\n");

        assert!(out.html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert_eq!(out.headings.len(), 2);
        assert_eq!(out.headings[0].level, 1);
        assert_eq!(out.headings[1].id, "second-part");
        assert_eq!(out.headings[1].title, "Second part");
    }

    #[test]
    fn test_render_duplicate_heading_ids() {
        let out = render("## Setup\n\n## Setup\n\n## Setup\n");
        let ids: Vec<_> = out.headings.iter().map(|h| h.id.as_str()).collect();

        assert_eq!(ids, ["setup", "setup-1", "setup-2"]);
    }

    #[test]
    fn test_render_explicit_heading_id() {
        let out = render("## Install {#install-guide}\n");
        assert_eq!(out.headings[0].id, "install-guide");
        assert!(out.html.contains(r#"id="install-guide""#));
    }

    #[test]
    fn test_render_han_heading() {
        let out = render("## 快速 开始\n");
        assert_eq!(out.headings[0].id, "快速-开始");
    }

    #[test]
    fn test_render_soft_break_as_hard_break() {
        let out = render("line one\nline two\n");
        assert!(out.html.contains("<br />"));
    }

    #[test]
    fn test_render_gfm_table_and_raw_html() {
        let out = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n<div class=\"note\">hi</div>\n");
        assert!(out.html.contains("<table>"));
        assert!(out.html.contains(r#"<div class="note">hi</div>"#));
    }

    #[test]
    fn test_heading_anchor() {
        assert_eq!(heading_anchor("What's New?"), "what-s-new");
        assert_eq!(heading_anchor("!!!"), "heading");
    }
}
