//! Markdown rendering with syntax highlighting and heading anchors

use anyhow::Result;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
    theme_name: String,
    line_numbers: bool,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::with_options("base16-ocean.dark", true)
    }

    pub fn with_options(theme: &str, line_numbers: bool) -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
            theme_name: theme.to_string(),
            line_numbers,
        }
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> Result<String> {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_SMART_PUNCTUATION
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM;

        let events: Vec<Event> = Parser::new_ext(markdown, options).collect();
        let events = add_heading_anchors(events);
        let events = self.highlight_code_blocks(events);

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());

        Ok(out)
    }

    /// Replace code-block events with pre-highlighted HTML.
    /// `buffer` is Some exactly while inside a fenced or indented block.
    fn highlight_code_blocks<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut buffer: Option<(Option<String>, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        // Info strings like "rust,ignore" carry flags after the language
                        CodeBlockKind::Fenced(info) => info
                            .split([',', ' '])
                            .next()
                            .filter(|l| !l.is_empty())
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    buffer = Some((lang, String::new()));
                }
                Event::Text(text) if buffer.is_some() => {
                    if let Some((_, code)) = buffer.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = buffer.take() {
                        let html = self.highlight_code(&code, lang.as_deref());
                        out.push(Event::Html(CowStr::from(html)));
                    }
                }
                other => out.push(other),
            }
        }

        out
    }

    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");
        let syntax = self.lookup_syntax(lang);
        let theme = self
            .themes
            .themes
            .get(&self.theme_name)
            .or_else(|| self.themes.themes.values().next())
            .expect("syntect ships at least one theme");

        let Ok(highlighted) = highlighted_html_for_string(code, &self.syntaxes, syntax, theme)
        else {
            return plain_code_block(code, lang);
        };

        if self.line_numbers {
            gutter_table(&highlighted, lang)
        } else {
            format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                lang, highlighted
            )
        }
    }

    fn lookup_syntax(&self, lang: &str) -> &SyntaxReference {
        self.syntaxes
            .find_syntax_by_token(lang)
            .or_else(|| self.syntaxes.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }

    /// Split the excerpt from the body at the separator comment.
    /// Returns `(excerpt_markdown, full_markdown)`.
    pub fn split_excerpt(content: &str, separator: &str) -> (Option<String>, String) {
        match content.split_once(separator) {
            Some((head, tail)) => {
                let excerpt = head.trim().to_string();
                let full = format!("{}\n\n{}", excerpt, tail.trim());
                (Some(excerpt), full)
            }
            None => (None, content.to_string()),
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Escaped fallback when syntect cannot highlight a block
fn plain_code_block(code: &str, lang: &str) -> String {
    format!(
        r#"<pre><code class="language-{}">{}</code></pre>"#,
        lang,
        crate::helpers::html_escape(code)
    )
}

/// Two-column table with a line-number gutter beside the highlighted code
fn gutter_table(highlighted: &str, lang: &str) -> String {
    let lines: Vec<&str> = highlighted.lines().collect();
    let gutter = (1..=lines.len())
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code"><pre>{}</pre></td></tr></table></figure>"#,
        lang,
        gutter,
        lines.join("\n")
    )
}

/// Give every heading an `id` slug so in-document links have an anchor
/// to land on. Repeated heading texts get `-1`, `-2`, ... suffixes.
fn add_heading_anchors(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) if id.is_none() => {
                let text = heading_text(&events[i..]);

                let mut anchor = slug::slugify(&text);
                if anchor.is_empty() {
                    anchor = "section".to_string();
                }
                let count = seen.entry(anchor.clone()).or_insert(0);
                if *count > 0 {
                    anchor = format!("{}-{}", anchor, count);
                }
                *count += 1;

                out.push(Event::Start(Tag::Heading {
                    level: *level,
                    id: Some(CowStr::from(anchor)),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
            }
            e => out.push(e.clone()),
        }
        i += 1;
    }

    out
}

/// Plain text of the heading whose Start event opens `events`
fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in &events[1..] {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("## Hello World\n\nThis is a test.").unwrap();
        assert!(html.contains("Hello World"));
        assert!(html.contains(r#"id="hello-world""#));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```").unwrap();
        assert!(html.contains("highlight"));
    }

    #[test]
    fn test_code_block_info_string_flags() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust,ignore\nfn main() {}\n```").unwrap();
        assert!(html.contains("highlight rust"));
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("```nosuchlang\na < b\n```")
            .unwrap();
        assert!(html.contains("highlight"));
    }

    #[test]
    fn test_duplicate_headings_get_unique_anchors() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("## Setup\n\ntext\n\n## Setup\n").unwrap();
        assert!(html.contains(r#"id="setup""#));
        assert!(html.contains(r#"id="setup-1""#));
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        let (excerpt, full) = MarkdownRenderer::split_excerpt(content, "<!-- more -->");
        assert_eq!(excerpt, Some("This is excerpt.".to_string()));
        assert!(full.contains("This is excerpt."));
        assert!(full.contains("This is more content."));
    }

    #[test]
    fn test_split_excerpt_without_separator() {
        let (excerpt, full) = MarkdownRenderer::split_excerpt("No marker here.", "<!-- more -->");
        assert_eq!(excerpt, None);
        assert_eq!(full, "No marker here.");
    }
}
