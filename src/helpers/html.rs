//! HTML and XML helper functions

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Strip HTML tags from a string
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Escape XML special characters
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Strip control characters XML 1.0 forbids (everything outside
/// #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF])
pub fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            c == '\t'
                || c == '\n'
                || c == '\r'
                || ('\u{0020}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || ('\u{10000}'..='\u{10FFFF}').contains(&c)
        })
        .collect()
}

/// Rewrite root-relative `href`/`src` attributes to absolute URLs.
/// Protocol-relative targets (`//cdn...`) are external and left alone.
pub fn absolutize_urls(content: &str, base_url: &str) -> String {
    lazy_static::lazy_static! {
        static ref ROOT_RELATIVE: regex::Regex =
            regex::Regex::new(r#"(href|src)=(["'])/([^/])"#).unwrap();
    }

    let base = base_url.trim_end_matches('/');
    ROOT_RELATIVE
        .replace_all(content, |caps: &regex::Captures<'_>| {
            format!("{}={}{}/{}", &caps[1], &caps[2], base, &caps[3])
        })
        .into_owned()
}

/// Build a nested table of contents from the headings in rendered HTML.
/// Anchor hrefs match the ids the markdown renderer assigns.
pub fn toc(content: &str, max_depth: usize) -> String {
    lazy_static::lazy_static! {
        static ref HEADING: regex::Regex =
            regex::Regex::new(r#"<h([1-6])[^>]*\bid="([^"]+)"[^>]*>(.*?)</h[1-6]>"#).unwrap();
    }

    let mut html = r#"<ol class="toc">"#.to_string();
    let mut current_level = 0;

    for cap in HEADING.captures_iter(content) {
        let level: usize = cap[1].parse().unwrap_or(6);
        if level > max_depth {
            continue;
        }
        let id = &cap[2];
        let text = strip_html(&cap[3]);

        while current_level < level {
            html.push_str("<ol>");
            current_level += 1;
        }
        while current_level > level {
            html.push_str("</ol>");
            current_level -= 1;
        }

        html.push_str(&format!(
            "<li class=\"toc-item toc-level-{}\"><a class=\"toc-link\" href=\"#{}\"><span class=\"toc-text\">{}</span></a></li>",
            level, id, text
        ));
    }

    while current_level > 0 {
        html.push_str("</ol>");
        current_level -= 1;
    }

    html.push_str("</ol>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_absolutize_urls() {
        let html = r#"<a href="/2024/01/post/">x</a> <img src="/img/a.png">"#;
        let out = absolutize_urls(html, "https://example.com/");
        assert!(out.contains(r#"href="https://example.com/2024/01/post/""#));
        assert!(out.contains(r#"src="https://example.com/img/a.png""#));
    }

    #[test]
    fn test_absolutize_urls_leaves_protocol_relative() {
        let html = r#"<img src="//cdn.example.org/a.png"> <a href="/">home</a>"#;
        let out = absolutize_urls(html, "http://example.com");
        assert!(out.contains(r#"src="//cdn.example.org/a.png""#));
        assert!(out.contains(r#"href="http://example.com/""#));
    }

    #[test]
    fn test_strip_invalid_xml_chars() {
        assert_eq!(strip_invalid_xml_chars("ok\u{0008}fine"), "okfine");
        assert_eq!(strip_invalid_xml_chars("tab\tand\nnewline"), "tab\tand\nnewline");
    }

    #[test]
    fn test_toc_nesting() {
        let html = r##"<h2 id="first">First</h2><p>x</p><h3 id="inner">Inner</h3><h2 id="second">Second</h2>"##;
        let toc = toc(html, 3);
        assert!(toc.contains(r##"href="#first""##));
        assert!(toc.contains(r##"href="#inner""##));
        assert!(toc.contains("toc-level-3"));
    }

    #[test]
    fn test_toc_respects_max_depth() {
        let html = r##"<h2 id="a">A</h2><h4 id="deep">Deep</h4>"##;
        let toc = toc(html, 3);
        assert!(!toc.contains("deep"));
    }
}
