//! Front-matter parsing
//!
//! A document opens with YAML front matter when its first non-blank
//! bytes are `---` and a closing `---` line follows. A `---` that is
//! really a thematic break at the top of prose (no `key: value` lines
//! inside) is left in the body.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error from parsing a well-delimited front-matter block
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("front matter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Front-matter data from a post or page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub updated: Option<String>,
    pub excerpt: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    pub slug: Option<String>,
    pub layout: Option<String>,
    pub draft: bool,

    /// Anything else the author put in the block, passed through to templates
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

/// Accepts `tags: rust` as well as `tags: [rust, testing]`; a bare
/// `tags:` key deserializes to the empty list.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Field>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Field::One(tag)) => vec![tag],
        Some(Field::Many(tags)) => tags,
    })
}

impl FrontMatter {
    /// Parse front matter from a document.
    /// Returns `(front_matter, remaining_content)`; a document without a
    /// front-matter block yields the default and the untouched content.
    pub fn parse(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let Some((block, body)) = Self::extract(content) else {
            return Ok((FrontMatter::default(), content.trim_start()));
        };
        if block.trim().is_empty() {
            return Ok((FrontMatter::default(), body));
        }
        let fm: FrontMatter = serde_yaml::from_str(block)?;
        Ok((fm, body))
    }

    /// Split a document into its front-matter block and body.
    /// Returns `None` when no block is present.
    pub fn extract(content: &str) -> Option<(&str, &str)> {
        let doc = content.trim_start();
        let after_opener = doc.strip_prefix("---")?;

        // Walk the lines after the opener looking for the closing `---`
        let mut offset = after_opener.find('\n')? + 1;
        let block_start = offset;
        loop {
            let line_end = after_opener[offset..]
                .find('\n')
                .map(|p| offset + p + 1)
                .unwrap_or(after_opener.len());
            let line = after_opener[offset..line_end].trim_end_matches(['\n', '\r']);
            if line == "---" {
                break;
            }
            if line_end == after_opener.len() {
                return None;
            }
            offset = line_end;
        }

        let block = &after_opener[block_start..offset];
        let body_start = after_opener[offset..]
            .find('\n')
            .map(|p| offset + p + 1)
            .unwrap_or(after_opener.len());
        let body = after_opener[body_start..].trim_start_matches(['\n', '\r']);

        if block.trim().is_empty() || has_mapping_line(block) {
            Some((block, body))
        } else {
            // A thematic break at the top of prose, not front matter
            None
        }
    }

    /// Parse the date string into a DateTime
    pub fn parse_date(&self) -> Option<DateTime<Local>> {
        self.date.as_deref().and_then(parse_date_string)
    }

    /// Parse the updated date string into a DateTime
    pub fn parse_updated(&self) -> Option<DateTime<Local>> {
        self.updated.as_deref().and_then(parse_date_string)
    }
}

/// A block only counts as YAML when some line is a `key: value` mapping
/// with a plain identifier key. `https://...` inside prose has a colon
/// but no identifier key, so it never qualifies.
fn has_mapping_line(block: &str) -> bool {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(is_mapping_line)
}

fn is_mapping_line(line: &str) -> bool {
    let Some((key, rest)) = line.split_once(':') else {
        return false;
    };
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        && (rest.is_empty() || rest.starts_with(' '))
}

/// Parse a date in the shapes authors actually write: RFC 3339, or a
/// naive `YYYY-MM-DD [HH:MM[:SS]]` (slashes accepted) taken as local
/// wall-clock time.
pub fn parse_date_string(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }

    const DATETIME: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for format in DATETIME {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return naive.and_local_timezone(Local).earliest();
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(day) = NaiveDate::parse_from_str(s, format) {
            return day
                .and_hms_opt(0, 0, 0)
                .and_then(|dt| dt.and_local_timezone(Local).earliest());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Hello World
date: 2024-01-15 10:30:00
excerpt: A short summary.
tags:
  - testing
  - design
---

This is the content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, Some("Hello World".to_string()));
        assert_eq!(fm.excerpt, Some("A short summary.".to_string()));
        assert_eq!(fm.tags, vec!["testing", "design"]);
        assert!(remaining.contains("This is the content."));
    }

    #[test]
    fn test_parse_single_string_tags() {
        let content = "---\ntitle: One Tag\ntags: notes\n---\n\nBody.\n";
        let (fm, _) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.tags, vec!["notes"]);
    }

    #[test]
    fn test_empty_tags_key() {
        let content = "---\ntitle: T\ntags:\n---\n\nBody.\n";
        let (fm, _) = FrontMatter::parse(content).unwrap();
        assert!(fm.tags.is_empty());
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, remaining) = FrontMatter::parse("Just prose, no block.\n").unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.starts_with("Just prose"));
    }

    #[test]
    fn test_unclosed_block_is_body() {
        let (fm, remaining) = FrontMatter::parse("---\ntitle: Oops\nno closer\n").unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.starts_with("---"));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let content = "---\ntitle: [unclosed\ndate: 2024-01-15\n---\n\nBody.\n";
        assert!(FrontMatter::parse(content).is_err());
    }

    #[test]
    fn test_markdown_separator_not_yaml() {
        // Content that uses --- as a thematic break, not front matter
        let content = r#"
---

Some random text with markdown lists:
- Item 1
- Item 2

---
More content here.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("Some random text"));
    }

    #[test]
    fn test_content_with_url_not_yaml() {
        let content = r#"
---

Check out https://example.com/path and http://test.com

---
More content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("https://example.com"));
    }

    #[test]
    fn test_parse_date() {
        let fm = FrontMatter {
            date: Some("2024-01-15 10:30:00".to_string()),
            ..Default::default()
        };

        let dt = fm.parse_date().unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-15 10:30");
    }

    #[test]
    fn test_date_only_is_local_midnight() {
        let dt = parse_date_string("2023-05-30").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2023-05-30 00:00");
        assert!(parse_date_string("not a date").is_none());
    }

    #[test]
    fn test_rfc3339_date() {
        assert!(parse_date_string("2024-01-15T10:30:00+02:00").is_some());
    }

    #[test]
    fn test_draft_flag() {
        let content = "---\ntitle: WIP\ndate: 2024-01-15\ndraft: true\n---\n\nBody.\n";
        let (fm, _) = FrontMatter::parse(content).unwrap();
        assert!(fm.draft);
    }
}
