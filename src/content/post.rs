//! Post and Page models

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A dated blog post under `source/_posts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    /// Publication date, orders the whole site
    pub date: DateTime<Local>,
    pub updated: Option<DateTime<Local>>,
    /// Markdown body with the front matter stripped
    pub raw: String,
    /// Body rendered to HTML
    pub content: String,
    /// Rendered excerpt: the front-matter `excerpt` field, or the part
    /// of the body above the separator comment
    pub excerpt: Option<String>,
    pub tags: Vec<String>,
    pub layout: String,
    /// Source path relative to the source directory
    pub source: String,
    pub full_source: PathBuf,
    /// Site-relative route, root prefix included
    pub path: String,
    /// Absolute URL
    pub permalink: String,
    pub draft: bool,
    pub slug: String,
    /// Custom front-matter fields, exposed to templates as-is
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Post {
    /// The older neighbor in a newest-first list
    pub fn prev<'a>(&self, ordered: &'a [Post]) -> Option<&'a Post> {
        let idx = ordered.iter().position(|p| p.source == self.source)?;
        ordered.get(idx + 1)
    }

    /// The newer neighbor in a newest-first list
    pub fn next<'a>(&self, ordered: &'a [Post]) -> Option<&'a Post> {
        let idx = ordered.iter().position(|p| p.source == self.source)?;
        idx.checked_sub(1).map(|i| &ordered[i])
    }
}

/// A standalone page: any Markdown document in the source tree outside
/// the underscore-prefixed directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub date: DateTime<Local>,
    pub raw: String,
    pub content: String,
    pub layout: String,
    pub source: String,
    pub full_source: PathBuf,
    pub path: String,
    pub permalink: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(title: &str, day: u32) -> Post {
        Post {
            title: title.to_string(),
            date: Local.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            updated: None,
            raw: String::new(),
            content: String::new(),
            excerpt: None,
            tags: Vec::new(),
            layout: "post".to_string(),
            source: format!("_posts/{}.md", title),
            full_source: PathBuf::new(),
            path: String::new(),
            permalink: String::new(),
            draft: false,
            slug: slug::slugify(title),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn test_prev_next_navigation() {
        // Date-descending, like the loader produces
        let posts = vec![post("newest", 3), post("middle", 2), post("oldest", 1)];

        assert_eq!(posts[1].prev(&posts).map(|p| p.title.as_str()), Some("oldest"));
        assert_eq!(posts[1].next(&posts).map(|p| p.title.as_str()), Some("newest"));
        assert!(posts[0].next(&posts).is_none());
        assert!(posts[2].prev(&posts).is_none());
    }
}
