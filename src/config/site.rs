//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Everything `_config.yml` can say. Every field has a default, so an
/// absent or partial config file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Identity
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,

    // Addressing
    pub url: String,
    pub root: String,
    pub permalink: String,

    // Layout on disk
    pub source_dir: String,
    pub public_dir: String,
    pub tag_dir: String,
    pub archive_dir: String,

    // Authoring
    pub new_post_name: String,
    pub default_layout: String,
    pub render_drafts: bool,
    pub future: bool,
    /// HTML comment that splits the excerpt from the rest of the body
    pub excerpt_separator: String,
    pub highlight: HighlightOptions,

    /// Date format shown in templates (Moment.js tokens)
    pub date_format: String,

    pub per_page: usize,

    /// Fields this tool does not interpret, kept for templates
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "inkpress".into(),
            subtitle: String::new(),
            description: String::new(),
            author: String::new(),
            language: "en".into(),

            url: "http://example.com".into(),
            root: "/".into(),
            permalink: ":year/:month/:day/:title/".into(),

            source_dir: "source".into(),
            public_dir: "public".into(),
            tag_dir: "tags".into(),
            archive_dir: "archives".into(),

            new_post_name: ":title.md".into(),
            default_layout: "post".into(),
            render_drafts: false,
            future: true,
            excerpt_separator: "<!-- more -->".into(),
            highlight: HighlightOptions::default(),

            date_format: "YYYY-MM-DD".into(),

            per_page: 10,

            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Read `_config.yml` from a site directory, falling back to the
    /// defaults when the file does not exist
    pub fn from_dir(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join("_config.yml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Syntax highlighting options for fenced code blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightOptions {
    /// Syntect theme name
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".into(),
            line_number: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.title, "inkpress");
        assert_eq!(config.per_page, 10);
        assert_eq!(config.excerpt_separator, "<!-- more -->");
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Blog
author: Test User
per_page: 20
highlight:
  line_number: false
github_username: someone
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Blog");
        assert_eq!(config.author, "Test User");
        assert_eq!(config.per_page, 20);
        assert!(!config.highlight.line_number);
        assert_eq!(
            config.extra.get("github_username").and_then(|v| v.as_str()),
            Some("someone")
        );
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::from_dir(dir.path()).unwrap();
        assert_eq!(config.source_dir, "source");
    }

    #[test]
    fn test_bad_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_config.yml"), "title: [oops\n").unwrap();
        assert!(SiteConfig::from_dir(dir.path()).is_err());
    }
}
