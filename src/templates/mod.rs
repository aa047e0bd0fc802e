//! Built-in theme rendered through Tera
//!
//! The whole theme is embedded in the binary; sites carry content, not
//! template code.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};

use crate::helpers;

const THEME: [(&str, &str); 7] = [
    ("layout.html", include_str!("builtin/layout.html")),
    ("index.html", include_str!("builtin/index.html")),
    ("post.html", include_str!("builtin/post.html")),
    ("page.html", include_str!("builtin/page.html")),
    ("archive.html", include_str!("builtin/archive.html")),
    ("tag.html", include_str!("builtin/tag.html")),
    ("tags.html", include_str!("builtin/tags.html")),
];

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        // Context values are already-rendered HTML fragments
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(THEME.to_vec())?;

        tera.register_filter("strip_html", filter_strip_html);
        tera.register_filter("truncate_chars", filter_truncate_chars);
        tera.register_filter("date_format", filter_date_format);

        Ok(Self { tera })
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

fn string_arg(value: &Value, filter: &str) -> tera::Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| tera::Error::msg(format!("{} expects a string", filter)))
}

/// `{{ html | strip_html }}` drops the tags, keeps the text
fn filter_strip_html(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = string_arg(value, "strip_html")?;
    Ok(Value::String(helpers::strip_html(&s)))
}

/// `{{ text | truncate_chars(length=200) }}`
fn filter_truncate_chars(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = string_arg(value, "truncate_chars")?;
    let length = args
        .get("length")
        .and_then(Value::as_u64)
        .unwrap_or(150) as usize;
    let omission = args
        .get("omission")
        .and_then(Value::as_str)
        .unwrap_or(" ...");

    if s.chars().count() <= length {
        return Ok(Value::String(s));
    }
    let cut: String = s.chars().take(length).collect();
    Ok(Value::String(format!("{}{}", cut.trim_end(), omission)))
}

/// `{{ post.date | date_format(format="LL") }}` reformats a
/// `YYYY-MM-DD` date string with Moment.js-style tokens
fn filter_date_format(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = string_arg(value, "date_format")?;
    let format = args
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("YYYY-MM-DD");

    let Ok(date) = chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") else {
        return Ok(Value::String(s));
    };
    let formatted = date
        .format(&helpers::moment_to_chrono_format(format))
        .to_string();
    Ok(Value::String(formatted))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub posts: Vec<PostData>,
    pub pages: Vec<PageData>,
    pub tags: HashMap<String, usize>,
    pub post_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    pub date: String,
    pub path: String,
    pub permalink: String,
    pub tags: Vec<String>,
    pub content: String,
    pub excerpt: Option<String>,
    /// Custom front-matter fields, available as `post.<key>`
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub date: String,
    pub path: String,
    pub permalink: String,
    pub content: String,
    pub layout: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub per_page: usize,
    pub total: usize,
    pub current: usize,
    pub current_url: String,
    pub prev_link: String,
    pub next_link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveYearData {
    pub year: i32,
    pub posts: Vec<PostData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagData {
    pub name: String,
    pub slug: String,
    pub path: String,
    pub posts: Vec<PostData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub url: String,
    pub root: String,
    pub tag_dir: String,
    pub archive_dir: String,
    pub date_format: String,
    /// Uninterpreted `_config.yml` keys, available as `config.<key>`
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_compile() {
        // Tera validates all templates at load time
        TemplateRenderer::new().unwrap();
    }

    #[test]
    fn test_date_format_filter() {
        let mut tera = Tera::default();
        tera.register_filter("date_format", filter_date_format);
        tera.add_raw_template("t", r#"{{ d | date_format(format="LL") }}"#)
            .unwrap();
        let mut context = Context::new();
        context.insert("d", "2024-01-15");
        assert_eq!(tera.render("t", &context).unwrap(), "January 15, 2024");
    }

    #[test]
    fn test_truncate_chars_filter() {
        let mut tera = Tera::default();
        tera.register_filter("truncate_chars", filter_truncate_chars);
        tera.add_raw_template("t", r#"{{ s | truncate_chars(length=5) }}"#)
            .unwrap();
        let mut context = Context::new();
        context.insert("s", "Hello World");
        assert_eq!(tera.render("t", &context).unwrap(), "Hello ...");
    }

    #[test]
    fn test_strip_html_filter_rejects_numbers() {
        let args = HashMap::new();
        assert!(filter_strip_html(&Value::from(3), &args).is_err());
    }
}
