//! Content-integrity checks
//!
//! Lints the source tree for the problems that break a published site:
//! malformed front matter, posts whose routes collide, duplicate
//! publication dates, and internal links that resolve to nothing.

pub mod links;

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::content::{ContentLoader, FrontMatter};
use crate::Site;

/// How bad a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single finding, tied to the source file it concerns
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub source: String,
    pub message: String,
}

/// The outcome of a check run
#[derive(Debug, Default)]
pub struct Report {
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue {
            severity: Severity::Error,
            source: source.into(),
            message: message.into(),
        });
    }

    pub fn warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue {
            severity: Severity::Warning,
            source: source.into(),
            message: message.into(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len() - self.error_count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Run every check against a site
pub fn run(site: &Site) -> Result<Report> {
    let mut report = Report::default();

    check_front_matter(site, &mut report)?;

    let loader = ContentLoader::new(site);
    let posts = loader.load_posts()?;
    let pages = loader.load_pages()?;

    check_duplicate_routes(&posts, &mut report);
    check_duplicate_dates(&posts, &mut report);
    links::check_links(site, &posts, &pages, &mut report)?;

    Ok(report)
}

/// Front matter parses, and posts carry the required fields
fn check_front_matter(site: &Site, report: &mut Report) -> Result<()> {
    let posts_dir = site.posts_dir();

    for entry in WalkDir::new(&site.source_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_markdown(path) {
            continue;
        }

        let relative = path
            .strip_prefix(&site.source_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        let is_post = path.starts_with(&posts_dir);
        if !is_post {
            // Skip other underscore-prefixed dirs (drafts, includes)
            if relative
                .split('/')
                .next()
                .map(|c| c.starts_with('_'))
                .unwrap_or(false)
            {
                continue;
            }
        }

        let content = fs::read_to_string(path)?;
        let fm = match FrontMatter::parse(&content) {
            Ok((fm, _)) => fm,
            Err(e) => {
                report.error(&relative, e.to_string());
                continue;
            }
        };

        if is_post {
            match &fm.title {
                Some(t) if !t.trim().is_empty() => {}
                _ => report.error(&relative, "missing front-matter field: title"),
            }
            match &fm.date {
                None => report.error(&relative, "missing front-matter field: date"),
                Some(raw) => {
                    if fm.parse_date().is_none() {
                        report.error(&relative, format!("unparseable date: {:?}", raw));
                    }
                }
            }
        } else if fm.title.is_none() {
            report.warning(&relative, "page has no title, the file stem will be used");
        }
    }

    Ok(())
}

/// No two posts may share a route
fn check_duplicate_routes(posts: &[crate::content::Post], report: &mut Report) {
    let mut by_route: HashMap<&str, Vec<&str>> = HashMap::new();
    for post in posts {
        by_route.entry(&post.path).or_default().push(&post.source);
    }

    for (route, sources) in by_route {
        if sources.len() > 1 {
            let mut sources = sources;
            sources.sort();
            report.error(
                sources[0],
                format!("route {} collides with: {}", route, sources[1..].join(", ")),
            );
        }
    }
}

/// Equal date-times leave post ordering unspecified
fn check_duplicate_dates(posts: &[crate::content::Post], report: &mut Report) {
    let mut by_date: HashMap<i64, Vec<&str>> = HashMap::new();
    for post in posts {
        by_date
            .entry(post.date.timestamp())
            .or_default()
            .push(&post.source);
    }

    for sources in by_date.into_values() {
        if sources.len() > 1 {
            let mut sources = sources;
            sources.sort();
            report.warning(
                sources[0],
                format!(
                    "identical date on multiple posts ({}); their relative order is unspecified",
                    sources.join(", ")
                ),
            );
        }
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn site_with_posts(posts: &[(&str, &str)]) -> (tempfile::TempDir, Site) {
        let dir = tempfile::tempdir().unwrap();
        let posts_dir = dir.path().join("source/_posts");
        fs::create_dir_all(&posts_dir).unwrap();
        for (name, content) in posts {
            fs::write(posts_dir.join(name), content).unwrap();
        }
        let site = Site::open(dir.path()).unwrap();
        (dir, site)
    }

    #[test]
    fn test_clean_site_passes() {
        let (_dir, site) = site_with_posts(&[(
            "good.md",
            "---\ntitle: Good\ndate: 2024-01-15\n---\n\nBody text.\n",
        )]);

        let report = run(&site).unwrap();
        assert!(!report.has_errors(), "issues: {:?}", report.issues);
    }

    #[test]
    fn test_missing_title_and_date() {
        let (_dir, site) = site_with_posts(&[("bare.md", "No front matter at all.\n")]);

        let report = run(&site).unwrap();
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_unparseable_date() {
        let (_dir, site) = site_with_posts(&[(
            "p.md",
            "---\ntitle: P\ndate: someday soon\n---\n\nBody.\n",
        )]);

        let report = run(&site).unwrap();
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("unparseable date")));
    }

    #[test]
    fn test_malformed_yaml_reported() {
        let (_dir, site) = site_with_posts(&[(
            "bad.md",
            "---\ntitle: [unclosed\ndate: 2024-01-15\n---\n\nBody.\n",
        )]);

        let report = run(&site).unwrap();
        assert!(report.has_errors());
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("not valid YAML")));
    }

    #[test]
    fn test_duplicate_route_is_error() {
        // Same date, same slug via front matter -> same route
        let (_dir, site) = site_with_posts(&[
            (
                "a.md",
                "---\ntitle: A\ndate: 2024-01-15 08:00:00\nslug: same\n---\n\nBody.\n",
            ),
            (
                "b.md",
                "---\ntitle: B\ndate: 2024-01-15 09:00:00\nslug: same\n---\n\nBody.\n",
            ),
        ]);

        let report = run(&site).unwrap();
        assert!(report
            .issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("collides")));
    }

    #[test]
    fn test_duplicate_date_is_warning() {
        let (_dir, site) = site_with_posts(&[
            ("a.md", "---\ntitle: A\ndate: 2024-01-15\n---\n\nBody.\n"),
            ("b.md", "---\ntitle: B\ndate: 2024-01-15\n---\n\nBody.\n"),
        ]);

        let report = run(&site).unwrap();
        assert!(!report.has_errors());
        assert!(report
            .issues
            .iter()
            .any(|i| i.severity == Severity::Warning && i.message.contains("identical date")));
    }
}
