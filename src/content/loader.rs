//! Loads posts and pages from the source directory

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use super::{FrontMatter, MarkdownRenderer, Page, Post};
use crate::Site;

/// Loads content from the source directory
pub struct ContentLoader<'a> {
    site: &'a Site,
    renderer: MarkdownRenderer,
}

impl<'a> ContentLoader<'a> {
    pub fn new(site: &'a Site) -> Self {
        let highlight = &site.config.highlight;
        Self {
            site,
            renderer: MarkdownRenderer::with_options(&highlight.theme, highlight.line_number),
        }
    }

    /// Load all posts from `source/_posts`, newest first.
    /// Drafts (the `_drafts` directory and `draft: true` posts) and
    /// future-dated posts are skipped per configuration.
    pub fn load_posts(&self) -> Result<Vec<Post>> {
        let mut dirs = vec![self.site.posts_dir()];
        if self.site.config.render_drafts {
            dirs.push(self.site.source_dir.join("_drafts"));
        }

        let now = Local::now();
        let mut posts = Vec::new();

        for dir in dirs.into_iter().filter(|d| d.exists()) {
            for path in markdown_files(&dir) {
                let post = match self.load_post(&path) {
                    Ok(post) => post,
                    Err(e) => {
                        tracing::warn!("Failed to load post {:?}: {}", path, e);
                        continue;
                    }
                };
                if post.draft && !self.site.config.render_drafts {
                    tracing::debug!("Skipping draft: {}", post.source);
                    continue;
                }
                if post.date > now && !self.site.config.future {
                    tracing::debug!("Skipping future-dated post: {}", post.source);
                    continue;
                }
                posts.push(post);
            }
        }

        posts.sort_by(|a, b| b.date.cmp(&a.date));

        warn_on_route_collisions(&posts);

        Ok(posts)
    }

    /// Load a single post from a file
    pub fn load_post(&self, path: &Path) -> Result<Post> {
        let text = fs::read_to_string(path)?;
        let (fm, body) =
            FrontMatter::parse(&text).with_context(|| path.display().to_string())?;

        let mtime = file_mtime(path);
        let date = fm.parse_date().or(mtime).unwrap_or_else(Local::now);
        let updated = fm.parse_updated().or(mtime);

        // A missing title falls back to the file stem so the site still
        // renders; the check command reports the field as an error
        let title = fm.title.unwrap_or_else(|| file_stem(path));
        let slug = fm.slug.unwrap_or_else(|| file_stem(path));

        let route = self.expand_permalink(&date, &slug);
        let permalink = format!("{}{}", self.site.config.url.trim_end_matches('/'), route);

        // The front-matter excerpt wins over the separator split
        let (excerpt, content) = match fm.excerpt {
            Some(ref text) => (
                Some(self.renderer.render(text)?),
                self.renderer.render(body)?,
            ),
            None => {
                let separator = &self.site.config.excerpt_separator;
                let (head, full) = MarkdownRenderer::split_excerpt(body, separator);
                let excerpt = head.map(|md| self.renderer.render(&md)).transpose()?;
                (excerpt, self.renderer.render(&full)?)
            }
        };

        Ok(Post {
            title,
            date,
            updated,
            raw: body.to_string(),
            content,
            excerpt,
            tags: fm.tags,
            layout: fm.layout.unwrap_or_else(|| "post".to_string()),
            source: self.relative_source(path),
            full_source: path.to_path_buf(),
            path: route,
            permalink,
            draft: fm.draft,
            slug,
            extra: fm.extra,
        })
    }

    /// Load all pages (markdown files outside underscore-prefixed directories)
    pub fn load_pages(&self) -> Result<Vec<Page>> {
        let source_dir = &self.site.source_dir;
        let mut pages = Vec::new();

        if !source_dir.exists() {
            return Ok(pages);
        }

        for path in markdown_files(source_dir) {
            let relative = path.strip_prefix(source_dir).unwrap_or(&path);
            if first_component_is_underscored(relative) {
                continue;
            }
            match self.load_page(&path) {
                Ok(page) => pages.push(page),
                Err(e) => tracing::warn!("Failed to load page {:?}: {}", path, e),
            }
        }

        Ok(pages)
    }

    /// Load a single page from a file
    pub fn load_page(&self, path: &Path) -> Result<Page> {
        let text = fs::read_to_string(path)?;
        let (fm, body) =
            FrontMatter::parse(&text).with_context(|| path.display().to_string())?;

        let date = fm
            .parse_date()
            .or_else(|| file_mtime(path))
            .unwrap_or_else(Local::now);

        let source = self.relative_source(path);
        let route = self.page_route(&source);
        let permalink = format!("{}{}", self.site.config.url.trim_end_matches('/'), route);

        Ok(Page {
            title: fm.title.unwrap_or_else(|| file_stem(path)),
            date,
            raw: body.to_string(),
            content: self.renderer.render(body)?,
            layout: fm.layout.unwrap_or_else(|| "page".to_string()),
            source,
            full_source: path.to_path_buf(),
            path: route,
            permalink,
            extra: fm.extra,
        })
    }

    fn relative_source(&self, path: &Path) -> String {
        path.strip_prefix(&self.site.source_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// `about/index.md` routes to `/about/`, `links.md` to `/links/`
    fn page_route(&self, source: &str) -> String {
        let stem = source
            .trim_end_matches(".markdown")
            .trim_end_matches(".md");
        let route = if stem == "index" {
            String::new()
        } else if let Some(parent) = stem.strip_suffix("/index") {
            format!("{}/", parent)
        } else {
            format!("{}/", stem)
        };
        format!("{}{}", self.site.config.root, route.trim_start_matches('/'))
    }

    /// Expand the configured permalink pattern for a post
    fn expand_permalink(&self, date: &DateTime<Local>, slug: &str) -> String {
        let mut route = self.site.config.permalink.clone();
        for (token, value) in [
            (":year", date.format("%Y").to_string()),
            (":month", date.format("%m").to_string()),
            (":day", date.format("%d").to_string()),
            (":title", slug.to_string()),
            (":name", slug.to_string()),
        ] {
            route = route.replace(token, &value);
        }
        format!("{}{}", self.site.config.root, route.trim_start_matches('/'))
    }
}

/// All `.md`/`.markdown` files under a directory
fn markdown_files(dir: &Path) -> impl Iterator<Item = std::path::PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && matches!(
                    e.path().extension().and_then(|x| x.to_str()),
                    Some("md") | Some("markdown")
                )
        })
        .map(|e| e.into_path())
}

fn first_component_is_underscored(relative: &Path) -> bool {
    relative
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .map(|c| c.starts_with('_'))
        .unwrap_or(false)
}

fn file_mtime(path: &Path) -> Option<DateTime<Local>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// Two posts on the same route shadow each other in the output tree;
/// the last one written wins. Warn here, error in check.
fn warn_on_route_collisions(posts: &[Post]) {
    let mut routes: HashMap<&str, &str> = HashMap::new();
    for post in posts {
        if let Some(other) = routes.insert(post.path.as_str(), post.source.as_str()) {
            tracing::warn!(
                "Route collision: {} and {} both map to {}",
                post.source,
                other,
                post.path
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Site;
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
    fn test_load_posts_sorted_newest_first() {
        let (_dir, site) = site_with_posts(&[
            ("old.md", "---\ntitle: Old\ndate: 2023-01-01\n---\n\nOld body.\n"),
            ("new.md", "---\ntitle: New\ndate: 2024-06-01\n---\n\nNew body.\n"),
        ]);

        let loader = ContentLoader::new(&site);
        let posts = loader.load_posts().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "New");
        assert_eq!(posts[1].title, "Old");
    }

    #[test]
    fn test_drafts_skipped_by_default() {
        let (_dir, site) = site_with_posts(&[(
            "wip.md",
            "---\ntitle: WIP\ndate: 2024-01-01\ndraft: true\n---\n\nBody.\n",
        )]);

        let loader = ContentLoader::new(&site);
        assert!(loader.load_posts().unwrap().is_empty());
    }

    #[test]
    fn test_drafts_dir_rendered_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let drafts_dir = dir.path().join("source/_drafts");
        fs::create_dir_all(&drafts_dir).unwrap();
        fs::write(
            drafts_dir.join("wip.md"),
            "---\ntitle: WIP\ndate: 2024-01-01\n---\n\nBody.\n",
        )
        .unwrap();

        let site = Site::open(dir.path()).unwrap();
        assert!(ContentLoader::new(&site).load_posts().unwrap().is_empty());

        fs::write(dir.path().join("_config.yml"), "render_drafts: true\n").unwrap();
        let site = Site::open(dir.path()).unwrap();
        let posts = ContentLoader::new(&site).load_posts().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].source, "_drafts/wip.md");
    }

    #[test]
    fn test_permalink_from_date_and_slug() {
        let (_dir, site) = site_with_posts(&[(
            "hello-world.md",
            "---\ntitle: Hello\ndate: 2024-01-15\n---\n\nBody.\n",
        )]);

        let loader = ContentLoader::new(&site);
        let posts = loader.load_posts().unwrap();
        assert_eq!(posts[0].path, "/2024/01/15/hello-world/");
    }

    #[test]
    fn test_slug_override() {
        let (_dir, site) = site_with_posts(&[(
            "whatever.md",
            "---\ntitle: T\ndate: 2024-01-15\nslug: custom-name\n---\n\nBody.\n",
        )]);

        let loader = ContentLoader::new(&site);
        let posts = loader.load_posts().unwrap();
        assert_eq!(posts[0].path, "/2024/01/15/custom-name/");
    }

    #[test]
    fn test_frontmatter_excerpt_wins_over_separator() {
        let (_dir, site) = site_with_posts(&[(
            "p.md",
            "---\ntitle: P\ndate: 2024-01-15\nexcerpt: From the field.\n---\n\nAbove.\n<!-- more -->\nBelow.\n",
        )]);

        let loader = ContentLoader::new(&site);
        let posts = loader.load_posts().unwrap();
        let excerpt = posts[0].excerpt.as_ref().unwrap();
        assert!(excerpt.contains("From the field."));
        assert!(!excerpt.contains("Above."));
    }

    #[test]
    fn test_separator_excerpt() {
        let (_dir, site) = site_with_posts(&[(
            "p.md",
            "---\ntitle: P\ndate: 2024-01-15\n---\n\nAbove.\n<!-- more -->\nBelow.\n",
        )]);

        let loader = ContentLoader::new(&site);
        let posts = loader.load_posts().unwrap();
        let excerpt = posts[0].excerpt.as_ref().unwrap();
        assert!(excerpt.contains("Above."));
        assert!(!excerpt.contains("Below."));
        assert!(posts[0].content.contains("Below."));
    }

    #[test]
    fn test_malformed_post_skipped() {
        let (_dir, site) = site_with_posts(&[
            ("bad.md", "---\ntitle: [unclosed\ndate: 2024-01-15\n---\n\nBody.\n"),
            ("good.md", "---\ntitle: Good\ndate: 2024-01-15\n---\n\nBody.\n"),
        ]);

        let loader = ContentLoader::new(&site);
        let posts = loader.load_posts().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Good");
    }

    #[test]
    fn test_load_pages_skips_underscore_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("source/_posts")).unwrap();
        fs::create_dir_all(dir.path().join("source/about")).unwrap();
        fs::write(
            dir.path().join("source/about/index.md"),
            "---\ntitle: About\n---\n\nHi.\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("source/_posts/p.md"),
            "---\ntitle: P\ndate: 2024-01-01\n---\n\nBody.\n",
        )
        .unwrap();

        let site = Site::open(dir.path()).unwrap();
        let loader = ContentLoader::new(&site);
        let pages = loader.load_pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "/about/");
    }

    #[test]
    fn test_flat_page_route() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("source")).unwrap();
        fs::write(
            dir.path().join("source/links.md"),
            "---\ntitle: Links\n---\n\nSome links.\n",
        )
        .unwrap();

        let site = Site::open(dir.path()).unwrap();
        let pages = ContentLoader::new(&site).load_pages().unwrap();
        assert_eq!(pages[0].path, "/links/");
    }
}
