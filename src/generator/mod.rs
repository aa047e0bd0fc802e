//! Generator module - writes the static site through the embedded templates

use anyhow::Result;
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use tera::Context;
use walkdir::WalkDir;

use crate::cache::{ChangeSet, RebuildScope};
use crate::content::{Page, Post};
use crate::helpers;
use crate::templates::{
    ArchiveYearData, ConfigData, NavPost, PageData, PaginationData, PostData, SiteData, TagData,
    TemplateRenderer,
};
use crate::Site;

/// How many posts the Atom feed carries
const FEED_ENTRIES: usize = 20;

/// Static site generator
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        let renderer = TemplateRenderer::new()?;
        Ok(Self {
            site: site.clone(),
            renderer,
        })
    }

    /// Generate the entire site
    pub fn generate(&self, posts: &[Post], pages: &[Page]) -> Result<()> {
        fs::create_dir_all(&self.site.public_dir)?;

        self.copy_source_assets()?;

        let site_data = build_site_data(posts, pages);
        let config_data = self.build_config_data();

        self.generate_index_pages(posts, &site_data, &config_data)?;
        self.generate_post_pages(posts, &site_data, &config_data)?;
        self.generate_page_pages(pages, &site_data, &config_data)?;
        self.generate_archive_page(posts, &site_data, &config_data)?;
        self.generate_tag_pages(posts, &site_data, &config_data, None)?;
        self.generate_atom_feed(posts)?;
        self.generate_search_index(posts)?;

        Ok(())
    }

    /// Regenerate only what a changeset touches
    pub fn generate_incremental(
        &self,
        posts: &[Post],
        pages: &[Page],
        changeset: &ChangeSet,
    ) -> Result<()> {
        if changeset.full_rebuild {
            return self.generate(posts, pages);
        }

        fs::create_dir_all(&self.site.public_dir)?;
        self.copy_source_assets()?;

        let site_data = build_site_data(posts, pages);
        let config_data = self.build_config_data();

        let changed_posts: Vec<&Post> = posts
            .iter()
            .filter(|p| changeset.changed_posts.contains(&p.source))
            .collect();
        for post in &changed_posts {
            self.generate_post_page(post, posts, &site_data, &config_data)?;
        }

        // A changed post shifts prev/next navigation on its neighbors
        for post in &changed_posts {
            if let Some(prev) = post.prev(posts) {
                self.generate_post_page(prev, posts, &site_data, &config_data)?;
            }
            if let Some(next) = post.next(posts) {
                self.generate_post_page(next, posts, &site_data, &config_data)?;
            }
        }

        for page in pages
            .iter()
            .filter(|p| changeset.changed_pages.contains(&p.source))
        {
            self.generate_page_page(page, &site_data, &config_data)?;
        }

        if changeset.rebuild_index {
            self.generate_index_pages(posts, &site_data, &config_data)?;
            self.generate_atom_feed(posts)?;
            self.generate_search_index(posts)?;
        }
        if changeset.rebuild_archives {
            self.generate_archive_page(posts, &site_data, &config_data)?;
        }
        match &changeset.rebuild_tags {
            RebuildScope::None => {}
            RebuildScope::Specific(tags) => {
                self.generate_tag_pages(posts, &site_data, &config_data, Some(tags.as_slice()))?;
            }
            RebuildScope::All => {
                self.generate_tag_pages(posts, &site_data, &config_data, None)?;
            }
        }

        Ok(())
    }

    /// Build config data for templates
    fn build_config_data(&self) -> ConfigData {
        let c = &self.site.config;
        ConfigData {
            title: c.title.clone(),
            subtitle: c.subtitle.clone(),
            description: c.description.clone(),
            author: c.author.clone(),
            url: c.url.clone(),
            root: c.root.clone(),
            tag_dir: c.tag_dir.clone(),
            archive_dir: c.archive_dir.clone(),
            date_format: c.date_format.clone(),
            extra: c.extra.clone(),
        }
    }

    /// Create a base context with common variables
    fn base_context(&self, site_data: &SiteData, config_data: &ConfigData) -> Context {
        let mut context = Context::new();
        context.insert("site", site_data);
        context.insert("config", config_data);
        context.insert(
            "current_year",
            &chrono::Local::now().format("%Y").to_string(),
        );
        context
    }

    /// Generate index pages with pagination
    fn generate_index_pages(
        &self,
        posts: &[Post],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let per_page = self.site.config.per_page.max(1);
        let total_pages = posts.len().div_ceil(per_page).max(1);
        let root = self.site.config.root.trim_end_matches('/');

        for page_num in 1..=total_pages {
            let start = (page_num - 1) * per_page;
            let end = (start + per_page).min(posts.len());
            let page_posts: Vec<PostData> = posts[start..end].iter().map(post_data).collect();

            let page_url = |n: usize| {
                if n <= 1 {
                    format!("{}/", root)
                } else {
                    format!("{}/page/{}/", root, n)
                }
            };

            let pagination = PaginationData {
                per_page,
                total: total_pages,
                current: page_num,
                current_url: page_url(page_num),
                prev_link: if page_num > 1 {
                    page_url(page_num - 1)
                } else {
                    String::new()
                },
                next_link: if page_num < total_pages {
                    page_url(page_num + 1)
                } else {
                    String::new()
                },
            };

            let mut context = self.base_context(site_data, config_data);
            context.insert("page_posts", &page_posts);
            context.insert("pagination", &pagination);

            let html = self.renderer.render("index.html", &context)?;

            let output_path = if page_num == 1 {
                self.site.public_dir.join("index.html")
            } else {
                self.site
                    .public_dir
                    .join(format!("page/{}/index.html", page_num))
            };
            write_output(&output_path, &html)?;
        }

        tracing::info!("Generated {} index page(s)", total_pages);
        Ok(())
    }

    /// Generate individual post pages
    fn generate_post_pages(
        &self,
        posts: &[Post],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        for post in posts {
            self.generate_post_page(post, posts, site_data, config_data)?;
        }
        tracing::info!("Generated {} post page(s)", posts.len());
        Ok(())
    }

    fn generate_post_page(
        &self,
        post: &Post,
        all_posts: &[Post],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let toc_html = helpers::toc(&post.content, 3);
        let has_toc = toc_html.contains("toc-item");

        let tag_paths: HashMap<&str, String> = post
            .tags
            .iter()
            .map(|t| (t.as_str(), self.tag_path(t)))
            .collect();

        let mut context = self.base_context(site_data, config_data);
        context.insert("post", &post_data(post));
        context.insert("toc", &toc_html);
        context.insert("show_toc", &has_toc);
        context.insert("tag_paths", &tag_paths);

        if let Some(prev) = post.prev(all_posts) {
            context.insert(
                "prev_post",
                &NavPost {
                    title: prev.title.clone(),
                    path: prev.path.clone(),
                },
            );
        }
        if let Some(next) = post.next(all_posts) {
            context.insert(
                "next_post",
                &NavPost {
                    title: next.title.clone(),
                    path: next.path.clone(),
                },
            );
        }

        let html = self.renderer.render("post.html", &context)?;
        let output_path = self.output_path_for_route(&post.path);
        write_output(&output_path, &html)?;
        tracing::debug!("Generated post: {:?}", output_path);
        Ok(())
    }

    /// Generate standalone pages
    fn generate_page_pages(
        &self,
        pages: &[Page],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        for page in pages {
            self.generate_page_page(page, site_data, config_data)?;
        }
        Ok(())
    }

    fn generate_page_page(
        &self,
        page: &Page,
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let mut context = self.base_context(site_data, config_data);
        context.insert("page", &page_data(page));

        let html = self.renderer.render("page.html", &context)?;
        let output_path = self.output_path_for_route(&page.path);
        write_output(&output_path, &html)?;
        tracing::debug!("Generated page: {:?}", output_path);
        Ok(())
    }

    /// Generate the archive page, grouped by year, newest first
    fn generate_archive_page(
        &self,
        posts: &[Post],
        site_data: &SiteData,
        config_data: &ConfigData,
    ) -> Result<()> {
        let mut years_map: BTreeMap<i32, Vec<PostData>> = BTreeMap::new();
        for post in posts {
            years_map
                .entry(post.date.year())
                .or_default()
                .push(listing_data(post));
        }

        let archive_years: Vec<ArchiveYearData> = years_map
            .into_iter()
            .rev()
            .map(|(year, posts)| ArchiveYearData { year, posts })
            .collect();

        let mut context = self.base_context(site_data, config_data);
        context.insert("archive_years", &archive_years);

        let html = self.renderer.render("archive.html", &context)?;
        let output_path = self
            .site
            .public_dir
            .join(&self.site.config.archive_dir)
            .join("index.html");
        write_output(&output_path, &html)?;
        tracing::info!("Generated archive page");
        Ok(())
    }

    /// Generate the tag overview and per-tag pages.
    /// `only` limits regeneration to the named tags.
    fn generate_tag_pages(
        &self,
        posts: &[Post],
        site_data: &SiteData,
        config_data: &ConfigData,
        only: Option<&[String]>,
    ) -> Result<()> {
        let mut tags_map: HashMap<String, Vec<PostData>> = HashMap::new();
        for post in posts {
            for tag in &post.tags {
                if tag.trim().is_empty() {
                    continue;
                }
                tags_map
                    .entry(tag.clone())
                    .or_default()
                    .push(listing_data(post));
            }
        }

        let mut all_tags: Vec<TagData> = tags_map
            .into_iter()
            .map(|(name, posts)| TagData {
                slug: slug::slugify(&name),
                path: self.tag_path(&name),
                name,
                posts,
            })
            .collect();
        all_tags.sort_by(|a, b| a.name.cmp(&b.name));

        // Tag overview always reflects the full set
        let mut context = self.base_context(site_data, config_data);
        context.insert("all_tags", &all_tags);
        let html = self.renderer.render("tags.html", &context)?;
        let overview_path = self
            .site
            .public_dir
            .join(&self.site.config.tag_dir)
            .join("index.html");
        write_output(&overview_path, &html)?;

        let mut written = 0;
        for tag in &all_tags {
            if let Some(only) = only {
                if !only.contains(&tag.name) {
                    continue;
                }
            }
            if tag.slug.is_empty() {
                continue;
            }

            let mut context = self.base_context(site_data, config_data);
            context.insert("tag", tag);

            let html = self.renderer.render("tag.html", &context)?;
            let output_path = self
                .site
                .public_dir
                .join(&self.site.config.tag_dir)
                .join(&tag.slug)
                .join("index.html");
            write_output(&output_path, &html)?;
            written += 1;
        }

        tracing::info!("Generated {} tag page(s)", written);
        Ok(())
    }

    /// Generate the Atom feed with the newest posts
    fn generate_atom_feed(&self, posts: &[Post]) -> Result<()> {
        use std::fmt::Write;

        let config = &self.site.config;
        let site_url = helpers::full_url_for(config, "");
        let updated = posts
            .first()
            .map(|p| p.updated.unwrap_or(p.date))
            .unwrap_or_else(chrono::Local::now);

        let mut feed = String::new();
        writeln!(feed, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
        writeln!(feed, r#"<feed xmlns="http://www.w3.org/2005/Atom">"#)?;
        writeln!(feed, "  <title>{}</title>", helpers::escape_xml(&config.title))?;
        writeln!(
            feed,
            r#"  <link href="{}" rel="self"/>"#,
            helpers::full_url_for(config, "atom.xml")
        )?;
        writeln!(feed, r#"  <link href="{}"/>"#, site_url)?;
        writeln!(feed, "  <updated>{}</updated>", updated.to_rfc3339())?;
        writeln!(feed, "  <id>{}</id>", site_url)?;
        if !config.author.is_empty() {
            writeln!(
                feed,
                "  <author><name>{}</name></author>",
                helpers::escape_xml(&config.author)
            )?;
        }

        for post in posts.iter().take(FEED_ENTRIES) {
            // CDATA content: root-relative links made absolute, control
            // characters XML 1.0 forbids stripped
            let body = post.excerpt.as_ref().unwrap_or(&post.content);
            let body = helpers::absolutize_urls(body, &config.url);
            let body = helpers::strip_invalid_xml_chars(&body);

            writeln!(feed, "  <entry>")?;
            writeln!(feed, "    <title>{}</title>", helpers::escape_xml(&post.title))?;
            writeln!(feed, r#"    <link href="{}"/>"#, post.permalink)?;
            writeln!(feed, "    <id>{}</id>", post.permalink)?;
            writeln!(feed, "    <published>{}</published>", post.date.to_rfc3339())?;
            writeln!(
                feed,
                "    <updated>{}</updated>",
                post.updated.unwrap_or(post.date).to_rfc3339()
            )?;
            writeln!(
                feed,
                r#"    <content type="html"><![CDATA[{}]]></content>"#,
                body
            )?;
            writeln!(feed, "  </entry>")?;
        }

        writeln!(feed, "</feed>")?;

        write_output(&self.site.public_dir.join("atom.xml"), &feed)?;
        tracing::info!("Generated atom.xml");
        Ok(())
    }

    /// Generate the JSON search index
    fn generate_search_index(&self, posts: &[Post]) -> Result<()> {
        let search_data: Vec<serde_json::Value> = posts
            .iter()
            .map(|p| {
                serde_json::json!({
                    "title": p.title,
                    "url": p.path,
                    "content": helpers::strip_html(&p.content),
                    "date": p.date.format("%Y-%m-%d").to_string(),
                    "tags": p.tags,
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&search_data)?;
        write_output(&self.site.public_dir.join("search.json"), &json)?;
        tracing::info!("Generated search.json");
        Ok(())
    }

    /// Copy non-markdown source files (images, downloads) to the output
    fn copy_source_assets(&self) -> Result<()> {
        let source_dir = &self.site.source_dir;
        if !source_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(source_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str());
            if matches!(ext, Some("md") | Some("markdown")) {
                continue;
            }

            let relative = path.strip_prefix(source_dir)?;
            if relative
                .components()
                .next()
                .and_then(|c| c.as_os_str().to_str())
                .map(|c| c.starts_with('_'))
                .unwrap_or(false)
            {
                continue;
            }

            let dest = self.site.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
        }

        Ok(())
    }

    fn tag_path(&self, tag: &str) -> String {
        helpers::url_for(
            &self.site.config,
            &format!("{}/{}/", self.site.config.tag_dir, slug::slugify(tag)),
        )
    }

    /// Map a directory-style route onto `public/<route>/index.html`
    fn output_path_for_route(&self, route: &str) -> std::path::PathBuf {
        let root = self.site.config.root.trim_end_matches('/');
        let clean = route
            .strip_prefix(root)
            .unwrap_or(route)
            .trim_start_matches('/');
        self.site.public_dir.join(clean).join("index.html")
    }
}

fn post_data(post: &Post) -> PostData {
    PostData {
        title: post.title.clone(),
        date: post.date.format("%Y-%m-%d").to_string(),
        path: post.path.clone(),
        permalink: post.permalink.clone(),
        tags: post.tags.clone(),
        content: post.content.clone(),
        excerpt: post.excerpt.clone(),
        extra: post.extra.clone(),
    }
}

/// Like `post_data`, but without the body, for listings
fn listing_data(post: &Post) -> PostData {
    PostData {
        title: post.title.clone(),
        date: post.date.format("%Y-%m-%d").to_string(),
        path: post.path.clone(),
        permalink: post.permalink.clone(),
        tags: post.tags.clone(),
        content: String::new(),
        excerpt: None,
        extra: HashMap::new(),
    }
}

fn page_data(page: &Page) -> PageData {
    PageData {
        title: page.title.clone(),
        date: page.date.format("%Y-%m-%d").to_string(),
        path: page.path.clone(),
        permalink: page.permalink.clone(),
        content: page.content.clone(),
        layout: page.layout.clone(),
        extra: page.extra.clone(),
    }
}

/// Build site-wide data for templates
fn build_site_data(posts: &[Post], pages: &[Page]) -> SiteData {
    let mut tags: HashMap<String, usize> = HashMap::new();
    for post in posts {
        for tag in &post.tags {
            *tags.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    SiteData {
        posts: posts.iter().map(post_data).collect(),
        pages: pages.iter().map(page_data).collect(),
        tags,
        post_count: posts.len(),
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
    }
    fs::write(path, content).map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", path, e))?;
    Ok(())
}
