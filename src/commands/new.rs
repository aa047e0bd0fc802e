//! Create a new post or page from a scaffold

use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

use crate::Site;

/// Create a new post/page/draft. `path` overrides the filename derived
/// from the configured `new_post_name` pattern. Refuses to overwrite.
pub fn create_post(site: &Site, title: &str, layout: &str, path: Option<&str>) -> Result<()> {
    let now = chrono::Local::now();
    let slug = slug::slugify(title);

    let target = target_path(site, layout, &slug, path, &now);
    if target.exists() {
        bail!("File already exists: {:?}", target);
    }
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }

    let scaffold = load_scaffold(site, layout)?;
    let content = scaffold
        .replace("{{ title }}", title)
        .replace("{{ date }}", &now.format("%Y-%m-%d %H:%M:%S").to_string());
    fs::write(&target, content)?;

    println!("Created: {:?}", target);

    Ok(())
}

/// Where the new document goes: pages get `<slug>/index.md`, drafts go
/// to `_drafts`, everything else to `_posts`
fn target_path(
    site: &Site,
    layout: &str,
    slug: &str,
    path: Option<&str>,
    now: &chrono::DateTime<chrono::Local>,
) -> PathBuf {
    if layout == "page" {
        return site.source_dir.join(slug).join("index.md");
    }

    let dir = if layout == "draft" {
        site.source_dir.join("_drafts")
    } else {
        site.posts_dir()
    };

    let filename = match path {
        Some(name) => format!("{}.md", name),
        None => site
            .config
            .new_post_name
            .replace(":title", slug)
            .replace(":year", &now.format("%Y").to_string())
            .replace(":month", &now.format("%m").to_string())
            .replace(":day", &now.format("%d").to_string()),
    };

    dir.join(filename)
}

fn load_scaffold(site: &Site, layout: &str) -> Result<String> {
    let path = site.base_dir.join("scaffolds").join(format!("{}.md", layout));
    if path.exists() {
        Ok(fs::read_to_string(&path)?)
    } else {
        Ok("---\ntitle: {{ title }}\ndate: {{ date }}\n---\n".to_string())
    }
}

/// Run the new command with the configured default layout
pub fn run(site: &Site, title: &str, layout: Option<&str>) -> Result<()> {
    let layout = layout.unwrap_or(&site.config.default_layout);
    create_post(site, title, layout, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_site() -> (tempfile::TempDir, Site) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("source")).unwrap();
        let site = Site::open(dir.path()).unwrap();
        (dir, site)
    }

    #[test]
    fn test_new_post_from_default_scaffold() {
        let (_dir, site) = empty_site();
        create_post(&site, "My First Post", "post", None).unwrap();

        let path = site.source_dir.join("_posts/my-first-post.md");
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("title: My First Post"));
        assert!(content.contains("date: "));
    }

    #[test]
    fn test_new_refuses_to_overwrite() {
        let (_dir, site) = empty_site();
        create_post(&site, "Dup", "post", None).unwrap();
        assert!(create_post(&site, "Dup", "post", None).is_err());
    }

    #[test]
    fn test_new_page_goes_to_slug_dir() {
        let (_dir, site) = empty_site();
        create_post(&site, "About Me", "page", None).unwrap();
        assert!(site.source_dir.join("about-me/index.md").exists());
    }

    #[test]
    fn test_explicit_path_overrides_pattern() {
        let (_dir, site) = empty_site();
        create_post(&site, "Whatever", "post", Some("custom-file")).unwrap();
        assert!(site.source_dir.join("_posts/custom-file.md").exists());
    }
}
