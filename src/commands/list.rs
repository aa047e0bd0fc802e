//! List site content

use anyhow::{bail, Result};
use std::collections::HashMap;

use crate::content::ContentLoader;
use crate::helpers;
use crate::Site;

/// Print posts, pages, or tag counts
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let loader = ContentLoader::new(site);

    match content_type {
        "post" | "posts" => list_posts(site, &loader),
        "page" | "pages" => list_pages(&loader),
        "tag" | "tags" => list_tags(&loader),
        other => bail!("Unknown type: {}. Available: post, page, tag", other),
    }
}

fn list_posts(site: &Site, loader: &ContentLoader<'_>) -> Result<()> {
    let posts = loader.load_posts()?;
    println!("Posts ({}):", posts.len());
    for post in posts {
        let date = helpers::format_date(&post.date, &site.config.date_format);
        println!("  {} - {} [{}]", date, post.title, post.source);
    }
    Ok(())
}

fn list_pages(loader: &ContentLoader<'_>) -> Result<()> {
    let pages = loader.load_pages()?;
    println!("Pages ({}):", pages.len());
    for page in pages {
        println!("  {} [{}]", page.title, page.source);
    }
    Ok(())
}

fn list_tags(loader: &ContentLoader<'_>) -> Result<()> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for post in loader.load_posts()? {
        for tag in post.tags {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }

    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    println!("Tags ({}):", counts.len());
    for (tag, count) in counts {
        println!("  {} ({})", tag, count);
    }
    Ok(())
}
