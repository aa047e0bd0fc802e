//! Internal link resolution
//!
//! Every `href`/`src` in rendered content must land somewhere: a
//! generated route, a copied asset, or a heading anchor. External
//! targets are left alone.

use anyhow::Result;
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use walkdir::WalkDir;

use super::Report;
use crate::content::{Page, Post};
use crate::Site;

lazy_static! {
    static ref LINK_ATTR: Regex = Regex::new(r#"(?:href|src)=["']([^"']+)["']"#).unwrap();
    static ref ID_ATTR: Regex = Regex::new(r#"\bid=["']([^"']+)["']"#).unwrap();
}

/// Check every internal link in rendered posts and pages
pub fn check_links(
    site: &Site,
    posts: &[Post],
    pages: &[Page],
    report: &mut Report,
) -> Result<()> {
    let routes = site_routes(site, posts, pages);
    let assets = asset_routes(site)?;

    let mut anchors_by_route: HashMap<String, HashSet<String>> = HashMap::new();
    for post in posts {
        anchors_by_route.insert(normalize_route(&post.path), extract_anchors(&post.content));
    }
    for page in pages {
        anchors_by_route.insert(normalize_route(&page.path), extract_anchors(&page.content));
    }

    for post in posts {
        check_document(
            site,
            &post.source,
            &post.path,
            &post.content,
            &routes,
            &assets,
            &anchors_by_route,
            report,
        );
    }
    for page in pages {
        check_document(
            site,
            &page.source,
            &page.path,
            &page.content,
            &routes,
            &assets,
            &anchors_by_route,
            report,
        );
    }

    Ok(())
}

/// Every route the generator will emit
fn site_routes(site: &Site, posts: &[Post], pages: &[Page]) -> HashSet<String> {
    let root = site.config.root.trim_end_matches('/');
    let mut routes = HashSet::new();

    routes.insert(normalize_route(&format!("{}/", root)));
    routes.insert(normalize_route(&format!("{}/atom.xml", root)));
    routes.insert(normalize_route(&format!("{}/search.json", root)));
    routes.insert(normalize_route(&format!(
        "{}/{}/",
        root, site.config.archive_dir
    )));
    routes.insert(normalize_route(&format!("{}/{}/", root, site.config.tag_dir)));

    let total_pages = posts.len().div_ceil(site.config.per_page.max(1));
    for n in 2..=total_pages {
        routes.insert(normalize_route(&format!("{}/page/{}/", root, n)));
    }

    let mut tags = HashSet::new();
    for post in posts {
        routes.insert(normalize_route(&post.path));
        for tag in &post.tags {
            if !tag.trim().is_empty() {
                tags.insert(slug::slugify(tag));
            }
        }
    }
    for tag_slug in tags {
        routes.insert(normalize_route(&format!(
            "{}/{}/{}/",
            root, site.config.tag_dir, tag_slug
        )));
    }

    for page in pages {
        routes.insert(normalize_route(&page.path));
    }

    routes
}

/// Routes of non-markdown files that get copied through to the output
fn asset_routes(site: &Site) -> Result<HashSet<String>> {
    let root = site.config.root.trim_end_matches('/');
    let mut assets = HashSet::new();

    if !site.source_dir.exists() {
        return Ok(assets);
    }

    for entry in WalkDir::new(&site.source_dir)
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
        let relative = path.strip_prefix(&site.source_dir)?;
        if relative
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .map(|c| c.starts_with('_'))
            .unwrap_or(false)
        {
            continue;
        }
        assets.insert(format!("{}/{}", root, relative.to_string_lossy()));
    }

    Ok(assets)
}

#[allow(clippy::too_many_arguments)]
fn check_document(
    site: &Site,
    source: &str,
    doc_path: &str,
    html: &str,
    routes: &HashSet<String>,
    assets: &HashSet<String>,
    anchors_by_route: &HashMap<String, HashSet<String>>,
    report: &mut Report,
) {
    let own_anchors = extract_anchors(html);

    let base = site.config.url.trim_end_matches('/');

    for cap in LINK_ATTR.captures_iter(html) {
        let raw_target = &cap[1];
        if raw_target.is_empty() {
            continue;
        }

        let decoded = percent_decode_str(raw_target)
            .decode_utf8_lossy()
            .to_string();

        // Absolute URLs into our own site are checked like internal ones
        let target = match decoded.strip_prefix(base) {
            Some(rest) if !base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                if rest.is_empty() {
                    "/".to_string()
                } else {
                    rest.to_string()
                }
            }
            _ => decoded,
        };

        if is_external(&target) {
            continue;
        }

        // Fragment within the same document
        if let Some(frag) = target.strip_prefix('#') {
            if !own_anchors.contains(frag) {
                report.error(
                    source,
                    format!("broken fragment link: #{} has no matching anchor", frag),
                );
            }
            continue;
        }

        let (path_part, fragment) = match target.split_once('#') {
            Some((p, f)) => (p, Some(f)),
            None => (target.as_str(), None),
        };

        let resolved = if path_part.starts_with('/') {
            path_part.to_string()
        } else {
            resolve_relative(doc_path, path_part)
        };

        let normalized = normalize_route(&resolved);
        let known_route = routes.contains(&normalized);
        let known_asset = assets.contains(resolved.as_str());

        if !known_route && !known_asset {
            report.error(source, format!("broken link: {}", raw_target));
            continue;
        }

        if let (true, Some(frag)) = (known_route, fragment) {
            if let Some(anchors) = anchors_by_route.get(&normalized) {
                if !anchors.contains(frag) {
                    report.error(
                        source,
                        format!("broken fragment link: {}#{} has no matching anchor", path_part, frag),
                    );
                }
            }
        }
    }
}

/// Anchor ids present in a rendered document
fn extract_anchors(html: &str) -> HashSet<String> {
    ID_ATTR
        .captures_iter(html)
        .map(|cap| cap[1].to_string())
        .collect()
}

fn is_external(target: &str) -> bool {
    target.starts_with("http://")
        || target.starts_with("https://")
        || target.starts_with("//")
        || target.starts_with("mailto:")
        || target.starts_with("tel:")
        || target.starts_with("ftp:")
        || target.starts_with("data:")
}

/// Trailing-slash-insensitive route key
fn normalize_route(route: &str) -> String {
    let trimmed = route.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Resolve a relative target against the directory of a document route
fn resolve_relative(doc_path: &str, target: &str) -> String {
    let mut segments: Vec<&str> = doc_path
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    // doc_path names a directory-style route, so no file segment to pop

    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            p => segments.push(p),
        }
    }

    let joined = segments.join("/");
    let mut resolved = format!("/{}", joined);
    if target.ends_with('/') && !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved
}
