//! Incremental-generation cache
//!
//! Tracks content hashes per source file so an unchanged tree
//! regenerates nothing and a small edit regenerates only the pages it
//! touches. The whole theme ships inside the binary, so a crate version
//! bump invalidates everything.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Cache directory, relative to the site base directory
const CACHE_DIR: &str = ".inkpress-cache";

/// Cached state of one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content hash of the source file
    pub content_hash: u64,
    /// Output route
    pub output_path: String,
    /// Tags on this post (tag pages rebuild when these change)
    pub tags: Vec<String>,
}

/// Cache database for tracking file changes
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheDb {
    /// Version of the cache format
    pub version: u32,
    /// Crate version that wrote the cache (embedded templates change with it)
    pub generator: String,
    /// Hash of the site config
    pub config_hash: u64,
    /// Cached posts, keyed by source path
    pub posts: HashMap<String, CacheEntry>,
    /// Cached pages, keyed by source path
    pub pages: HashMap<String, CacheEntry>,
    /// Total post count
    pub post_count: usize,
}

impl CacheDb {
    /// Current cache format version
    const VERSION: u32 = 1;

    fn file_path(base_dir: &Path) -> std::path::PathBuf {
        base_dir.join(CACHE_DIR).join("db.json")
    }

    /// Load the cache from disk. Anything unreadable, unparsable, or
    /// written by a different format version starts the cache over.
    pub fn load(base_dir: &Path) -> Self {
        let parsed = fs::read_to_string(Self::file_path(base_dir))
            .ok()
            .and_then(|text| serde_json::from_str::<CacheDb>(&text).ok());

        match parsed {
            Some(cache) if cache.version == Self::VERSION => cache,
            Some(_) => {
                tracing::info!("Cache version mismatch, rebuilding cache");
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Save the cache to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = Self::file_path(base_dir);
        let dir = path.parent().context("cache path has no parent")?;
        fs::create_dir_all(dir)?;
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Fresh cache stamped with the current format and crate version
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            generator: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }

    /// Remove the cache directory
    pub fn clear(base_dir: &Path) -> Result<()> {
        let dir = base_dir.join(CACHE_DIR);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            tracing::info!("Cache cleared");
        }
        Ok(())
    }
}

/// Change detection result
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Posts that need regeneration (source path)
    pub changed_posts: Vec<String>,
    /// Pages that need regeneration (source path)
    pub changed_pages: Vec<String>,
    /// Posts that disappeared, with their old output route
    pub deleted_posts: Vec<(String, String)>,
    /// Pages that disappeared, with their old output route
    pub deleted_pages: Vec<(String, String)>,
    /// Whether index pages (and feed/search) need regeneration
    pub rebuild_index: bool,
    /// Whether the archive page needs regeneration
    pub rebuild_archives: bool,
    /// Which tag pages need regeneration
    pub rebuild_tags: RebuildScope,
    /// Whether to regenerate everything
    pub full_rebuild: bool,
}

/// Scope of a tag-page rebuild
#[derive(Debug, Clone)]
pub enum RebuildScope {
    None,
    Specific(Vec<String>),
    All,
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self {
            changed_posts: Vec::new(),
            changed_pages: Vec::new(),
            deleted_posts: Vec::new(),
            deleted_pages: Vec::new(),
            rebuild_index: false,
            rebuild_archives: false,
            rebuild_tags: RebuildScope::None,
            full_rebuild: false,
        }
    }
}

impl ChangeSet {
    /// A changeset demanding a full rebuild
    pub fn full_rebuild() -> Self {
        Self {
            rebuild_index: true,
            rebuild_archives: true,
            rebuild_tags: RebuildScope::All,
            full_rebuild: true,
            ..Default::default()
        }
    }

    /// Check if any changes were detected
    pub fn has_changes(&self) -> bool {
        if self.full_rebuild || self.rebuild_index || self.rebuild_archives {
            return true;
        }
        let counts = [
            self.changed_posts.len(),
            self.changed_pages.len(),
            self.deleted_posts.len(),
            self.deleted_pages.len(),
        ];
        counts.iter().any(|&n| n > 0) || !matches!(self.rebuild_tags, RebuildScope::None)
    }

    /// One-line description of the changes, for the log
    pub fn summary(&self) -> String {
        if self.full_rebuild {
            return "full rebuild required".to_string();
        }

        let mut parts = Vec::new();
        for (count, what) in [
            (self.changed_posts.len(), "post(s) changed"),
            (self.changed_pages.len(), "page(s) changed"),
            (self.deleted_posts.len(), "post(s) deleted"),
            (self.deleted_pages.len(), "page(s) deleted"),
        ] {
            if count > 0 {
                parts.push(format!("{} {}", count, what));
            }
        }
        if self.rebuild_index {
            parts.push("index pages".to_string());
        }
        if self.rebuild_archives {
            parts.push("archive page".to_string());
        }
        match &self.rebuild_tags {
            RebuildScope::None => {}
            RebuildScope::Specific(tags) => parts.push(format!("{} tag page(s)", tags.len())),
            RebuildScope::All => parts.push("all tag pages".to_string()),
        }

        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Hash file content
pub fn hash_content(content: &str) -> u64 {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Hash a file on disk
pub fn hash_file(path: &Path) -> Result<u64> {
    Ok(hash_content(&fs::read_to_string(path)?))
}

fn config_hash(base_dir: &Path) -> Result<u64> {
    let path = base_dir.join("_config.yml");
    if path.exists() {
        hash_file(&path)
    } else {
        Ok(0)
    }
}

/// Current state of a post, as the cache sees it
#[derive(Debug, Clone)]
pub struct PostState {
    pub source: String,
    pub hash: u64,
    pub output_path: String,
    pub tags: Vec<String>,
}

/// Current state of a page
#[derive(Debug, Clone)]
pub struct PageState {
    pub source: String,
    pub hash: u64,
    pub output_path: String,
}

/// Detect changes between the current tree and the cached state
pub fn detect_changes(
    cache: &CacheDb,
    base_dir: &Path,
    current_posts: &[PostState],
    current_pages: &[PageState],
) -> Result<ChangeSet> {
    if cache.generator != env!("CARGO_PKG_VERSION") {
        tracing::info!("Generator version changed, full rebuild required");
        return Ok(ChangeSet::full_rebuild());
    }

    if config_hash(base_dir)? != cache.config_hash {
        tracing::info!("Config changed, full rebuild required");
        return Ok(ChangeSet::full_rebuild());
    }

    let mut changeset = ChangeSet::default();
    let mut affected_tags: Vec<String> = Vec::new();

    for post in current_posts {
        let cached = cache.posts.get(&post.source);
        if cached.is_some_and(|c| c.content_hash == post.hash) {
            continue;
        }
        tracing::debug!("Post changed or new: {}", post.source);
        changeset.changed_posts.push(post.source.clone());
        affected_tags.extend(post.tags.iter().cloned());
        if let Some(cached) = cached {
            affected_tags.extend(cached.tags.iter().cloned());
        }
        changeset.rebuild_index = true;
        changeset.rebuild_archives = true;
    }

    let current_sources: HashSet<&str> =
        current_posts.iter().map(|p| p.source.as_str()).collect();
    for (source, cached) in &cache.posts {
        if current_sources.contains(source.as_str()) {
            continue;
        }
        tracing::debug!("Deleted post: {}", source);
        changeset
            .deleted_posts
            .push((source.clone(), cached.output_path.clone()));
        affected_tags.extend(cached.tags.iter().cloned());
        changeset.rebuild_index = true;
        changeset.rebuild_archives = true;
    }

    for page in current_pages {
        let unchanged = cache
            .pages
            .get(&page.source)
            .is_some_and(|c| c.content_hash == page.hash);
        if !unchanged {
            tracing::debug!("Page changed or new: {}", page.source);
            changeset.changed_pages.push(page.source.clone());
        }
    }

    let current_page_sources: HashSet<&str> =
        current_pages.iter().map(|p| p.source.as_str()).collect();
    for (source, cached) in &cache.pages {
        if !current_page_sources.contains(source.as_str()) {
            tracing::debug!("Deleted page: {}", source);
            changeset
                .deleted_pages
                .push((source.clone(), cached.output_path.clone()));
        }
    }

    if !affected_tags.is_empty() {
        affected_tags.sort();
        affected_tags.dedup();
        changeset.rebuild_tags = RebuildScope::Specific(affected_tags);
    }

    Ok(changeset)
}

/// Replace the cache contents with the current state
pub fn update_cache(
    cache: &mut CacheDb,
    base_dir: &Path,
    posts: &[PostState],
    pages: &[PageState],
) -> Result<()> {
    cache.version = CacheDb::VERSION;
    cache.generator = env!("CARGO_PKG_VERSION").to_string();
    cache.config_hash = config_hash(base_dir)?;

    cache.posts = posts
        .iter()
        .map(|p| {
            (
                p.source.clone(),
                CacheEntry {
                    content_hash: p.hash,
                    output_path: p.output_path.clone(),
                    tags: p.tags.clone(),
                },
            )
        })
        .collect();

    cache.pages = pages
        .iter()
        .map(|p| {
            (
                p.source.clone(),
                CacheEntry {
                    content_hash: p.hash,
                    output_path: p.output_path.clone(),
                    tags: Vec::new(),
                },
            )
        })
        .collect();

    cache.post_count = posts.len();

    Ok(())
}
