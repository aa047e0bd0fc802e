//! Generate static files

use anyhow::Result;
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use std::fs;
use std::time::Duration;

use crate::cache::{self, CacheDb, ChangeSet, PageState, PostState};
use crate::content::ContentLoader;
use crate::generator::Generator;
use crate::Site;

/// Generate the static site (with incremental support)
pub fn run(site: &Site) -> Result<()> {
    run_with_options(site, false)
}

/// Generate with force option
pub fn run_with_options(site: &Site, force: bool) -> Result<()> {
    let start = std::time::Instant::now();

    let loader = ContentLoader::new(site);
    let posts = loader.load_posts()?;
    let pages = loader.load_pages()?;

    tracing::info!("Loaded {} posts and {} pages", posts.len(), pages.len());

    let cache = CacheDb::load(&site.base_dir);

    let current_posts: Vec<PostState> = posts
        .iter()
        .map(|p| {
            Ok(PostState {
                source: p.source.clone(),
                hash: cache::hash_file(&p.full_source)?,
                output_path: p.path.clone(),
                tags: p.tags.clone(),
            })
        })
        .collect::<Result<_>>()?;

    let current_pages: Vec<PageState> = pages
        .iter()
        .map(|p| {
            Ok(PageState {
                source: p.source.clone(),
                hash: cache::hash_file(&p.full_source)?,
                output_path: p.path.clone(),
            })
        })
        .collect::<Result<_>>()?;

    let changeset = if force || cache.post_count == 0 {
        tracing::info!(
            "Full generation (force={}, cache_empty={})",
            force,
            cache.post_count == 0
        );
        ChangeSet::full_rebuild()
    } else {
        cache::detect_changes(&cache, &site.base_dir, &current_posts, &current_pages)?
    };

    if !changeset.has_changes() {
        tracing::info!(
            "No changes detected, completed in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        return Ok(());
    }

    tracing::info!("Changes detected: {}", changeset.summary());

    remove_deleted_outputs(site, &changeset)?;

    let generator = Generator::new(site)?;
    if changeset.full_rebuild {
        generator.generate(&posts, &pages)?;
    } else {
        generator.generate_incremental(&posts, &pages, &changeset)?;
    }

    let mut new_cache = CacheDb::new();
    cache::update_cache(&mut new_cache, &site.base_dir, &current_posts, &current_pages)?;
    new_cache.save(&site.base_dir)?;

    tracing::info!("Generated in {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}

/// Delete output directories whose sources disappeared
fn remove_deleted_outputs(site: &Site, changeset: &ChangeSet) -> Result<()> {
    let root = site.config.root.trim_end_matches('/');

    for (source, route) in changeset
        .deleted_posts
        .iter()
        .chain(changeset.deleted_pages.iter())
    {
        let clean = route
            .strip_prefix(root)
            .unwrap_or(route)
            .trim_start_matches('/');
        if clean.is_empty() {
            continue;
        }
        let dir = site.public_dir.join(clean);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            tracing::info!("Removed output for deleted source {}", source);
        }
    }

    Ok(())
}

/// Watch for file changes and regenerate
pub async fn watch(site: &Site) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    if site.source_dir.exists() {
        debouncer
            .watcher()
            .watch(&site.source_dir, RecursiveMode::Recursive)?;
    }

    let config_path = site.base_dir.join("_config.yml");
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
    }

    tracing::info!("Watching for changes (incremental mode). Press Ctrl+C to stop.");

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant = events.iter().any(|e| {
                    let path = e.path.to_string_lossy();
                    !path.contains(".git") && !path.contains(".DS_Store") && !path.ends_with('~')
                });
                if !relevant {
                    continue;
                }

                tracing::info!("File changed, regenerating...");
                if let Err(e) = run(site) {
                    tracing::error!("Generation failed: {}", e);
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(_) => break,
        }
    }

    Ok(())
}
