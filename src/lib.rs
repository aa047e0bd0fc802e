//! inkpress: a static blog generator with built-in content-integrity checks
//!
//! This crate turns a directory of Markdown documents with YAML front
//! matter into a static site rendered through embedded Tera templates,
//! and lints the content for the problems a publishing pipeline cares
//! about (malformed front matter, colliding routes, dead links).

pub mod cache;
pub mod check;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

use config::SiteConfig;

/// A blog site rooted at a directory on disk
#[derive(Clone)]
pub struct Site {
    /// Site configuration
    pub config: SiteConfig,
    /// Base directory (contains `_config.yml`)
    pub base_dir: PathBuf,
    /// Source directory holding posts and pages
    pub source_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Site {
    /// Open a site from a directory, loading `_config.yml` when present
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config = SiteConfig::from_dir(&base_dir)?;

        Ok(Self {
            source_dir: base_dir.join(&config.source_dir),
            public_dir: base_dir.join(&config.public_dir),
            config,
            base_dir,
        })
    }

    /// Directory holding the dated posts
    pub fn posts_dir(&self) -> PathBuf {
        self.source_dir.join("_posts")
    }

    /// Generate the static site
    pub fn generate(&self) -> Result<()> {
        commands::generate::run(self)
    }

    /// Run the content-integrity checks, returning the report
    pub fn check(&self) -> Result<check::Report> {
        check::run(self)
    }

    /// Clean the public directory and cache
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }

    /// Create a new post
    pub fn new_post(&self, title: &str, layout: Option<&str>) -> Result<()> {
        commands::new::run(self, title, layout)
    }
}
