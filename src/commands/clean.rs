//! Clean the public directory and cache

use anyhow::Result;
use std::fs;

use crate::cache::CacheDb;
use crate::Site;

/// Clean the public directory and the incremental cache
pub fn run(site: &Site) -> Result<()> {
    if site.public_dir.exists() {
        fs::remove_dir_all(&site.public_dir)?;
        tracing::info!("Deleted: {:?}", site.public_dir);
    }

    CacheDb::clear(&site.base_dir)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_output_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("source/_posts")).unwrap();
        fs::write(
            dir.path().join("source/_posts/p.md"),
            "---\ntitle: P\ndate: 2024-01-15\n---\n\nBody.\n",
        )
        .unwrap();

        let site = Site::open(dir.path()).unwrap();
        site.generate().unwrap();
        assert!(site.public_dir.exists());
        assert!(dir.path().join(".inkpress-cache").exists());

        run(&site).unwrap();
        assert!(!site.public_dir.exists());
        assert!(!dir.path().join(".inkpress-cache").exists());
    }
}
