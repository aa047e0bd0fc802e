//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

/// Default `_config.yml` written by `init`
const DEFAULT_CONFIG: &str = "\
# Site identity
title: My Blog
subtitle: ''
description: ''
author: ''
language: en

# Addressing
url: http://example.com
root: /
permalink: :year/:month/:day/:title/

# Layout on disk
source_dir: source
public_dir: public
tag_dir: tags
archive_dir: archives

# Authoring
new_post_name: :title.md
default_layout: post
render_drafts: false
future: true
excerpt_separator: '<!-- more -->'
highlight:
  theme: base16-ocean.dark
  line_number: true

# Date format shown on pages
date_format: YYYY-MM-DD

per_page: 10
";

const SCAFFOLDS: [(&str, &str); 3] = [
    (
        "post.md",
        "---\ntitle: {{ title }}\ndate: {{ date }}\ntags:\n---\n",
    ),
    ("page.md", "---\ntitle: {{ title }}\n---\n"),
    (
        "draft.md",
        "---\ntitle: {{ title }}\ndraft: true\n---\n",
    ),
];

const SAMPLE_POST: &str = r#"---
title: Hello World
date: {{ date }}
excerpt: The first post on a brand-new site.
tags:
  - meta
---

Welcome! This post was created by `inkpress init`.

## Writing

Posts live in `source/_posts` as Markdown files with YAML front matter.
Run `inkpress generate` to build the site and `inkpress server` to
preview it with live reload.

```rust
fn main() {
    println!("code blocks are highlighted");
}
```
"#;

/// Write the site skeleton. Existing files are left alone, so running
/// `init` in a populated directory is safe.
pub fn init_site(target_dir: &Path) -> Result<()> {
    for dir in ["source/_posts", "source/_drafts", "scaffolds"] {
        fs::create_dir_all(target_dir.join(dir))?;
    }

    let config_path = target_dir.join("_config.yml");
    if !config_path.exists() {
        fs::write(&config_path, DEFAULT_CONFIG)?;
    }

    for (name, body) in SCAFFOLDS {
        let path = target_dir.join("scaffolds").join(name);
        if !path.exists() {
            fs::write(&path, body)?;
        }
    }

    let sample = target_dir.join("source/_posts/hello-world.md");
    if !sample.exists() {
        let date = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        fs::write(&sample, SAMPLE_POST.replace("{{ date }}", &date))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Site;

    #[test]
    fn test_init_creates_usable_site() {
        let dir = tempfile::tempdir().unwrap();
        init_site(dir.path()).unwrap();

        assert!(dir.path().join("_config.yml").exists());
        assert!(dir.path().join("scaffolds/post.md").exists());
        assert!(dir.path().join("source/_posts/hello-world.md").exists());

        // The freshly initialized site generates without errors
        let site = Site::open(dir.path()).unwrap();
        site.generate().unwrap();
        assert!(site.public_dir.join("index.html").exists());
    }

    #[test]
    fn test_init_preserves_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("_config.yml"), "title: Keep Me\n").unwrap();

        init_site(dir.path()).unwrap();
        let config = fs::read_to_string(dir.path().join("_config.yml")).unwrap();
        assert_eq!(config, "title: Keep Me\n");
    }
}
