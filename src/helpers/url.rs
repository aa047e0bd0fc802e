//! URL helpers

use crate::config::SiteConfig;

/// Site-relative URL with the configured root prefix.
/// `url_for(&config, "css/style.css")` is `/blog/css/style.css` when
/// root is `/blog/`.
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let mut url = config.root.trim_end_matches('/').to_string();
    url.push('/');
    url.push_str(path.trim_start_matches('/'));
    url
}

/// Absolute URL including the site domain
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    format!(
        "{}{}",
        config.url.trim_end_matches('/'),
        url_for(config, path)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_root(root: &str) -> SiteConfig {
        SiteConfig {
            url: "https://example.com".to_string(),
            root: root.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_for() {
        let config = config_with_root("/");
        assert_eq!(url_for(&config, "/css/style.css"), "/css/style.css");
        assert_eq!(url_for(&config, ""), "/");
    }

    #[test]
    fn test_url_for_with_subpath_root() {
        let config = config_with_root("/blog/");
        assert_eq!(url_for(&config, "about/"), "/blog/about/");
    }

    #[test]
    fn test_full_url_for() {
        let config = config_with_root("/");
        assert_eq!(full_url_for(&config, "/atom.xml"), "https://example.com/atom.xml");
    }
}
