//! Site configuration

mod site;

pub use site::{HighlightOptions, SiteConfig};
