//! Helper functions shared by the generator, templates, and checks

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;
