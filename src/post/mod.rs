//! Posts: data types, markdown rendering, parsing and content hashing.

pub mod frontmatter;
mod hash;
pub mod parser;
pub mod render;
pub mod types;

pub use parser::DocumentParser;
pub use render::CmarkRenderer;
pub use types::{Post, TocItem, Verification};
