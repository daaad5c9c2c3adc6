//! Machine-readable outputs: RSS feed and sitemap.

pub mod rss;
pub mod sitemap;
