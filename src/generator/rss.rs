//! RSS 2.0 feed generation.
//!
//! The feed carries the newest [`FEED_ITEMS`] published posts. Its
//! `lastBuildDate` is the newest post date, never the wall clock, so an
//! unchanged site yields an unchanged feed.

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};

use crate::{
    config::SiteConfig,
    log,
    post::Post,
    store::ContentStore,
    utils::{
        date::rfc2822,
        minify::{MinifyType, minify},
        output::write_file,
    },
};

/// Posts included in the feed.
pub const FEED_ITEMS: usize = 10;

// ============================================================================
// Public API
// ============================================================================

/// Write the feed into the output directory if enabled in config.
pub fn build_rss(config: &SiteConfig, store: &ContentStore) -> Result<()> {
    if !config.build.rss.enable {
        return Ok(());
    }

    let xml = feed_xml(config, store)?;
    let xml = minify(MinifyType::Xml(xml.as_bytes()), config);
    let rss_path = config.build.output.join(&config.build.rss.path);
    write_file(&rss_path, &xml)?;

    log!("rss"; "{}", rss_path.file_name().unwrap_or_default().to_string_lossy());
    Ok(())
}

/// Render the feed for the current store contents.
pub fn feed_xml(config: &SiteConfig, store: &ContentStore) -> Result<String> {
    let posts: Vec<_> = store
        .list()
        .into_iter()
        .filter(|post| !post.draft)
        .take(FEED_ITEMS)
        .collect();

    let base = config.base_url();
    let author = rss_author(config);
    let items: Vec<_> = posts
        .iter()
        .map(|post| post_to_item(post, base, author.clone()))
        .collect();

    let channel = ChannelBuilder::default()
        .title(config.base.title.clone())
        .link(format!("{base}/"))
        .description(config.base.description.clone())
        .language(config.base.language.clone())
        .last_build_date(posts.first().map(|post| rfc2822(&post.date)))
        .generator("stars".to_string())
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("rss validation failed: {e}"))?;
    Ok(channel.to_string())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn post_to_item(post: &Post, base: &str, author: Option<String>) -> rss::Item {
    let link = post.permalink(base);
    ItemBuilder::default()
        .title(post.title.clone())
        .link(link.clone())
        .guid(GuidBuilder::default().permalink(true).value(link).build())
        .description(post.description.clone())
        .pub_date(rfc2822(&post.date))
        .author(author)
        .build()
}

/// Feed author in RSS form: `email@example.com (Name)`.
///
/// Uses `base.author` as is when it already has that form, otherwise joins
/// `base.email` and `base.author`. `None` without an email.
fn rss_author(config: &SiteConfig) -> Option<String> {
    static RE_VALID_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}[ \t]*\([^)]+\)$")
            .expect("static regex")
    });

    let author = &config.base.author;
    if RE_VALID_AUTHOR.is_match(author) {
        return Some(author.clone());
    }
    if config.base.email.is_empty() {
        return None;
    }
    Some(format!("{} ({author})", config.base.email))
}
