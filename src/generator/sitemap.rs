//! Sitemap generation.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/posts/hello/</loc>
//!     <lastmod>2025-01-01</lastmod>
//!     <changefreq>monthly</changefreq>
//!     <priority>0.7</priority>
//!   </url>
//! </urlset>
//! ```
//!
//! Entries: home, the post listing, the tag cloud, then every published
//! post newest first.

use std::fmt::Write;

use anyhow::Result;
use quick_xml::escape::escape;

use crate::{
    config::SiteConfig,
    log,
    store::ContentStore,
    utils::{
        date::ymd,
        minify::{MinifyType, minify},
        output::write_file,
    },
};

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

// ============================================================================
// Public API
// ============================================================================

/// Build sitemap if enabled in config.
pub fn build_sitemap(config: &SiteConfig, store: &ContentStore) -> Result<()> {
    if !config.build.sitemap.enable {
        return Ok(());
    }

    let xml = Sitemap::from_store(config, store).into_xml();
    let xml = minify(MinifyType::Xml(xml.as_bytes()), config);
    let sitemap_path = config.build.output.join(&config.build.sitemap.path);
    write_file(&sitemap_path, &xml)?;

    log!("sitemap"; "{}", sitemap_path.file_name().unwrap_or_default().to_string_lossy());
    Ok(())
}

// ============================================================================
// Sitemap Implementation
// ============================================================================

struct Sitemap {
    urls: Vec<UrlEntry>,
}

struct UrlEntry {
    loc: String,
    /// `YYYY-MM-DD`
    lastmod: Option<String>,
    changefreq: &'static str,
    priority: &'static str,
}

impl UrlEntry {
    fn new(loc: String, changefreq: &'static str, priority: &'static str) -> Self {
        Self {
            loc,
            lastmod: None,
            changefreq,
            priority,
        }
    }
}

impl Sitemap {
    fn from_store(config: &SiteConfig, store: &ContentStore) -> Self {
        let base = config.base_url();
        let mut urls = vec![
            UrlEntry::new(format!("{base}/"), "daily", "1.0"),
            UrlEntry::new(format!("{base}/posts/"), "daily", "0.9"),
            UrlEntry::new(format!("{base}/tags/"), "weekly", "0.8"),
        ];
        urls.extend(store.list().iter().filter(|post| !post.draft).map(|post| UrlEntry {
            lastmod: Some(ymd(&post.date)),
            ..UrlEntry::new(post.permalink(base), "monthly", "0.7")
        }));
        Self { urls }
    }

    fn into_xml(self) -> String {
        let mut xml = String::with_capacity(256 + self.urls.len() * 160);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        let _ = writeln!(xml, r#"<urlset xmlns="{SITEMAP_NS}">"#);

        for entry in self.urls {
            xml.push_str("  <url>\n");
            let _ = writeln!(xml, "    <loc>{}</loc>", escape(entry.loc.as_str()));
            if let Some(lastmod) = entry.lastmod {
                let _ = writeln!(xml, "    <lastmod>{lastmod}</lastmod>");
            }
            let _ = writeln!(xml, "    <changefreq>{}</changefreq>", entry.changefreq);
            let _ = writeln!(xml, "    <priority>{}</priority>", entry.priority);
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }
}

// ============================================================================
// Tests
// ============================================================================
