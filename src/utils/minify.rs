//! Minification utilities for HTML and XML.
//!
//! Provides a unified `minify` function that handles both HTML and XML,
//! with automatic enable/disable based on `SiteConfig`.

use crate::config::SiteConfig;
use std::borrow::Cow;

// ============================================================================
// Types
// ============================================================================

/// Content type for minification.
pub enum MinifyType<'a> {
    /// HTML content
    Html(&'a [u8]),
    /// XML content
    Xml(&'a [u8]),
}

// ============================================================================
// Unified Minify Function
// ============================================================================

/// Minify content based on type and config.
///
/// Returns `Cow::Borrowed` if minify disabled, `Cow::Owned` if minified.
pub fn minify<'a>(content: MinifyType<'a>, config: &SiteConfig) -> Cow<'a, [u8]> {
    match (content, config.build.minify) {
        (MinifyType::Html(html), false) | (MinifyType::Xml(html), false) => Cow::Borrowed(html),
        (MinifyType::Html(html), true) => Cow::Owned(minify_html_inner(html)),
        (MinifyType::Xml(xml), true) => Cow::Owned(minify_xml_inner(xml)),
    }
}

// ============================================================================
// Internal Implementation
// ============================================================================

/// Minify HTML content using `minify_html` crate.
fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = false;
    minify_html::minify(html, &cfg)
}

/// Minify XML by dropping indentation between elements.
///
/// Only lines that start with `<` are joined, so multi-line text inside
/// an element (post descriptions in the feed) keeps its line breaks.
fn minify_xml_inner(xml: &[u8]) -> Vec<u8> {
    let xml_str = String::from_utf8_lossy(xml);
    let mut out = String::with_capacity(xml_str.len());

    for line in xml_str.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('<') {
            out.push_str(trimmed);
        } else {
            if !out.is_empty() && !out.ends_with('>') {
                out.push('\n');
            }
            out.push_str(line);
        }
    }

    out.into_bytes()
}

// ============================================================================
// Tests
// ============================================================================
