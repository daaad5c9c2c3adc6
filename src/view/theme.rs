//! HTML rendering of view models.
//!
//! [`TemplateEngine`] is the seam between page data and markup. The built-in
//! [`DefaultTheme`] fills embedded HTML skeletons; placeholders are `{name}`
//! tokens substituted in a single pass, so text coming from posts is never
//! re-scanned for placeholders.

use std::{borrow::Cow, fmt::Write, sync::Arc};

use anyhow::Result;
use quick_xml::escape::escape;

use crate::{
    post::{Post, TocItem, Verification},
    utils::date::ymd,
};

use super::{Pagination, SeriesSummary, TaxonomyKind, View, ViewModel, pages::taxonomy_url};

// ============================================================================
// Constants - HTML Templates
// ============================================================================

const BASE_TEMPLATE: &str = include_str!("../embed/theme/base.html");
const SINGLE_TEMPLATE: &str = include_str!("../embed/theme/single.html");
const LIST_TEMPLATE: &str = include_str!("../embed/theme/list.html");
const TAGS_TEMPLATE: &str = include_str!("../embed/theme/tags.html");

/// Renders a page model to a complete HTML document.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, view: &ViewModel) -> Result<String>;
}

/// Theme compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTheme;

impl TemplateEngine for DefaultTheme {
    fn render(&self, vm: &ViewModel) -> Result<String> {
        let main = match &vm.view {
            View::Home {
                recent,
                total_posts,
                series,
            } => render_home(vm, recent, *total_posts, series),
            View::List { posts, pagination } => {
                render_list(&vm.title, "", posts, pagination.as_ref(), "")
            }
            View::Single { post, series_posts } => render_single(post, series_posts),
            View::Taxonomy {
                kind,
                term,
                description,
                posts,
                pagination,
            } => {
                let intro = if description.is_empty() {
                    String::new()
                } else {
                    format!(r#"<p class="summary">{}</p>"#, escape(description.as_str()))
                };
                let heading = format!("{}: {term}", kind.label());
                render_list(&heading, &intro, posts, Some(pagination), "")
            }
            View::TagCloud { tags, series } => render_tag_cloud(tags, series),
        };

        let feed_link = vm
            .site
            .feed_url
            .as_deref()
            .map(|href| {
                format!(
                    r#"<link rel="alternate" type="application/rss+xml" title="{}" href="{}">"#,
                    escape(vm.site.title.as_str()),
                    escape(href)
                )
            })
            .unwrap_or_default();
        // only post pages have a stable absolute address
        let canonical = match &vm.view {
            View::Single { post, .. } if !vm.site.base_url.is_empty() => format!(
                r#"<link rel="canonical" href="{}">"#,
                escape(post.permalink(&vm.site.base_url).as_str())
            ),
            _ => String::new(),
        };
        let preview = if vm.build_mode {
            ""
        } else {
            r#"<p class="preview">preview</p>"#
        };
        let description = match &vm.view {
            View::Single { post, .. } if !post.description.is_empty() => post.description.as_str(),
            _ => vm.site.description.as_str(),
        };
        let title = if vm.title == vm.site.title || vm.site.title.is_empty() {
            vm.title.clone()
        } else {
            format!("{} | {}", vm.title, vm.site.title)
        };

        Ok(fill(
            BASE_TEMPLATE,
            &[
                ("lang", &*escape(vm.site.language.as_str())),
                ("version", env!("CARGO_PKG_VERSION")),
                ("description", &*escape(description)),
                ("title", &*escape(title.as_str())),
                ("feed_link", feed_link.as_str()),
                ("canonical", canonical.as_str()),
                ("kind", vm.kind().as_str()),
                ("site_title", &*escape(vm.site.title.as_str())),
                ("nav", &*render_nav(vm)),
                ("preview", preview),
                ("main", main.as_str()),
                ("author", &*escape(vm.site.author.as_str())),
            ],
        ))
    }
}

// ============================================================================
// Placeholder Substitution
// ============================================================================

/// Replace `{key}` tokens in one pass. Unknown `{...}` runs (CSS blocks) are
/// copied through untouched.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Fragments
// ============================================================================

fn render_nav(vm: &ViewModel) -> String {
    let section = vm.section();
    let mut links = vec![
        ("home", "/", "Home"),
        ("posts", "/posts/", "Posts"),
        ("tags", "/tags/", "Tags"),
    ];
    // the preview server always answers /feed.xml
    match vm.site.feed_url.as_deref() {
        Some(feed) => links.push(("feed", feed, "RSS")),
        None if !vm.build_mode => links.push(("feed", "/feed.xml", "RSS")),
        None => {}
    }

    links
        .into_iter()
        .map(|(name, href, label)| {
            let class = if name == section { r#" class="active""# } else { "" };
            format!(r#"<a href="{href}"{class}>{label}</a>"#)
        })
        .collect()
}

fn render_tags(post: &Post) -> String {
    let tags = post.distinct_tags();
    if tags.is_empty() {
        return String::new();
    }
    let links: String = tags
        .into_iter()
        .map(|tag| {
            format!(
                r##"<a href="{}">#{}</a>"##,
                taxonomy_url(TaxonomyKind::Tag, tag),
                escape(tag)
            )
        })
        .collect();
    format!(r#"<p class="tags">{links}</p>"#)
}

fn render_toc(items: &[TocItem]) -> String {
    fn walk(items: &[TocItem], out: &mut String) {
        out.push_str("<ul>");
        for item in items {
            let _ = write!(
                out,
                r##"<li><a href="#{}">{}</a>"##,
                escape(item.id.as_str()),
                escape(item.title.as_str())
            );
            if !item.children.is_empty() {
                walk(&item.children, out);
            }
            out.push_str("</li>");
        }
        out.push_str("</ul>");
    }

    if items.is_empty() {
        return String::new();
    }
    let mut out = String::from(r#"<nav class="toc">"#);
    walk(items, &mut out);
    out.push_str("</nav>");
    out
}

fn render_series_nav(post: &Post, series_posts: &[Arc<Post>]) -> String {
    if series_posts.is_empty() {
        return String::new();
    }
    let items: String = series_posts
        .iter()
        .map(|p| {
            if p.slug == post.slug {
                format!(r#"<li class="current">{}</li>"#, escape(p.title.as_str()))
            } else {
                format!(r#"<li><a href="{}">{}</a></li>"#, p.url_path(), escape(p.title.as_str()))
            }
        })
        .collect();
    format!(
        r#"<nav class="series-nav"><h2><a href="{}">{}</a></h2><ol>{items}</ol></nav>"#,
        taxonomy_url(TaxonomyKind::Series, &post.series),
        escape(post.series.as_str())
    )
}

fn render_verification(verification: Option<&Verification>) -> String {
    let Some(v) = verification.filter(|v| !v.content_hash.is_empty()) else {
        return String::new();
    };
    let author = if v.author.is_empty() {
        String::new()
    } else {
        format!(" · author <code>{}</code>", escape(v.author.as_str()))
    };
    format!(
        r#"<p class="meta verification">content hash <code>{}</code>{author}</p>"#,
        escape(v.content_hash.as_str())
    )
}

fn render_single(post: &Post, series_posts: &[Arc<Post>]) -> String {
    let series_label = if post.has_series() {
        format!(
            r#" · <a href="{}">{}</a>"#,
            taxonomy_url(TaxonomyKind::Series, &post.series),
            escape(post.series.as_str())
        )
    } else {
        String::new()
    };

    fill(
        SINGLE_TEMPLATE,
        &[
            ("title", &*escape(post.title.as_str())),
            ("date_iso", &*post.date.to_rfc3339()),
            ("date", &*ymd(&post.date)),
            ("reading_time", &*post.reading_time.to_string()),
            ("series_label", series_label.as_str()),
            ("tags", &*render_tags(post)),
            ("toc", &*render_toc(&post.toc)),
            ("content", post.content.as_str()),
            ("series_nav", &*render_series_nav(post, series_posts)),
            ("verification", &*render_verification(post.verification.as_ref())),
        ],
    )
}

fn render_item(post: &Post) -> String {
    let summary: Cow<'_, str> = if post.description.is_empty() {
        Cow::Borrowed("")
    } else {
        Cow::Owned(format!(
            r#"<p class="summary">{}</p>"#,
            escape(post.description.as_str())
        ))
    };
    format!(
        r#"<li><a href="{}">{}</a> <span class="meta"><time datetime="{}">{}</time> · {} min</span>{summary}</li>"#,
        post.url_path(),
        escape(post.title.as_str()),
        post.date.to_rfc3339(),
        ymd(&post.date),
        post.reading_time,
    )
}

fn render_pagination(pagination: &Pagination) -> String {
    if pagination.total_pages <= 1 {
        return String::new();
    }
    let prev = pagination
        .prev_url()
        .map(|url| format!(r#"<a rel="prev" href="{}">← Newer</a>"#, escape(url.as_str())))
        .unwrap_or_else(|| "<span></span>".into());
    let next = pagination
        .next_url()
        .map(|url| format!(r#"<a rel="next" href="{}">Older →</a>"#, escape(url.as_str())))
        .unwrap_or_else(|| "<span></span>".into());
    format!(
        r#"<nav class="pagination">{prev}<span>Page {} of {}</span>{next}</nav>"#,
        pagination.current, pagination.total_pages
    )
}

fn render_list(
    heading: &str,
    intro: &str,
    posts: &[Arc<Post>],
    pagination: Option<&Pagination>,
    extra: &str,
) -> String {
    let items: String = posts.iter().map(|p| render_item(p)).collect();
    let empty = if posts.is_empty() {
        r#"<p class="meta">No posts yet.</p>"#
    } else {
        ""
    };
    fill(
        LIST_TEMPLATE,
        &[
            ("heading", &*escape(heading)),
            ("intro", intro),
            ("items", items.as_str()),
            ("empty", empty),
            ("pagination", &*pagination.map(render_pagination).unwrap_or_default()),
            ("extra", extra),
        ],
    )
}

fn render_series_list(series: &[SeriesSummary]) -> String {
    series
        .iter()
        .map(|s| {
            let description = if s.description.is_empty() {
                String::new()
            } else {
                format!(" · {}", escape(s.description.as_str()))
            };
            format!(
                r#"<li><a href="{}">{}</a> <span class="meta">({}){description}</span></li>"#,
                s.url,
                escape(s.name.as_str()),
                s.count
            )
        })
        .collect()
}

fn render_home(
    vm: &ViewModel,
    recent: &[Arc<Post>],
    total: usize,
    series: &[SeriesSummary],
) -> String {
    let intro = if vm.site.description.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="summary">{}</p>"#, escape(vm.site.description.as_str()))
    };
    let mut extra = String::new();
    if total > recent.len() {
        let _ = write!(extra, r#"<p><a href="/posts/">All {total} posts →</a></p>"#);
    }
    if !series.is_empty() {
        let _ = write!(
            extra,
            r#"<h2>Series</h2><ul class="series">{}</ul>"#,
            render_series_list(series)
        );
    }
    render_list(&vm.title, &intro, recent, None, &extra)
}

fn render_tag_cloud(tags: &[(String, usize)], series: &[SeriesSummary]) -> String {
    let tags: String = tags
        .iter()
        .map(|(tag, count)| {
            format!(
                r#"<li><a href="{}">{}</a> <span class="meta">({count})</span></li>"#,
                taxonomy_url(TaxonomyKind::Tag, tag),
                escape(tag.as_str())
            )
        })
        .collect();
    fill(
        TAGS_TEMPLATE,
        &[("tags", tags.as_str()), ("series", &*render_series_list(series))],
    )
}

// ============================================================================
// Tests
// ============================================================================
