//! View-model builders shared by the build and the preview server.
//!
//! Each builder reads the store once per query and returns a complete
//! [`ViewModel`]. Builders return `None` for pages that do not exist (unknown
//! terms, page numbers past the end), which the server maps to 404 and the
//! build never asks for.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    config::SiteConfig,
    error::ContentResult,
    post::Post,
    store::{ContentStore, PAGE_SIZE, Paged, total_pages},
    utils::slug::taxonomy_dir,
};

use super::{PageLinks, Pagination, SeriesSummary, SiteInfo, TaxonomyKind, View, ViewModel};

/// Site-relative URL of page 1 of a taxonomy term.
pub fn taxonomy_url(kind: TaxonomyKind, term: &str) -> String {
    format!(
        "/{}/{}/",
        kind.section(),
        urlencoding::encode(&taxonomy_dir(term))
    )
}

/// Page 1 always exists, even for an empty listing.
fn page_exists(page: usize, total: usize) -> bool {
    page >= 1 && page <= total_pages(total, PAGE_SIZE).max(1)
}

fn paged_title(title: &str, page: usize) -> String {
    if page > 1 {
        format!("{title} · Page {page}")
    } else {
        title.to_owned()
    }
}

pub struct PageBuilder<'a> {
    store: &'a ContentStore,
    config: &'a SiteConfig,
    site: Arc<SiteInfo>,
    build_mode: bool,
}

impl<'a> PageBuilder<'a> {
    pub fn new(store: &'a ContentStore, config: &'a SiteConfig, build_mode: bool) -> Self {
        Self {
            store,
            config,
            site: Arc::new(SiteInfo::from_config(config)),
            build_mode,
        }
    }

    fn model(&self, title: impl Into<String>, view: View) -> ViewModel {
        ViewModel {
            title: title.into(),
            site: Arc::clone(&self.site),
            build_mode: self.build_mode,
            view,
        }
    }

    pub fn home(&self) -> ViewModel {
        let Paged { items, total } = self.store.list_paged(1, PAGE_SIZE);
        let view = View::Home {
            recent: items,
            total_posts: total,
            series: self.series_summaries(),
        };
        self.model(self.site.title.clone(), view)
    }

    /// Every post on one page.
    pub fn post_list(&self) -> ViewModel {
        let view = View::List {
            posts: self.store.list(),
            pagination: None,
        };
        self.model("Posts", view)
    }

    /// One page of the chronological listing.
    pub fn post_list_page(&self, page: usize) -> Option<ViewModel> {
        let Paged { items, total } = self.store.list_paged(page, PAGE_SIZE);
        if !page_exists(page, total) {
            return None;
        }
        let view = View::List {
            posts: items,
            pagination: Some(Pagination::new(page, PAGE_SIZE, total, "/posts/")),
        };
        Some(self.model(paged_title("Posts", page), view))
    }

    /// Listing filtered by tag and/or series (server `?tag=&series=` form).
    pub fn filtered_list(
        &self,
        tag: Option<&str>,
        series: Option<&str>,
        page: usize,
    ) -> Option<ViewModel> {
        let (paged, base, title) = match (tag, series) {
            (None, None) => return self.post_list_page(page),
            (Some(tag), Some(series)) => (
                self.store.list_by_tag_and_series(tag, series, page, PAGE_SIZE),
                format!(
                    "/posts?tag={}&series={}",
                    urlencoding::encode(tag),
                    urlencoding::encode(series)
                ),
                format!("Posts tagged {tag} in {series}"),
            ),
            (Some(tag), None) => (
                self.store.list_by_tag(tag, page, PAGE_SIZE),
                format!("/posts?tag={}", urlencoding::encode(tag)),
                format!("Posts tagged {tag}"),
            ),
            (None, Some(series)) => (
                self.store.list_by_series(series, page, PAGE_SIZE),
                format!("/posts?series={}", urlencoding::encode(series)),
                format!("Posts in {series}"),
            ),
        };

        if !page_exists(page, paged.total) {
            return None;
        }
        let pagination =
            Pagination::new(page, PAGE_SIZE, paged.total, base).with_links(PageLinks::Query);
        let view = View::List {
            posts: paged.items,
            pagination: Some(pagination),
        };
        Some(self.model(paged_title(&title, page), view))
    }

    pub fn single(&self, slug: &str) -> ContentResult<ViewModel> {
        let post = self.store.get(slug)?;
        Ok(self.single_for(post))
    }

    /// Single page for a post already fetched from the store.
    pub fn single_for(&self, post: Arc<Post>) -> ViewModel {
        let series_posts = if post.has_series() {
            self.store.series_posts(&post.series)
        } else {
            Vec::new()
        };
        let title = post.title.clone();
        self.model(title, View::Single { post, series_posts })
    }

    /// One page of a tag or series listing.
    ///
    /// Declared series exist even with zero posts; any other term without
    /// posts does not.
    pub fn taxonomy(&self, kind: TaxonomyKind, term: &str, page: usize) -> Option<ViewModel> {
        let paged = match kind {
            TaxonomyKind::Tag => self.store.list_by_tag(term, page, PAGE_SIZE),
            TaxonomyKind::Series => self.store.list_by_series(term, page, PAGE_SIZE),
        };
        let declared = self.config.series_info(term).filter(|_| kind == TaxonomyKind::Series);

        if paged.total == 0 && declared.is_none() {
            return None;
        }
        if !page_exists(page, paged.total) {
            return None;
        }

        let view = View::Taxonomy {
            kind,
            term: term.to_owned(),
            description: declared.map(|s| s.description.clone()).unwrap_or_default(),
            posts: paged.items,
            pagination: Pagination::new(page, PAGE_SIZE, paged.total, taxonomy_url(kind, term)),
        };
        let title = format!("{}: {term}", kind.label());
        Some(self.model(paged_title(&title, page), view))
    }

    pub fn tag_cloud(&self) -> ViewModel {
        let view = View::TagCloud {
            tags: self.store.tags_stats().into_iter().collect(),
            series: self.series_summaries(),
        };
        self.model("Tags", view)
    }

    /// Declared series in configured order, then undeclared ones by name.
    pub fn series_summaries(&self) -> Vec<SeriesSummary> {
        let mut stats = self.store.series_stats();
        let summary = |name: &str, description: &str, count: usize| SeriesSummary {
            name: name.to_owned(),
            description: description.to_owned(),
            count,
            url: taxonomy_url(TaxonomyKind::Series, name),
        };

        let mut out: Vec<_> = self
            .config
            .declared_series()
            .into_iter()
            .map(|s| summary(&s.name, &s.description, stats.remove(&s.name).unwrap_or(0)))
            .collect();
        out.extend(stats.iter().map(|(name, count)| summary(name, "", *count)));
        out
    }

    /// Every term with a listing page, sorted.
    pub fn taxonomy_terms(&self, kind: TaxonomyKind) -> Vec<String> {
        match kind {
            TaxonomyKind::Tag => self.store.all_tags(),
            TaxonomyKind::Series => {
                let mut names: BTreeSet<String> = self.store.series_stats().into_keys().collect();
                names.extend(self.config.series.iter().map(|s| s.name.clone()));
                names.into_iter().collect()
            }
        }
    }

    /// Map a URL path segment back to a term: exact match first, then the
    /// hyphenated directory form.
    pub fn resolve_term(&self, kind: TaxonomyKind, segment: &str) -> Option<String> {
        let terms = self.taxonomy_terms(kind);
        terms
            .iter()
            .find(|term| *term == segment)
            .or_else(|| terms.iter().find(|term| taxonomy_dir(term) == segment))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SeriesConfig, utils::date::parse_date};

    fn post(slug: &str, day: u32, tags: &[&str], series: &str, order: i64) -> Post {
        Post {
            slug: slug.into(),
            title: slug.to_uppercase(),
            date: parse_date(&format!("2024-03-{day:02}")).unwrap(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            series: series.into(),
            series_order: order,
            raw_content: "body".into(),
            ..Default::default()
        }
    }

    fn fixture() -> (ContentStore, SiteConfig) {
        let store = ContentStore::new();
        for day in 1..=7 {
            store.add(post(&format!("go-{day}"), day, &["go"], "", 0)).unwrap();
        }
        store.add(post("intro", 10, &["rust lang"], "Rust Basics", 1)).unwrap();
        store.add(post("borrowing", 11, &["rust lang"], "Rust Basics", 2)).unwrap();

        let mut config = SiteConfig::default();
        config.base.title = "Blog".into();
        config.series = vec![
            SeriesConfig {
                name: "Rust Basics".into(),
                description: "Ownership".into(),
                order: 2,
            },
            SeriesConfig {
                name: "Coming Soon".into(),
                description: String::new(),
                order: 1,
            },
        ];
        (store, config)
    }

    fn slugs(posts: &[Arc<Post>]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_home_shows_first_page() {
        let (store, config) = fixture();
        let vm = PageBuilder::new(&store, &config, true).home();

        assert_eq!(vm.title, "Blog");
        let View::Home { recent, total_posts, series } = vm.view else {
            panic!("expected home view");
        };
        assert_eq!(recent.len(), PAGE_SIZE);
        assert_eq!(recent[0].slug, "borrowing");
        assert_eq!(total_posts, 9);
        let names: Vec<_> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Coming Soon", "Rust Basics"]);
        assert_eq!(series[1].count, 2);
        assert_eq!(series[1].url, "/series/Rust-Basics/");
    }

    #[test]
    fn test_post_list_pages() {
        let (store, config) = fixture();
        let pages = PageBuilder::new(&store, &config, true);

        let View::List { posts, pagination } = pages.post_list().view else {
            panic!("expected list view");
        };
        assert_eq!(posts.len(), 9);
        assert!(pagination.is_none());

        let vm = pages.post_list_page(2).unwrap();
        assert_eq!(vm.title, "Posts · Page 2");
        let View::List { posts, pagination: Some(p) } = vm.view else {
            panic!("expected paginated list");
        };
        assert_eq!(slugs(&posts), ["go-3", "go-2", "go-1"]);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.prev_url().as_deref(), Some("/posts/"));

        assert!(pages.post_list_page(3).is_none());
        assert!(pages.post_list_page(0).is_none());
    }

    #[test]
    fn test_empty_store_has_first_page() {
        let store = ContentStore::new();
        let config = SiteConfig::default();
        let pages = PageBuilder::new(&store, &config, true);

        assert!(pages.post_list_page(1).is_some());
        assert!(pages.post_list_page(2).is_none());
    }

    #[test]
    fn test_tag_pages() {
        let (store, config) = fixture();
        let pages = PageBuilder::new(&store, &config, true);

        let View::Taxonomy { posts, pagination, .. } =
            pages.taxonomy(TaxonomyKind::Tag, "go", 1).unwrap().view
        else {
            panic!("expected taxonomy view");
        };
        assert_eq!(posts.len(), 6);
        assert_eq!(pagination.next_url().as_deref(), Some("/tags/go/page/2/"));

        let View::Taxonomy { posts, .. } = pages.taxonomy(TaxonomyKind::Tag, "go", 2).unwrap().view
        else {
            panic!("expected taxonomy view");
        };
        assert_eq!(slugs(&posts), ["go-1"]);

        assert!(pages.taxonomy(TaxonomyKind::Tag, "go", 3).is_none());
        assert!(pages.taxonomy(TaxonomyKind::Tag, "missing", 1).is_none());
    }

    #[test]
    fn test_series_pages() {
        let (store, config) = fixture();
        let pages = PageBuilder::new(&store, &config, true);

        let vm = pages.taxonomy(TaxonomyKind::Series, "Rust Basics", 1).unwrap();
        assert_eq!(vm.title, "Series: Rust Basics");
        assert_eq!(vm.section(), "series");
        let View::Taxonomy { posts, description, .. } = vm.view else {
            panic!("expected taxonomy view");
        };
        assert_eq!(slugs(&posts), ["intro", "borrowing"]);
        assert_eq!(description, "Ownership");

        // declared, no posts yet
        let View::Taxonomy { posts, pagination, .. } =
            pages.taxonomy(TaxonomyKind::Series, "Coming Soon", 1).unwrap().view
        else {
            panic!("expected taxonomy view");
        };
        assert!(posts.is_empty());
        assert_eq!(pagination.total_posts, 0);

        assert!(pages.taxonomy(TaxonomyKind::Series, "Undeclared", 1).is_none());
    }

    #[test]
    fn test_single_with_series_navigation() {
        let (store, config) = fixture();
        let pages = PageBuilder::new(&store, &config, false);

        let vm = pages.single("borrowing").unwrap();
        assert!(!vm.build_mode);
        let View::Single { post, series_posts } = vm.view else {
            panic!("expected single view");
        };
        assert_eq!(post.title, "BORROWING");
        assert_eq!(slugs(&series_posts), ["intro", "borrowing"]);

        let View::Single { series_posts, .. } = pages.single("go-1").unwrap().view else {
            panic!("expected single view");
        };
        assert!(series_posts.is_empty());

        assert!(pages.single("nope").is_err());
    }

    #[test]
    fn test_filtered_list() {
        let (store, config) = fixture();
        let pages = PageBuilder::new(&store, &config, false);

        let View::List { posts, pagination: Some(p) } =
            pages.filtered_list(Some("go"), None, 1).unwrap().view
        else {
            panic!("expected list view");
        };
        assert_eq!(posts.len(), 6);
        assert_eq!(p.next_url().as_deref(), Some("/posts?tag=go&page=2"));

        let View::List { posts, .. } = pages
            .filtered_list(Some("rust lang"), Some("Rust Basics"), 1)
            .unwrap()
            .view
        else {
            panic!("expected list view");
        };
        assert_eq!(slugs(&posts), ["borrowing", "intro"]);

        assert!(pages.filtered_list(Some("go"), None, 3).is_none());
    }

    #[test]
    fn test_resolve_term() {
        let (store, config) = fixture();
        let pages = PageBuilder::new(&store, &config, false);

        assert_eq!(pages.resolve_term(TaxonomyKind::Tag, "go").as_deref(), Some("go"));
        assert_eq!(
            pages.resolve_term(TaxonomyKind::Tag, "rust-lang").as_deref(),
            Some("rust lang")
        );
        assert_eq!(
            pages.resolve_term(TaxonomyKind::Series, "Coming-Soon").as_deref(),
            Some("Coming Soon")
        );
        assert!(pages.resolve_term(TaxonomyKind::Tag, "python").is_none());
    }

    #[test]
    fn test_tag_cloud() {
        let (store, config) = fixture();
        let View::TagCloud { tags, .. } = PageBuilder::new(&store, &config, true).tag_cloud().view
        else {
            panic!("expected tag cloud");
        };
        assert_eq!(tags, [("go".to_string(), 7), ("rust lang".to_string(), 2)]);
    }

    #[test]
    fn test_taxonomy_url_encodes() {
        assert_eq!(taxonomy_url(TaxonomyKind::Tag, "rust lang"), "/tags/rust-lang/");
        assert_eq!(taxonomy_url(TaxonomyKind::Tag, "c++"), "/tags/c%2B%2B/");
    }
}
