//! Typed page models.
//!
//! Every rendered page is a [`ViewModel`]: shared site metadata plus one
//! [`View`] variant carrying exactly the data that page kind needs. The build
//! and the preview server construct them through the same [`pages`] builders,
//! so both produce the same posts, page boundaries and counts.

pub mod pages;
pub mod theme;

use std::sync::Arc;

use crate::{config::SiteConfig, post::Post};

pub use pages::PageBuilder;
pub use theme::{DefaultTheme, TemplateEngine};

// ============================================================================
// Site Metadata
// ============================================================================

/// Site-wide data every page can reference.
#[derive(Debug, Clone, Default)]
pub struct SiteInfo {
    pub title: String,
    pub description: String,
    /// Absolute base URL without trailing slash (may be empty).
    pub base_url: String,
    pub language: String,
    pub author: String,
    /// Site-relative feed URL when a feed is published.
    pub feed_url: Option<String>,
}

impl SiteInfo {
    pub fn from_config(config: &SiteConfig) -> Self {
        let feed_url = config
            .build
            .rss
            .enable
            .then(|| format!("/{}", config.build.rss.path.to_string_lossy().trim_start_matches('/')));

        Self {
            title: config.base.title.clone(),
            description: config.base.description.clone(),
            base_url: config.base_url().to_owned(),
            language: config.base.language.clone(),
            author: config.base.author.clone(),
            feed_url,
        }
    }
}

// ============================================================================
// View Model
// ============================================================================

/// Kind of page a [`ViewModel`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Home,
    List,
    Single,
    Taxonomy,
    TagCloud,
}

impl ViewKind {
    /// Class set on `<body>`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::List => "list",
            Self::Single => "single",
            Self::Taxonomy => "taxonomy",
            Self::TagCloud => "tags",
        }
    }
}

/// Grouping a taxonomy page lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyKind {
    Tag,
    Series,
}

impl TaxonomyKind {
    /// URL section: `tags` or `series`.
    pub const fn section(self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::Series => "series",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Tag => "Tag",
            Self::Series => "Series",
        }
    }
}

/// A series as shown in navigation: declared metadata plus live count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSummary {
    pub name: String,
    pub description: String,
    pub count: usize,
    pub url: String,
}

/// Page-kind specific data.
#[derive(Debug, Clone)]
pub enum View {
    Home {
        recent: Vec<Arc<Post>>,
        total_posts: usize,
        series: Vec<SeriesSummary>,
    },
    /// Chronological list; `pagination` is `None` for the single full list.
    List {
        posts: Vec<Arc<Post>>,
        pagination: Option<Pagination>,
    },
    Single {
        post: Arc<Post>,
        /// Whole series in series order, empty when the post has none.
        series_posts: Vec<Arc<Post>>,
    },
    Taxonomy {
        kind: TaxonomyKind,
        term: String,
        description: String,
        posts: Vec<Arc<Post>>,
        pagination: Pagination,
    },
    TagCloud {
        tags: Vec<(String, usize)>,
        series: Vec<SeriesSummary>,
    },
}

#[derive(Debug, Clone)]
pub struct ViewModel {
    pub title: String,
    pub site: Arc<SiteInfo>,
    /// False when rendered on demand by the preview server.
    pub build_mode: bool,
    pub view: View,
}

impl ViewModel {
    pub const fn kind(&self) -> ViewKind {
        match self.view {
            View::Home { .. } => ViewKind::Home,
            View::List { .. } => ViewKind::List,
            View::Single { .. } => ViewKind::Single,
            View::Taxonomy { .. } => ViewKind::Taxonomy,
            View::TagCloud { .. } => ViewKind::TagCloud,
        }
    }

    /// Top-level section the page belongs to, used for navigation.
    pub const fn section(&self) -> &'static str {
        match &self.view {
            View::Home { .. } => "home",
            View::List { .. } | View::Single { .. } => "posts",
            View::Taxonomy { kind, .. } => kind.section(),
            View::TagCloud { .. } => "tags",
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// How page links are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLinks {
    /// `<base>page/<n>/`, page 1 at `<base>` (the layout written to disk).
    Path,
    /// `<base>?page=<n>` or `<base>&page=<n>` (filtered server lists).
    Query,
}

/// Navigation state of one page in a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current: usize,
    pub size: usize,
    pub total_posts: usize,
    pub total_pages: usize,
    /// URL of page 1.
    pub base: String,
    pub links: PageLinks,
}

impl Pagination {
    pub fn new(current: usize, size: usize, total_posts: usize, base: impl Into<String>) -> Self {
        Self {
            current,
            size,
            total_posts,
            total_pages: crate::store::total_pages(total_posts, size),
            base: base.into(),
            links: PageLinks::Path,
        }
    }

    pub fn with_links(mut self, links: PageLinks) -> Self {
        self.links = links;
        self
    }

    pub const fn has_prev(&self) -> bool {
        self.current > 1
    }

    pub const fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    pub fn url_for(&self, page: usize) -> String {
        if page <= 1 {
            return self.base.clone();
        }
        match self.links {
            PageLinks::Path => format!("{}page/{page}/", self.base),
            PageLinks::Query if self.base.contains('?') => format!("{}&page={page}", self.base),
            PageLinks::Query => format!("{}?page={page}", self.base),
        }
    }

    pub fn prev_url(&self) -> Option<String> {
        self.has_prev().then(|| self.url_for(self.current - 1))
    }

    pub fn next_url(&self) -> Option<String> {
        self.has_next().then(|| self.url_for(self.current + 1))
    }
}
