//! In-memory content store.
//!
//! Holds every post plus three derived indices over the same set:
//!
//! | Index       | Key    | Order within key                         |
//! |-------------|--------|------------------------------------------|
//! | `by_date`   | -      | date descending, then first insertion    |
//! | `by_series` | series | `series_order` ascending, then slug      |
//! | `by_tag`    | tag    | same as `by_date`                        |
//!
//! Indices hold slugs only; the posts live once in the primary map as
//! `Arc<Post>`. Aggregates (`tags_stats`, `series_stats`, `all_tags`) are
//! recomputed from the index tables after every mutation.
//!
//! # Thread Safety
//!
//! One `RwLock` guards everything: queries share the read lock and return
//! owned collections, `add` takes the write lock once, so a reader never
//! sees a half-applied upsert.

pub mod pagination;

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{
    error::{ContentError, ContentResult},
    post::{Post, parser::reading_time},
};
pub use pagination::{PAGE_SIZE, Paged, page_bounds, total_pages};

/// Position in a date-ordered index: newest first, ties by insertion rank.
type DateKey = (Reverse<DateTime<Utc>>, u64, String);

/// Position in a series index.
type SeriesKey = (i64, String);

#[derive(Debug)]
struct Entry {
    post: Arc<Post>,
    /// Rank of the slug's first insertion, kept across upserts.
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    posts: FxHashMap<String, Entry>,
    next_seq: u64,
    by_date: BTreeSet<DateKey>,
    by_series: BTreeMap<String, BTreeSet<SeriesKey>>,
    by_tag: BTreeMap<String, BTreeSet<DateKey>>,
    series_stats: BTreeMap<String, usize>,
    tags_stats: BTreeMap<String, usize>,
    all_tags: Vec<String>,
}

fn date_key(post: &Post, seq: u64) -> DateKey {
    (Reverse(post.date), seq, post.slug.clone())
}

fn series_key(post: &Post) -> SeriesKey {
    (post.series_order, post.slug.clone())
}

impl Inner {
    fn upsert(&mut self, post: Post) {
        let seq = match self.posts.get(&post.slug) {
            Some(entry) => {
                let (old, seq) = (Arc::clone(&entry.post), entry.seq);
                self.unindex(&old, seq);
                seq
            }
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };

        let post = Arc::new(post);
        self.index(&post, seq);
        self.posts.insert(post.slug.clone(), Entry { post, seq });
        self.recount();
    }

    fn index(&mut self, post: &Post, seq: u64) {
        let key = date_key(post, seq);
        if post.has_series() {
            self.by_series
                .entry(post.series.clone())
                .or_default()
                .insert(series_key(post));
        }
        for tag in post.distinct_tags() {
            self.by_tag
                .entry(tag.to_owned())
                .or_default()
                .insert(key.clone());
        }
        self.by_date.insert(key);
    }

    fn unindex(&mut self, post: &Post, seq: u64) {
        let key = date_key(post, seq);
        self.by_date.remove(&key);

        if post.has_series()
            && let Some(members) = self.by_series.get_mut(&post.series)
        {
            members.remove(&series_key(post));
            if members.is_empty() {
                self.by_series.remove(&post.series);
            }
        }

        for tag in post.distinct_tags() {
            if let Some(members) = self.by_tag.get_mut(tag) {
                members.remove(&key);
                if members.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
    }

    fn recount(&mut self) {
        self.series_stats = self
            .by_series
            .iter()
            .map(|(name, members)| (name.clone(), members.len()))
            .collect();
        self.tags_stats = self
            .by_tag
            .iter()
            .map(|(tag, members)| (tag.clone(), members.len()))
            .collect();
        self.all_tags = self.by_tag.keys().cloned().collect();
    }

    fn lookup(&self, slug: &str) -> Option<Arc<Post>> {
        self.posts.get(slug).map(|entry| Arc::clone(&entry.post))
    }

    fn resolve<'a>(&self, slugs: impl Iterator<Item = &'a str>) -> Vec<Arc<Post>> {
        slugs.filter_map(|slug| self.lookup(slug)).collect()
    }

    fn paged<'a>(
        &self,
        slugs: impl ExactSizeIterator<Item = &'a str>,
        page: usize,
        size: usize,
    ) -> Paged<Arc<Post>> {
        let total = slugs.len();
        match page_bounds(total, page, size) {
            Some(range) => Paged {
                items: self.resolve(slugs.skip(range.start).take(range.len())),
                total,
            },
            None => Paged::empty(total),
        }
    }
}

/// Thread-safe post store with date, tag and series indices.
#[derive(Debug, Default)]
pub struct ContentStore {
    inner: RwLock<Inner>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a post by slug.
    ///
    /// Re-adding a post keeps its original insertion rank, so adding an
    /// unchanged post leaves every index and counter as it was.
    pub fn add(&self, mut post: Post) -> ContentResult<()> {
        if post.slug.trim().is_empty() {
            return Err(ContentError::InvalidPost(format!(
                "post `{}` has an empty slug",
                post.title
            )));
        }
        if post.reading_time == 0 {
            post.reading_time = reading_time(&post.raw_content);
        }
        self.inner.write().upsert(post);
        Ok(())
    }

    pub fn get(&self, slug: &str) -> ContentResult<Arc<Post>> {
        self.inner
            .read()
            .lookup(slug)
            .ok_or_else(|| ContentError::NotFound(slug.to_owned()))
    }

    /// All posts, newest first.
    pub fn list(&self) -> Vec<Arc<Post>> {
        let inner = self.inner.read();
        inner.resolve(inner.by_date.iter().map(|(_, _, slug)| slug.as_str()))
    }

    /// Alias of [`list`](Self::list).
    pub fn get_all(&self) -> Vec<Arc<Post>> {
        self.list()
    }

    /// One page of all posts, newest first. `page` starts at 1.
    pub fn list_paged(&self, page: usize, size: usize) -> Paged<Arc<Post>> {
        let inner = self.inner.read();
        inner.paged(inner.by_date.iter().map(|(_, _, slug)| slug.as_str()), page, size)
    }

    /// One page of posts carrying `tag`, newest first.
    pub fn list_by_tag(&self, tag: &str, page: usize, size: usize) -> Paged<Arc<Post>> {
        let inner = self.inner.read();
        match inner.by_tag.get(tag) {
            Some(members) => inner.paged(members.iter().map(|(_, _, slug)| slug.as_str()), page, size),
            None => Paged::empty(0),
        }
    }

    /// One page of a series in series order.
    pub fn list_by_series(&self, series: &str, page: usize, size: usize) -> Paged<Arc<Post>> {
        let inner = self.inner.read();
        match inner.by_series.get(series) {
            Some(members) => inner.paged(members.iter().map(|(_, slug)| slug.as_str()), page, size),
            None => Paged::empty(0),
        }
    }

    /// Posts carrying `tag` that also belong to `series`, newest first.
    pub fn list_by_tag_and_series(
        &self,
        tag: &str,
        series: &str,
        page: usize,
        size: usize,
    ) -> Paged<Arc<Post>> {
        let inner = self.inner.read();
        let Some(members) = inner.by_tag.get(tag) else {
            return Paged::empty(0);
        };
        let matching: Vec<&str> = members
            .iter()
            .map(|(_, _, slug)| slug.as_str())
            .filter(|slug| inner.posts.get(*slug).is_some_and(|e| e.post.series == series))
            .collect();
        inner.paged(matching.into_iter(), page, size)
    }

    /// A whole series in series order.
    pub fn series_posts(&self, series: &str) -> Vec<Arc<Post>> {
        let inner = self.inner.read();
        inner
            .by_series
            .get(series)
            .map(|members| inner.resolve(members.iter().map(|(_, slug)| slug.as_str())))
            .unwrap_or_default()
    }

    /// Post count per series.
    pub fn series_stats(&self) -> BTreeMap<String, usize> {
        self.inner.read().series_stats.clone()
    }

    /// Post count per tag (each post counted once per distinct tag).
    pub fn tags_stats(&self) -> BTreeMap<String, usize> {
        self.inner.read().tags_stats.clone()
    }

    /// Every tag in use, sorted.
    pub fn all_tags(&self) -> Vec<String> {
        self.inner.read().all_tags.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().posts.is_empty()
    }
}
