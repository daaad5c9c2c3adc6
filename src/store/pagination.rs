//! Page arithmetic shared by the store, the build and the preview server.
//!
//! Pages are 1-based. Page `n` of size `s` covers `[(n-1)*s, min(n*s, total))`.

use std::ops::Range;

/// Posts per page for every paginated view.
pub const PAGE_SIZE: usize = 6;

/// One page of results plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Paged<T> {
    pub fn empty(total: usize) -> Self {
        Self {
            items: Vec::new(),
            total,
        }
    }
}

/// `ceil(total / size)`; zero for an empty set or a zero size.
pub const fn total_pages(total: usize, size: usize) -> usize {
    if size == 0 { 0 } else { total.div_ceil(size) }
}

/// Index range of `page`, or `None` when the page is out of range.
///
/// `page` must be at least 1; page 0 is treated as out of range.
pub fn page_bounds(total: usize, page: usize, size: usize) -> Option<Range<usize>> {
    if page == 0 || size == 0 {
        return None;
    }
    let start = (page - 1).checked_mul(size)?;
    if start >= total {
        return None;
    }
    Some(start..start.saturating_add(size).min(total))
}
