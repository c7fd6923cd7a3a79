//! Fixed-size page windows over an ordered sequence.

use std::num::NonZeroUsize;

use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("invalid page request: page size must be positive, got {0}")]
    InvalidPageSize(usize),
}

/// Number of items per page. Zero is rejected when configuration loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(NonZeroUsize);

impl PageSize {
    pub fn new(size: usize) -> Result<Self, PaginationError> {
        NonZeroUsize::new(size)
            .map(Self)
            .ok_or(PaginationError::InvalidPageSize(size))
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(NonZeroUsize::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

/// The page a request asked for, before it is clamped to the real page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageNumber {
    #[default]
    First,
    Requested(i64),
}

impl PageNumber {
    /// Parse a raw `?page=` value. Missing or non-numeric input means page 1.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            Some(n) => Self::Requested(n),
            None => Self::First,
        }
    }

    /// Resolve against `total_pages`. Anything outside `1..=total_pages`
    /// lands on the last page instead of failing.
    pub fn resolve(self, total_pages: usize) -> usize {
        match self {
            Self::First => 1,
            Self::Requested(n) if n >= 1 && (n as u64) <= total_pages as u64 => n as usize,
            Self::Requested(_) => total_pages,
        }
    }
}

/// One window of a paginated sequence plus the metadata a page needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> Option<usize> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<usize> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            total_pages: self.total_pages,
            total_count: self.total_count,
            page_size: self.page_size,
        }
    }
}

/// Page count for `total_count` items. Never below 1, so an empty feed
/// still renders as "page 1 of 1".
pub fn total_pages(total_count: usize, size: PageSize) -> usize {
    total_count.div_ceil(size.get()).max(1)
}

/// Slice `items` into the requested page. An empty sequence still has one
/// (empty) page so nothing ever renders as "page 0 of 0".
pub fn paginate<T>(items: Vec<T>, size: PageSize, page: PageNumber) -> Page<T> {
    let page_size = size.get();
    let total_count = items.len();
    let total_pages = total_pages(total_count, size);
    let number = page.resolve(total_pages);
    let start = (number - 1) * page_size;

    let items = items.into_iter().skip(start).take(page_size).collect();

    Page {
        items,
        number,
        total_pages,
        total_count,
        page_size,
    }
}
