use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize { DEFAULT_PAGE_SIZE }

impl PageSpec {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// 1-based page number, the way pagination controls count.
    pub fn page(page: usize, per_page: usize) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(per_page),
            limit: per_page,
        }
    }

    pub fn page_number(&self) -> usize {
        if self.limit == 0 {
            1
        } else {
            self.offset / self.limit + 1
        }
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self { offset: 0, limit: DEFAULT_PAGE_SIZE }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: usize, spec: &PageSpec) -> Self {
        let per_page = spec.limit;
        let total_pages = if total == 0 || per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        Self {
            items,
            total,
            page: spec.page_number(),
            per_page,
            total_pages,
        }
    }

    /// Slice `[offset, offset + limit)` out of `all`; `total` is `all.len()`.
    /// An offset past the end yields an empty page, not an error.
    pub fn slice(all: &[T], spec: &PageSpec) -> Self
    where
        T: Clone,
    {
        let start = spec.offset.min(all.len());
        let end = spec.offset.saturating_add(spec.limit).min(all.len());
        Self::new(all[start..end].to_vec(), all.len(), spec)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
