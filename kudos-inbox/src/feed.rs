//! Feed projection: merge both partitions, sort, search, paginate.
//!
//! Everything here is a pure function of the store; nothing is mutated.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kudos_shared::types::pagination::{PageSpec, Paginated};

use crate::models::{Notification, PartitionKind};
use crate::store::NotificationStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Type,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub by: SortBy,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(by: SortBy, order: SortOrder) -> Self {
        Self { by, order }
    }

    fn compare(&self, a: &Notification, b: &Notification) -> Ordering {
        let ordering = match self.by {
            // entries without a valid timestamp order before every valid one
            SortBy::Date => a.timestamp.cmp(&b.timestamp),
            SortBy::Type => a.kind.code().cmp(b.kind.code()),
        };
        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub sort: SortSpec,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: PageSpec,
}

impl FeedQuery {
    pub fn sorted(mut self, by: SortBy, order: SortOrder) -> Self {
        self.sort = SortSpec::new(by, order);
        self
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.page = page;
        self
    }
}

pub type FeedPage = Paginated<Arc<Notification>>;

/// Both partitions in one list, message partition first.
pub fn merged(store: &NotificationStore) -> Vec<Arc<Notification>> {
    PartitionKind::ALL
        .iter()
        .flat_map(|kind| store.partition(*kind).iter().cloned())
        .collect()
}

/// Stable: entries with equal keys keep their relative order in either direction.
pub fn sort_entries(entries: &mut [Arc<Notification>], spec: SortSpec) {
    entries.sort_by(|a, b| spec.compare(a, b));
}

/// Case-insensitive substring match over `content`. A blank query keeps everything.
pub fn filter_entries(entries: Vec<Arc<Notification>>, query: Option<&str>) -> Vec<Arc<Notification>> {
    let needle = match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_lowercase(),
        _ => return entries,
    };

    entries
        .into_iter()
        .filter(|n| n.content.to_lowercase().contains(&needle))
        .collect()
}

/// The full pipeline. `total` is the length of the filtered list.
pub fn project(store: &NotificationStore, query: &FeedQuery) -> FeedPage {
    let mut entries = merged(store);
    sort_entries(&mut entries, query.sort);
    let filtered = filter_entries(entries, query.search.as_deref());
    Paginated::slice(&filtered, &query.page)
}
