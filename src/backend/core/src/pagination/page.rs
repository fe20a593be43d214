//! Result type for paginated identifier queries.

use serde::{Deserialize, Serialize};

use super::offset::{OffsetPagination, PageMetadata};

/// One page of identifiers plus the total number of matches.
///
/// `total` is counted before pagination is applied, so it is the same for
/// every page of a given query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPage<I> {
    pub ids: Vec<I>,
    pub total: u64,
}

impl<I> IdPage<I> {
    pub fn new(ids: Vec<I>, total: u64) -> Self {
        Self { ids, total }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Page-count information for the pagination used to fetch this page.
    pub fn metadata(&self, pagination: &OffsetPagination) -> PageMetadata {
        pagination.metadata(self.total)
    }
}

impl<I> Default for IdPage<I> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            total: 0,
        }
    }
}
