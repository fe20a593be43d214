//! Offset-based pagination for bulk identifier queries.
//!
//! This module provides:
//! - Page/per_page parameter handling
//! - OFFSET/LIMIT binding onto a `sqlx` query builder
//! - Page metadata computation from a total count

use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;

use crate::db::Db;
use crate::error::RbacError;

// ═══════════════════════════════════════════════════════════════════════════════
// Page Metadata
// ═══════════════════════════════════════════════════════════════════════════════

/// Metadata about a paginated result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Current page number (1-indexed).
    pub page: u64,
    /// Number of items per page.
    pub per_page: u64,
    /// Total number of items across all pages.
    pub total_items: u64,
    /// Total number of pages.
    pub total_pages: u64,
    /// Whether there is a previous page.
    pub has_previous: bool,
    /// Whether there is a next page.
    pub has_next: bool,
}

impl PageMetadata {
    /// Create page metadata from pagination parameters and total count.
    ///
    /// Unlike [`OffsetPagination`], the page here is clamped into the range of
    /// existing pages, so a request past the end reports the last page.
    pub fn new(page: u64, per_page: u64, total_items: u64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(per_page)
        };

        let page = page.clamp(1, total_pages);

        Self {
            page,
            per_page,
            total_items,
            total_pages,
            has_previous: page > 1,
            has_next: page < total_pages,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Offset Pagination
// ═══════════════════════════════════════════════════════════════════════════════

/// Offset-based pagination parameters.
///
/// "No pagination" is expressed by passing `None` where an
/// `Option<&OffsetPagination>` is expected, never by a sentinel page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPagination {
    /// Current page number (1-indexed).
    pub page: u64,
    /// Number of items per page.
    pub per_page: u64,
}

impl OffsetPagination {
    /// Create a new offset pagination; page and per_page are clamped to at least 1.
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(super::MIN_PAGE_NUMBER),
            per_page: per_page.max(1),
        }
    }

    /// Get the SQL OFFSET value: `(page - 1) * per_page`.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Get the SQL LIMIT value.
    pub fn limit(&self) -> u64 {
        self.per_page
    }

    /// Append `LIMIT ? OFFSET ?` to a query under construction.
    pub fn apply(&self, query: &mut QueryBuilder<'_, Db>) {
        query
            .push(" LIMIT ")
            .push_bind(to_sql_int(self.limit()))
            .push(" OFFSET ")
            .push_bind(to_sql_int(self.offset()));
    }

    /// Create page metadata from a total count.
    pub fn metadata(&self, total_items: u64) -> PageMetadata {
        PageMetadata::new(self.page, self.per_page, total_items)
    }

    /// Validate the pagination parameters.
    pub fn validate(&self) -> Result<(), RbacError> {
        if self.page < super::MIN_PAGE_NUMBER {
            return Err(RbacError::validation("Page number must be at least 1"));
        }

        if self.per_page < 1 {
            return Err(RbacError::validation("Items per page must be at least 1"));
        }

        if self.per_page > super::MAX_PAGE_SIZE {
            return Err(RbacError::validation(format!(
                "Items per page cannot exceed {}",
                super::MAX_PAGE_SIZE
            )));
        }

        Ok(())
    }
}

impl Default for OffsetPagination {
    fn default() -> Self {
        Self::new(super::MIN_PAGE_NUMBER, super::DEFAULT_PAGE_SIZE)
    }
}

/// Apply optional pagination; `None` leaves the query unbounded.
pub fn paginate(query: &mut QueryBuilder<'_, Db>, pagination: Option<&OffsetPagination>) {
    if let Some(pagination) = pagination {
        pagination.apply(query);
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Offset Pagination Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for creating offset-based pagination.
#[derive(Debug, Clone, Default)]
pub struct OffsetPaginationBuilder {
    page: Option<u64>,
    per_page: Option<u64>,
}

impl OffsetPaginationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Build the pagination, falling back to page 1 and the default page size.
    pub fn build(self) -> OffsetPagination {
        OffsetPagination::new(
            self.page.unwrap_or(super::MIN_PAGE_NUMBER),
            self.per_page.unwrap_or(super::DEFAULT_PAGE_SIZE),
        )
    }

    /// Build and validate the pagination.
    pub fn build_validated(self) -> Result<OffsetPagination, RbacError> {
        let pagination = self.build();
        pagination.validate()?;
        Ok(pagination)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
