//! Pagination utilities for bulk identifier queries.
//!
//! ```rust,ignore
//! use rbac_core::pagination::OffsetPagination;
//!
//! let page = roles.ids(Some(&OffsetPagination::new(2, 50))).await?;
//! let all = roles.ids(None).await?;
//! ```

mod offset;
mod page;

pub use offset::{paginate, OffsetPagination, OffsetPaginationBuilder, PageMetadata};
pub use page::IdPage;

/// Default page size if not specified.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Maximum page size accepted by [`OffsetPagination::validate`].
pub const MAX_PAGE_SIZE: u64 = 100;

/// Minimum page number (1-indexed).
pub const MIN_PAGE_NUMBER: u64 = 1;
