#![allow(clippy::result_large_err)]
//! # RBAC Core
//!
//! Role-based access control data layer: roles, permissions and their
//! assignments, stored in SQLite through sqlx.
//!
//! ## Architecture
//!
//! - **RBAC**: Repositories for roles, permissions and user-role links, plus
//!   permission-satisfaction checks and a guard-name access facade
//! - **Database**: Connection pool, embedded migrations and health probes
//! - **Pagination**: Offset pagination for bulk identifier queries
//! - **Telemetry**: Structured logging setup
//! - **Config**: File and environment based configuration

pub mod config;
pub mod db;
pub mod error;
pub mod pagination;
pub mod rbac;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, RbacError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig};
    pub use crate::db::{Database, DatabaseHealth};
    pub use crate::error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, RbacError, Result};
    pub use crate::pagination::{IdPage, OffsetPagination, PageMetadata};
    pub use crate::rbac::{
        AccessControl, NewPermission, NewRole, Permission, PermissionCollection, PermissionId,
        PermissionPatch, PermissionRepository, Role, RoleCollection, RoleId, RolePatch,
        RoleRepository, UserId, UserRepository,
    };
}
