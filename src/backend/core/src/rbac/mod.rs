//! Role-based access control over a relational store.
//!
//! This module provides:
//! - **Models**: Role, Permission and their typed identifiers
//! - **Repositories**: lookups, paginated id retrieval, find-or-create,
//!   partial updates and transactional deletes
//! - **Associations**: role-permission and user-role link management
//! - **Satisfaction checks**: does a set of roles hold one, all or any
//!   permissions
//! - **Access facade**: the same checks for a user, by guard name
//!
//! # Usage
//!
//! ```rust,ignore
//! use rbac_core::rbac::{AccessControl, NewPermission, NewRole, RoleRepository,
//!     PermissionRepository, UserId, UserRepository};
//!
//! let roles = RoleRepository::new(&db);
//! let permissions = PermissionRepository::new(&db);
//!
//! let editor = roles.first_or_create(NewRole::new("Editor")).await?;
//! let publish = permissions.first_or_create(NewPermission::new("Publish Articles")).await?;
//! roles.add_permissions(editor.id, &[publish.id]).await?;
//!
//! UserRepository::new(&db).add_roles(UserId(42), &[editor.id]).await?;
//! assert!(AccessControl::new(&db).user_has_permission(UserId(42), "publish-articles").await?);
//! ```

pub mod access;
pub mod collections;
pub mod models;
pub mod permission_repository;
pub mod role_repository;
mod sql;
pub mod user_repository;

pub use access::AccessControl;
pub use collections::{PermissionCollection, RoleCollection};
pub use models::{
    guard_name, NewPermission, NewRole, Permission, PermissionId, PermissionPatch, Role, RoleId,
    RolePatch, UserId,
};
pub use permission_repository::PermissionRepository;
pub use role_repository::RoleRepository;
pub use user_repository::UserRepository;
