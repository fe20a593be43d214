//! RBAC data models: identifiers, Role, Permission and their write-side inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::{RbacError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed role identifier (`roles.id`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct RoleId(pub i64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RoleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Strongly-typed permission identifier (`permissions.id`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PermissionId(pub i64);

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PermissionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a user owned by the host application.
///
/// Users are not stored by this crate; `user_roles.user_id` is an opaque key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Guard names
// ═══════════════════════════════════════════════════════════════════════════════

/// Derive a guard name from a display name.
///
/// Trims, lower-cases and collapses each run of whitespace into a single `-`:
/// `"Content Editor "` becomes `"content-editor"`.
pub fn guard_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn validate_guard_name(entity: &str, guard_name: &str) -> Result<()> {
    if guard_name.trim().is_empty() {
        return Err(RbacError::validation(format!(
            "{} guard name must not be empty",
            entity
        )));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// A named capability, e.g. `articles.publish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub guard_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`PermissionRepository::first_or_create`](super::PermissionRepository::first_or_create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub guard_name: String,
    pub description: Option<String>,
}

impl NewPermission {
    /// New permission whose guard name is derived from `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            guard_name: guard_name(&name),
            name,
            description: None,
        }
    }

    pub fn with_guard_name(mut self, guard_name: impl Into<String>) -> Self {
        self.guard_name = guard_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_guard_name("permission", &self.guard_name)
    }
}

/// Partial update of a permission. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPatch {
    pub name: Option<String>,
    pub guard_name: Option<String>,
    pub description: Option<String>,
}

impl PermissionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn guard_name(mut self, guard_name: impl Into<String>) -> Self {
        self.guard_name = Some(guard_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.guard_name.is_none() && self.description.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.guard_name {
            Some(guard_name) => validate_guard_name("permission", guard_name),
            None => Ok(()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// A named bundle of permissions assignable to users.
///
/// `permissions` is only populated by the `*_with_permissions` lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub guard_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Check the eagerly loaded permissions for a guard name.
    ///
    /// Always false when permissions were not loaded.
    pub fn has_loaded_permission(&self, guard_name: &str) -> bool {
        self.permissions.iter().any(|p| p.guard_name == guard_name)
    }
}

/// Input for [`RoleRepository::first_or_create`](super::RoleRepository::first_or_create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub guard_name: String,
    pub description: Option<String>,
}

impl NewRole {
    /// New role whose guard name is derived from `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            guard_name: guard_name(&name),
            name,
            description: None,
        }
    }

    pub fn with_guard_name(mut self, guard_name: impl Into<String>) -> Self {
        self.guard_name = guard_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_guard_name("role", &self.guard_name)
    }
}

/// Partial update of a role. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub guard_name: Option<String>,
    pub description: Option<String>,
}

impl RolePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn guard_name(mut self, guard_name: impl Into<String>) -> Self {
        self.guard_name = Some(guard_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.guard_name.is_none() && self.description.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.guard_name {
            Some(guard_name) => validate_guard_name("role", guard_name),
            None => Ok(()),
        }
    }
}
