//! Ordered collections of roles and permissions returned by batch lookups.

use serde::{Deserialize, Serialize};

use super::models::{Permission, PermissionId, Role, RoleId};

/// Roles in id order, as returned by the batch role lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCollection(Vec<Role>);

impl RoleCollection {
    pub fn new(roles: Vec<Role>) -> Self {
        Self(roles)
    }

    pub fn ids(&self) -> Vec<RoleId> {
        self.0.iter().map(|r| r.id).collect()
    }

    pub fn guard_names(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.guard_name.as_str()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.0.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Role> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Role> {
        self.0
    }
}

impl From<Vec<Role>> for RoleCollection {
    fn from(roles: Vec<Role>) -> Self {
        Self(roles)
    }
}

impl FromIterator<Role> for RoleCollection {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for RoleCollection {
    type Item = Role;
    type IntoIter = std::vec::IntoIter<Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RoleCollection {
    type Item = &'a Role;
    type IntoIter = std::slice::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Permissions in id order, as returned by the batch permission lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCollection(Vec<Permission>);

impl PermissionCollection {
    pub fn new(permissions: Vec<Permission>) -> Self {
        Self(permissions)
    }

    pub fn ids(&self) -> Vec<PermissionId> {
        self.0.iter().map(|p| p.id).collect()
    }

    pub fn guard_names(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.guard_name.as_str()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_guard(&self, guard_name: &str) -> bool {
        self.0.iter().any(|p| p.guard_name == guard_name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Permission> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Permission> {
        self.0
    }
}

impl From<Vec<Permission>> for PermissionCollection {
    fn from(permissions: Vec<Permission>) -> Self {
        Self(permissions)
    }
}

impl FromIterator<Permission> for PermissionCollection {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PermissionCollection {
    type Item = Permission;
    type IntoIter = std::vec::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PermissionCollection {
    type Item = &'a Permission;
    type IntoIter = std::slice::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn role(id: i64, name: &str) -> Role {
        Role {
            id: RoleId(id),
            name: name.to_string(),
            guard_name: crate::rbac::guard_name(name),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            permissions: Vec::new(),
        }
    }

    fn permission(id: i64, guard: &str) -> Permission {
        Permission {
            id: PermissionId(id),
            name: guard.to_string(),
            guard_name: guard.to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_collection_accessors() {
        let roles: RoleCollection = vec![role(1, "Editor"), role(2, "Site Admin")].into();

        assert_eq!(roles.len(), 2);
        assert_eq!(roles.ids(), vec![RoleId(1), RoleId(2)]);
        assert_eq!(roles.guard_names(), vec!["editor", "site-admin"]);
        assert_eq!(roles.names(), vec!["Editor", "Site Admin"]);
        assert_eq!(roles.get(RoleId(2)).map(|r| r.name.as_str()), Some("Site Admin"));
        assert!(roles.get(RoleId(3)).is_none());
    }

    #[test]
    fn test_empty_collections() {
        assert!(RoleCollection::default().is_empty());
        assert!(PermissionCollection::default().ids().is_empty());
    }

    #[test]
    fn test_permission_collection_iteration() {
        let permissions: PermissionCollection =
            [permission(3, "a.read"), permission(5, "a.write")].into_iter().collect();

        assert!(permissions.contains_guard("a.write"));
        assert!(!permissions.contains_guard("a.delete"));

        let ids: Vec<i64> = (&permissions).into_iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![3, 5]);
        assert_eq!(permissions.into_inner().len(), 2);
    }
}
