//! Integration tests for permission-satisfaction checks, user-role
//! assignment and the access facade.

mod common;

use rbac_core::error::ErrorCode;
use rbac_core::rbac::{AccessControl, PermissionCollection, RoleCollection, RoleId, UserId};

// ============================================================================
// Satisfaction Checks
// ============================================================================

#[tokio::test]
async fn test_has_permission_both_branches() {
    let store = common::store().await;
    let editor = store.role("editor").await;
    let p1 = store.permission("p1").await;
    let p2 = store.permission("p2").await;
    store.roles.add_permissions(editor.id, &[p1.id]).await.unwrap();

    let roles = store.roles.get_many(&[editor.id]).await.unwrap();
    assert!(store.roles.has_permission(&roles, &p1).await.unwrap());
    assert!(!store.roles.has_permission(&roles, &p2).await.unwrap());
    assert!(!store
        .roles
        .has_permission(&RoleCollection::default(), &p1)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_has_any_permissions() {
    let store = common::store().await;
    let a = store.role("a").await;
    let b = store.role("b").await;
    let p1 = store.permission("p1").await;
    let p2 = store.permission("p2").await;
    let p3 = store.permission("p3").await;
    store.roles.add_permissions(b.id, &[p2.id]).await.unwrap();

    let roles = store.roles.get_many(&[a.id, b.id]).await.unwrap();
    let wanted = store.permissions.get_many(&[p1.id, p2.id]).await.unwrap();
    let other = store.permissions.get_many(&[p1.id, p3.id]).await.unwrap();

    assert!(store.roles.has_any_permissions(&roles, &wanted).await.unwrap());
    assert!(!store.roles.has_any_permissions(&roles, &other).await.unwrap());
    assert!(!store
        .roles
        .has_any_permissions(&roles, &PermissionCollection::default())
        .await
        .unwrap());
    assert!(!store
        .roles
        .has_any_permissions(&RoleCollection::default(), &wanted)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_has_all_permissions_is_collective() {
    let store = common::store().await;
    let editor = store.role("editor").await;
    let viewer = store.role("viewer").await;
    let p1 = store.permission("p1").await;
    let p2 = store.permission("p2").await;
    store.roles.add_permissions(editor.id, &[p1.id]).await.unwrap();
    store.roles.add_permissions(viewer.id, &[p2.id]).await.unwrap();

    let both = store.roles.get_many(&[editor.id, viewer.id]).await.unwrap();
    let needed = store.permissions.get_many(&[p1.id, p2.id]).await.unwrap();

    assert!(store.roles.has_all_permissions(&both, &needed).await.unwrap());
    assert!(!store
        .roles
        .every_role_has_all_permissions(&both, &needed)
        .await
        .unwrap());

    let editor_only = store.roles.get_many(&[editor.id]).await.unwrap();
    assert!(!store
        .roles
        .has_all_permissions(&editor_only, &needed)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_every_role_has_all_permissions() {
    let store = common::store().await;
    let a = store.role("a").await;
    let b = store.role("b").await;
    let p1 = store.permission("p1").await;
    let p2 = store.permission("p2").await;
    store.roles.add_permissions(a.id, &[p1.id, p2.id]).await.unwrap();
    store.roles.add_permissions(b.id, &[p1.id, p2.id]).await.unwrap();

    let roles = store.roles.get_many(&[a.id, b.id]).await.unwrap();
    let needed = store.permissions.get_many(&[p1.id, p2.id]).await.unwrap();

    assert!(store
        .roles
        .every_role_has_all_permissions(&roles, &needed)
        .await
        .unwrap());
    assert!(store
        .roles
        .every_role_has_all_permission_ids(&[a.id, a.id, b.id], &[p2.id, p1.id, p2.id])
        .await
        .unwrap());
}

#[tokio::test]
async fn test_all_permissions_edge_cases() {
    let store = common::store().await;
    let a = store.role("a").await;
    let p1 = store.permission("p1").await;
    store.roles.add_permissions(a.id, &[p1.id]).await.unwrap();

    assert!(store.roles.has_all_permission_ids(&[a.id], &[]).await.unwrap());
    assert!(store.roles.has_all_permission_ids(&[], &[]).await.unwrap());
    assert!(!store.roles.has_all_permission_ids(&[], &[p1.id]).await.unwrap());
    assert!(store
        .roles
        .has_all_permission_ids(&[a.id, a.id], &[p1.id, p1.id])
        .await
        .unwrap());
    assert!(!store
        .roles
        .every_role_has_all_permission_ids(&[], &[p1.id])
        .await
        .unwrap());
}

// ============================================================================
// User Roles
// ============================================================================

#[tokio::test]
async fn test_user_role_assignment() {
    let store = common::store().await;
    let a = store.role("a").await;
    let b = store.role("b").await;
    let c = store.role("c").await;
    let user = UserId(10);

    assert_eq!(store.users.add_roles(user, &[a.id, b.id]).await.unwrap(), 2);
    assert_eq!(store.users.add_roles(user, &[b.id]).await.unwrap(), 0);
    assert_eq!(store.users.add_roles(user, &[]).await.unwrap(), 0);

    store.users.replace_roles(user, &[b.id, c.id]).await.unwrap();
    assert_eq!(store.users.role_ids(user).await.unwrap(), vec![b.id, c.id]);

    assert_eq!(store.users.remove_roles(user, &[c.id]).await.unwrap(), 1);
    assert_eq!(store.users.role_ids(user).await.unwrap(), vec![b.id]);

    assert_eq!(store.users.clear_roles(user).await.unwrap(), 1);
    assert!(store.users.role_ids(user).await.unwrap().is_empty());

    store.users.add_roles(user, &[a.id]).await.unwrap();
    store.users.replace_roles(user, &[]).await.unwrap();
    assert!(store.users.role_ids(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_roles_with_unknown_role_rolls_back() {
    let store = common::store().await;
    let a = store.role("a").await;
    let user = UserId(11);
    store.users.add_roles(user, &[a.id]).await.unwrap();

    let err = store
        .users
        .replace_roles(user, &[RoleId(999)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DatabaseTransactionFailed);

    assert_eq!(store.users.role_ids(user).await.unwrap(), vec![a.id]);
}

// ============================================================================
// Access Facade
// ============================================================================

#[tokio::test]
async fn test_user_permission_checks() {
    let store = common::store().await;
    let editor = store.role("editor").await;
    let viewer = store.role("viewer").await;
    let publish = store.permission("articles.publish").await;
    let read = store.permission("articles.read").await;
    store.permission("articles.delete").await;

    store.roles.add_permissions(editor.id, &[publish.id]).await.unwrap();
    store.roles.add_permissions(viewer.id, &[read.id]).await.unwrap();
    store.users.add_roles(UserId(1), &[editor.id, viewer.id]).await.unwrap();
    store.users.add_roles(UserId(2), &[viewer.id]).await.unwrap();

    let access = AccessControl::new(&store.db);

    assert!(access.user_has_permission(UserId(1), "articles.publish").await.unwrap());
    assert!(!access.user_has_permission(UserId(2), "articles.publish").await.unwrap());
    assert!(!access.user_has_permission(UserId(3), "articles.read").await.unwrap());

    assert!(access
        .user_has_all_permissions(UserId(1), &["articles.publish", "articles.read"])
        .await
        .unwrap());
    assert!(!access
        .user_has_all_permissions(UserId(2), &["articles.publish", "articles.read"])
        .await
        .unwrap());
    assert!(!access
        .user_has_all_permissions(UserId(1), &["articles.read", "articles.unknown"])
        .await
        .unwrap());

    assert!(access
        .user_has_any_permissions(UserId(2), &["articles.publish", "articles.read"])
        .await
        .unwrap());
    assert!(access
        .user_has_any_permissions(UserId(2), &["articles.unknown", "articles.read"])
        .await
        .unwrap());
    assert!(!access
        .user_has_any_permissions(UserId(2), &["articles.delete"])
        .await
        .unwrap());
}

#[tokio::test]
async fn test_unknown_guard_names() {
    let store = common::store().await;
    store.role("editor").await;
    store.permission("articles.read").await;

    let access = AccessControl::new(&store.db);

    let err = access
        .user_has_permission(UserId(1), "articles.unknown")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RecordNotFound);

    let err = access
        .role_has_permission("ghost", "articles.read")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    assert!(!access
        .role_has_permission("editor", "articles.read")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_role_has_permission() {
    let store = common::store().await;
    let editor = store.role("editor").await;
    let publish = store.permission("articles.publish").await;
    store.roles.add_permissions(editor.id, &[publish.id]).await.unwrap();

    let access = AccessControl::new(&store.db);
    assert!(access
        .role_has_permission("editor", "articles.publish")
        .await
        .unwrap());

    store.roles.clear_permissions(editor.id).await.unwrap();
    assert!(!access
        .role_has_permission("editor", "articles.publish")
        .await
        .unwrap());
}
