//! Integration tests for permission persistence.

mod common;

use rbac_core::error::ErrorCode;
use rbac_core::pagination::OffsetPagination;
use rbac_core::rbac::{NewPermission, PermissionId, PermissionPatch, RoleId};

#[tokio::test]
async fn test_first_or_create_derives_guard_name() {
    let store = common::store().await;

    let created = store
        .permissions
        .first_or_create(NewPermission::new("Publish Articles"))
        .await
        .unwrap();
    let again = store
        .permissions
        .first_or_create(NewPermission::new("publish   articles"))
        .await
        .unwrap();

    assert_eq!(created.guard_name, "publish-articles");
    assert_eq!(created.id, again.id);
    assert_eq!(again.name, "Publish Articles");
}

#[tokio::test]
async fn test_lookups() {
    let store = common::store().await;
    let read = store.permission("articles.read").await;
    let write = store.permission("articles.write").await;

    assert_eq!(store.permissions.get_by_id(read.id).await.unwrap(), read);
    assert_eq!(
        store.permissions.get_by_guard_name("articles.write").await.unwrap().id,
        write.id
    );

    let err = store
        .permissions
        .get_by_guard_name("articles.delete")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RecordNotFound);

    let many = store
        .permissions
        .get_many(&[write.id, PermissionId(42), read.id])
        .await
        .unwrap();
    assert_eq!(many.ids(), vec![read.id, write.id]);

    let by_guard = store
        .permissions
        .get_by_guard_names(&["articles.write", "nope"])
        .await
        .unwrap();
    assert_eq!(by_guard.len(), 1);
    assert!(by_guard.contains_guard("articles.write"));
}

#[tokio::test]
async fn test_ids_and_ids_of_roles() {
    let store = common::store().await;
    let editor = store.role("editor").await;
    let viewer = store.role("viewer").await;
    let p1 = store.permission("p1").await;
    let p2 = store.permission("p2").await;
    let p3 = store.permission("p3").await;

    store.roles.add_permissions(editor.id, &[p1.id, p2.id]).await.unwrap();
    store.roles.add_permissions(viewer.id, &[p2.id]).await.unwrap();

    let all = store.permissions.ids(None).await.unwrap();
    assert_eq!(all.ids, vec![p1.id, p2.id, p3.id]);

    let last = store
        .permissions
        .ids(Some(&OffsetPagination::new(2, 2)))
        .await
        .unwrap();
    assert_eq!(last.ids, vec![p3.id]);
    assert_eq!(last.total, 3);

    let held = store
        .permissions
        .ids_of_roles(&[editor.id, viewer.id], None)
        .await
        .unwrap();
    assert_eq!(held.ids, vec![p1.id, p2.id]);
    assert_eq!(held.total, 2);

    let empty = store.permissions.ids_of_roles(&[], None).await.unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.total, 0);

    let unknown = store
        .permissions
        .ids_of_roles(&[RoleId(1000)], None)
        .await
        .unwrap();
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn test_update_and_missing() {
    let store = common::store().await;
    let perm = store.permission("articles.read").await;

    let updated = store
        .permissions
        .update(
            perm.id,
            PermissionPatch::new()
                .name("Read Articles")
                .description("View published articles"),
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Read Articles");
    assert_eq!(updated.guard_name, "articles.read");

    let unchanged = store
        .permissions
        .update(perm.id, PermissionPatch::new())
        .await
        .unwrap();
    assert_eq!(unchanged, updated);

    let err = store
        .permissions
        .update(PermissionId(31), PermissionPatch::new().name("x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_removes_role_links() {
    let store = common::store().await;
    let editor = store.role("editor").await;
    let p1 = store.permission("p1").await;
    let p2 = store.permission("p2").await;
    store.roles.add_permissions(editor.id, &[p1.id, p2.id]).await.unwrap();

    store.permissions.delete(p1.id).await.unwrap();

    assert!(store.permissions.get_by_id(p1.id).await.unwrap_err().is_not_found());
    let held = store.permissions.ids_of_roles(&[editor.id], None).await.unwrap();
    assert_eq!(held.ids, vec![p2.id]);

    let err = store.permissions.delete(p1.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RecordNotFound);
}

#[tokio::test]
async fn test_failed_permission_delete_rolls_back() {
    let store = common::store().await;
    let editor = store.role("editor").await;
    let perm = store.permission("articles.read").await;
    store.roles.add_permissions(editor.id, &[perm.id]).await.unwrap();

    sqlx::query(
        "CREATE TRIGGER block_permission_delete BEFORE DELETE ON permissions \
         BEGIN SELECT RAISE(ABORT, 'permission delete blocked'); END",
    )
    .execute(store.db.pool())
    .await
    .unwrap();

    let err = store.permissions.delete(perm.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::DatabaseTransactionFailed);

    assert!(store.permissions.get_by_id(perm.id).await.is_ok());
    let held = store.permissions.ids_of_roles(&[editor.id], None).await.unwrap();
    assert_eq!(held.ids, vec![perm.id]);
}
