//! PackStore trait test suite
//!
//! Tests for pack lifecycle and target attachment behavior. Pack names
//! are unique per test so the suite can run against one shared store.

use fleetmon_store::{
    Datastore, HostId, LabelId, ListOptions, NewPack, SortOrder, StoreError, Target,
};

/// Run all PackStore tests
pub async fn run_all<S: Datastore>(store: &S) {
    test_create_and_fetch_pack(store).await;
    test_duplicate_name_rejected(store).await;
    test_soft_delete_and_revive(store).await;
    test_idempotent_attach(store).await;
    test_detach_reports_not_found(store).await;
    test_list_packs_pagination(store).await;
    test_unknown_pack_operations(store).await;
}

fn named(name: &str) -> NewPack {
    NewPack {
        name: name.to_string(),
        ..NewPack::default()
    }
}

/// Test creating a pack and fetching it by id and by name
pub async fn test_create_and_fetch_pack<S: Datastore>(store: &S) {
    let created = store
        .new_pack(NewPack {
            name: "suite-create".to_string(),
            description: "created by the shared suite".to_string(),
            platform: "linux".to_string(),
            ..NewPack::default()
        })
        .await
        .expect("new_pack should succeed");

    let by_id = store.pack(created.id).await.expect("pack should succeed");
    assert_eq!(by_id.name, "suite-create");
    assert_eq!(by_id.platform, "linux");
    assert!(!by_id.deleted);

    let by_name = store
        .pack_by_name("suite-create")
        .await
        .expect("pack_by_name should succeed")
        .expect("pack should be found by name");
    assert_eq!(by_name.id, created.id);
}

/// Test that a live pack name cannot be reused
pub async fn test_duplicate_name_rejected<S: Datastore>(store: &S) {
    store
        .new_pack(named("suite-dup"))
        .await
        .expect("first create should succeed");

    let result = store.new_pack(named("suite-dup")).await;
    assert!(
        matches!(result, Err(StoreError::AlreadyExists { .. })),
        "should return AlreadyExists, got: {:?}",
        result
    );
}

/// Test soft deletion followed by name reuse reviving the identity
pub async fn test_soft_delete_and_revive<S: Datastore>(store: &S) {
    let original = store
        .new_pack(named("suite-revive"))
        .await
        .expect("new_pack should succeed");
    store
        .delete_pack(original.id)
        .await
        .expect("delete_pack should succeed");

    let fetch = store.pack(original.id).await;
    assert!(
        matches!(fetch, Err(StoreError::NotFound { .. })),
        "deleted pack should be excluded from reads, got: {:?}",
        fetch
    );

    let revived = store
        .new_pack(named("suite-revive"))
        .await
        .expect("creating over a soft-deleted name should succeed");
    assert_eq!(
        revived.id, original.id,
        "revival should reuse the deleted record's identifier"
    );
}

/// Test that attaching the same target twice leaves one association
pub async fn test_idempotent_attach<S: Datastore>(store: &S) {
    let pack = store
        .new_pack(named("suite-attach"))
        .await
        .expect("new_pack should succeed");
    let target = Target::Label(LabelId(500));

    store
        .add_pack_target(pack.id, target)
        .await
        .expect("first attach should succeed");
    store
        .add_pack_target(pack.id, target)
        .await
        .expect("second attach should succeed without error");

    let targets = store
        .list_pack_targets(pack.id)
        .await
        .expect("list_pack_targets should succeed");
    assert_eq!(targets, vec![target]);
}

/// Test that detaching an unattached target reports not-found
pub async fn test_detach_reports_not_found<S: Datastore>(store: &S) {
    let pack = store
        .new_pack(named("suite-detach"))
        .await
        .expect("new_pack should succeed");

    let result = store
        .remove_pack_target(pack.id, Target::Host(HostId(9999)))
        .await;
    match result {
        Err(StoreError::TargetNotFound { pack_id, target }) => {
            assert_eq!(pack_id, pack.id);
            assert_eq!(target, Target::Host(HostId(9999)));
        }
        other => panic!("expected TargetNotFound, got: {:?}", other),
    }

    // Attached target detaches cleanly exactly once
    let target = Target::Host(HostId(1));
    store.add_pack_target(pack.id, target).await.unwrap();
    store
        .remove_pack_target(pack.id, target)
        .await
        .expect("detach of an attached target should succeed");
    assert!(store
        .remove_pack_target(pack.id, target)
        .await
        .is_err());
}

/// Test list_packs windowing and ordering
pub async fn test_list_packs_pagination<S: Datastore>(store: &S) {
    for i in 0..3 {
        store
            .new_pack(named(&format!("suite-page-{}", i)))
            .await
            .expect("new_pack should succeed");
    }

    let all = store
        .list_packs(&ListOptions::default())
        .await
        .expect("list_packs should succeed");
    assert!(all.len() >= 3);
    // Ascending id order
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let descending = store
        .list_packs(&ListOptions {
            order: SortOrder::Descending,
            ..ListOptions::default()
        })
        .await
        .expect("list_packs should succeed");
    assert!(descending.windows(2).all(|w| w[0].id > w[1].id));

    let windowed = store
        .list_packs(&ListOptions {
            offset: 1,
            limit: Some(2),
            order: SortOrder::Ascending,
        })
        .await
        .expect("list_packs should succeed");
    assert_eq!(windowed.len(), 2);
    assert_eq!(windowed[0].id, all[1].id);
}

/// Test that operations on unknown packs report not-found
pub async fn test_unknown_pack_operations<S: Datastore>(store: &S) {
    let missing = fleetmon_store::PackId(u64::MAX);

    assert!(matches!(
        store.pack(missing).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.list_pack_targets(missing).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.add_pack_target(missing, Target::Host(HostId(1))).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.delete_pack(missing).await,
        Err(StoreError::NotFound { .. })
    ));
}
