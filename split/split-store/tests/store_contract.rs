//! Shared contract every store implementation must satisfy.

use std::time::Duration;

use split_store::{DirectoryStore, MemoryStore, ObjectStore, StoreError};

fn exercise(store: &dyn ObjectStore) {
    // put / get / exists
    store.put("uploads/u1/model.stl", b"input").unwrap();
    store.put("results/j1/part_1_1_1.stl", b"part-a").unwrap();
    store.put("results/j1/part_2_1_1.stl", b"part-b").unwrap();
    store.put("results/j1/all-parts.zip", b"zip").unwrap();

    assert_eq!(store.get("uploads/u1/model.stl").unwrap(), b"input");
    assert!(store.exists("results/j1/all-parts.zip").unwrap());
    assert!(!store.exists("results/j9/missing.stl").unwrap());
    assert!(matches!(
        store.get("results/j9/missing.stl"),
        Err(StoreError::NotFound { .. })
    ));

    // overwrite
    store.put("uploads/u1/model.stl", b"input-v2").unwrap();
    assert_eq!(store.get("uploads/u1/model.stl").unwrap(), b"input-v2");

    // stat
    let stat = store.stat("results/j1/part_1_1_1.stl").unwrap();
    assert_eq!(stat.size, 6);
    assert_eq!(stat.content_type, "application/sla");

    // presign embeds a ttl and fails on missing keys
    let url = store
        .presign_get("results/j1/all-parts.zip", Duration::from_secs(900))
        .unwrap();
    assert!(url.contains("expires=900"));
    assert!(store
        .presign_get("results/j9/none.zip", Duration::from_secs(900))
        .is_err());

    // list is sorted and prefix-scoped
    let keys = store.list("results/j1/").unwrap();
    assert_eq!(
        keys,
        vec![
            "results/j1/all-parts.zip",
            "results/j1/part_1_1_1.stl",
            "results/j1/part_2_1_1.stl",
        ]
    );

    // delete is idempotent; delete_prefix reports the count
    store.delete("results/j1/part_2_1_1.stl").unwrap();
    store.delete("results/j1/part_2_1_1.stl").unwrap();
    assert_eq!(store.delete_prefix("results/j1/").unwrap(), 2);
    assert!(store.list("results/j1/").unwrap().is_empty());

    // nothing young enough to expire yet
    assert_eq!(store.expire_older_than(Duration::from_secs(3600)).unwrap(), 0);
    // expire everything remaining
    assert_eq!(store.expire_older_than(Duration::ZERO).unwrap(), 1);
    assert!(store.list("").unwrap().is_empty());
}

#[test]
fn memory_store_contract() {
    exercise(&MemoryStore::new());
}

#[test]
fn directory_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise(&DirectoryStore::new(dir.path()).unwrap());
}
