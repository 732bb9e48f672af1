//! Contract checks for the in-memory store used across the suite.

use std::time::Duration;

use nwloader_store::{DEL_IF_MATCH_SCRIPT, KeyStore, SetMode, SetStatus, Ttl};
use nwloader_test::MemoryStore;

#[tokio::test]
async fn test_get_set_del_roundtrip() {
    let store = MemoryStore::new();
    let ttl = Duration::from_secs(10);

    assert_eq!(store.get("k").await.unwrap(), None);
    assert_eq!(
        store.set("k", "v", ttl, SetMode::Upsert).await.unwrap(),
        SetStatus::Written
    );
    assert_eq!(store.get("k").await.unwrap(), Some("v".to_owned()));
    assert_eq!(store.del("k").await.unwrap(), 1);
    assert_eq!(store.del("k").await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_only_write_respects_live_entries() {
    let store = MemoryStore::new();
    let ttl = Duration::from_secs(10);

    assert_eq!(
        store.set("k", "first", ttl, SetMode::IfAbsent).await.unwrap(),
        SetStatus::Written
    );
    assert_eq!(
        store.set("k", "second", ttl, SetMode::IfAbsent).await.unwrap(),
        SetStatus::Conflict
    );
    assert_eq!(store.get("k").await.unwrap(), Some("first".to_owned()));

    // An unconditional write still overwrites.
    assert_eq!(
        store.set("k", "third", ttl, SetMode::Upsert).await.unwrap(),
        SetStatus::Written
    );
    assert_eq!(store.get("k").await.unwrap(), Some("third".to_owned()));
    assert_eq!(store.counters().set_conflict_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_frees_the_key_for_create_only_writes() {
    let store = MemoryStore::new();

    store
        .set("k", "v", Duration::from_millis(100), SetMode::IfAbsent)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(store.get("k").await.unwrap(), None);
    assert_eq!(
        store
            .set("k", "v2", Duration::from_secs(1), SetMode::IfAbsent)
            .await
            .unwrap(),
        SetStatus::Written
    );
}

#[tokio::test(start_paused = true)]
async fn test_ttl_reply_domain() {
    let store = MemoryStore::new();

    assert_eq!(store.ttl("k").await.unwrap(), Ttl::Missing);

    store
        .set("k", "v", Duration::from_secs(4), SetMode::Upsert)
        .await
        .unwrap();
    match store.ttl("k").await.unwrap() {
        Ttl::Remaining(remaining) => assert!(remaining <= Duration::from_secs(4)),
        other => panic!("expected remaining ttl, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.ttl("k").await.unwrap(), Ttl::Missing);

    store.insert_without_expiry("p", "v");
    assert_eq!(store.ttl("p").await.unwrap(), Ttl::NoExpiry);
}

#[tokio::test]
async fn test_del_if_match_requires_the_stored_token() {
    let store = MemoryStore::new();
    store
        .set("lock", "token-a", Duration::from_secs(10), SetMode::Upsert)
        .await
        .unwrap();

    let miss = store
        .eval(DEL_IF_MATCH_SCRIPT, &["lock"], &["token-b"])
        .await
        .unwrap();
    assert_eq!(miss, 0);
    assert!(store.get("lock").await.unwrap().is_some());

    let hit = store
        .eval(DEL_IF_MATCH_SCRIPT, &["lock"], &["token-a"])
        .await
        .unwrap();
    assert_eq!(hit, 1);
    assert_eq!(store.get("lock").await.unwrap(), None);

    // Deleting an absent key matches nothing.
    let absent = store
        .eval(DEL_IF_MATCH_SCRIPT, &["lock"], &["token-a"])
        .await
        .unwrap();
    assert_eq!(absent, 0);
}
