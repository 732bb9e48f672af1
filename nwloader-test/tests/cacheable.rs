//! The decorator form: an async function wrapped with read-through caching.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nwloader::{BoxError, CacheError, Cacheable};
use nwloader_test::MemoryStore;
use serde_json::json;

#[tokio::test]
async fn test_wrap_without_store_is_rejected() {
    let result = Cacheable::<MemoryStore>::new("users")
        .wrap(|id: String| async move { Ok::<_, BoxError>(json!({"id": id})) });

    assert!(matches!(result, Err(CacheError::MissingStore)));
}

#[tokio::test(start_paused = true)]
async fn test_calls_are_routed_through_the_cache() {
    let store = MemoryStore::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch_user = {
        let calls = Arc::clone(&calls);
        Cacheable::new("users")
            .store(store.clone())
            .ttl(Duration::from_secs(2))
            .wrap(move |id: String| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(json!({"id": id}))
                }
            })
            .unwrap()
    };

    let first = fetch_user.call("u1".to_owned()).await.unwrap();
    let second = fetch_user.call("u1".to_owned()).await.unwrap();

    assert_eq!(first, json!({"id": "u1"}));
    assert_eq!(second, json!({"id": "u1"}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.raw_value("nwloader:users:u1").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_prime_and_clear_pass_through() {
    let store = MemoryStore::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch_user = {
        let calls = Arc::clone(&calls);
        Cacheable::new("users")
            .store(store.clone())
            .ttl(Duration::from_secs(2))
            .wrap(move |id: String| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(json!({"id": id}))
                }
            })
            .unwrap()
    };

    assert!(fetch_user.prime("u1", &json!({"id": "primed"})).await.unwrap());
    assert_eq!(
        fetch_user.call("u1".to_owned()).await.unwrap(),
        json!({"id": "primed"})
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(fetch_user.clear("u1").await.unwrap(), 1);
    assert_eq!(
        fetch_user.call("u1".to_owned()).await.unwrap(),
        json!({"id": "u1"})
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
