use super::*;
use crate::clock::FakeClock;

fn store() -> MemoryStore<FakeClock> {
    MemoryStore::with_clock(FakeClock::new())
}

#[tokio::test]
async fn set_if_absent_respects_ttl() {
    let store = store();
    let ttl = Duration::from_millis(5000);

    assert!(store.set_if_absent_or_expired("lock:r", "t1", ttl).await.unwrap());
    store.clock().advance(Duration::from_millis(4999));
    assert!(!store.set_if_absent_or_expired("lock:r", "t2", ttl).await.unwrap());

    store.clock().advance(Duration::from_millis(1));
    assert!(store.set_if_absent_or_expired("lock:r", "t2", ttl).await.unwrap());
    assert_eq!(store.get("lock:r").await.unwrap().as_deref(), Some("t2"));
}

#[tokio::test]
async fn stale_holder_cannot_delete_new_holders_entry() {
    let store = store();
    let ttl = Duration::from_millis(100);

    assert!(store.set_if_absent_or_expired("lock:r", "stale", ttl).await.unwrap());
    store.clock().advance(Duration::from_millis(150));
    assert!(store.set_if_absent_or_expired("lock:r", "fresh", ttl).await.unwrap());

    assert!(!store.compare_and_delete("lock:r", "stale").await.unwrap());
    assert_eq!(store.get("lock:r").await.unwrap().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn clones_share_state() {
    let store = store();
    let other = store.clone();

    other.put("counter:x", "3").await.unwrap();
    assert_eq!(store.get("counter:x").await.unwrap().as_deref(), Some("3"));
}

#[tokio::test]
async fn compare_and_swap_is_conditional() {
    let store = store();
    assert!(store.compare_and_swap("idem:k", None, "a").await.unwrap());
    assert!(!store.compare_and_swap("idem:k", None, "b").await.unwrap());
    assert!(!store.compare_and_swap("idem:k", Some("b"), "c").await.unwrap());
    assert!(store.compare_and_swap("idem:k", Some("a"), "c").await.unwrap());
    assert_eq!(store.get("idem:k").await.unwrap().as_deref(), Some("c"));
}

#[tokio::test]
async fn entries_and_purge() {
    let store = store();
    store.put("idem:a", "1").await.unwrap();
    store
        .set_if_absent_or_expired("lock:r", "t", Duration::from_millis(10))
        .await
        .unwrap();

    assert_eq!(store.entries("idem:").await.unwrap().len(), 1);
    assert_eq!(store.entries("").await.unwrap().len(), 2);

    store.clock().advance(Duration::from_millis(10));
    assert_eq!(store.purge_expired(), 1);
    assert_eq!(store.snapshot().len(), 1);
}
