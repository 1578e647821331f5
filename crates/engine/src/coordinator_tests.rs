use super::*;
use std::time::Duration;
use tally_adapters::FakeLockStore;
use tally_core::{FakeClock, IdempotencyKey, SequenceScope, SequentialIdGen};

fn coordinator(store: &FakeLockStore) -> Coordinator<FakeLockStore, FakeClock, SequentialIdGen> {
    let config = TallyConfig::from_toml_str(
        r#"
        [lock]
        ttl = "2s"
        max_retries = 5
        base_delay = "5ms"
        max_jitter = "0ms"

        [idempotency]
        pending_timeout = "30s"
        "#,
    )
    .unwrap();
    Coordinator::with_deps(
        CoordinatorDeps {
            store: store.clone(),
            clock: store.clock().clone(),
            ids: SequentialIdGen::new("tok"),
        },
        config,
    )
}

#[tokio::test(start_paused = true)]
async fn components_share_one_store() {
    let store = FakeLockStore::new();
    let tally = coordinator(&store);

    let n = tally
        .sequences()
        .get_next_invoice_number("org-1", "FACTURA_B")
        .await
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(
        store.get("counter:invoice:org-1:FACTURA_B").await.unwrap().as_deref(),
        Some("1")
    );

    let key = IdempotencyKey::new("evt-1");
    tally.idempotency().check(&key).await.unwrap();
    assert!(store.get("idem:evt-1").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn with_lock_uses_configured_policy() {
    let store = FakeLockStore::new();
    let tally = coordinator(&store);
    tally
        .locks()
        .acquire("export", Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    let result = tally
        .with_lock("export", || async { Ok::<_, std::io::Error>(()) })
        .await;
    assert!(matches!(
        result,
        Err(GuardedError::Coordination(
            crate::CoordinationError::LockAcquisitionTimeout { attempts: 6, .. }
        ))
    ));
}

#[tokio::test(start_paused = true)]
async fn idempotency_uses_configured_pending_timeout() {
    let store = FakeLockStore::new();
    let tally = coordinator(&store);
    let key = IdempotencyKey::new("evt-2");

    tally.idempotency().check(&key).await.unwrap();
    store.clock().advance(Duration::from_secs(30));

    assert!(matches!(
        tally.idempotency().check(&key).await.unwrap(),
        crate::CheckOutcome::Proceed { attempt: 2 }
    ));
    let scope = SequenceScope::new("unused");
    assert_eq!(tally.sequences().current(&scope).await.unwrap(), 0);
}
