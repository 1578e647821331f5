use super::*;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_adapters::{FakeLockStore, StoreOp};
use tally_core::FakeClock;

const PENDING_TIMEOUT: Duration = Duration::from_secs(300);

fn coordinator(store: &FakeLockStore) -> IdempotencyCoordinator<FakeLockStore, FakeClock> {
    let settings = IdempotencySettings::default().with_pending_timeout(PENDING_TIMEOUT);
    IdempotencyCoordinator::with_clock(store.clone(), store.clock().clone(), settings)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Payment {
    id: String,
    amount_cents: u64,
}

fn webhook_key() -> IdempotencyKey {
    IdempotencyKey::derive("mercadopago", "evt_123")
}

#[tokio::test]
async fn first_check_proceeds_and_duplicate_is_pending() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    assert_eq!(
        idem.check(&key).await.unwrap(),
        CheckOutcome::Proceed { attempt: 1 }
    );
    assert_eq!(idem.check(&key).await.unwrap(), CheckOutcome::Pending);

    let record = idem.record(&key).await.unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Pending);
    assert_eq!(record.key, key.as_str());
}

#[tokio::test]
async fn completed_record_replays_result() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    idem.check(&key).await.unwrap();
    idem.complete(&key, serde_json::json!({"ok": true}))
        .await
        .unwrap();

    assert_eq!(
        idem.check(&key).await.unwrap(),
        CheckOutcome::Completed(serde_json::json!({"ok": true}))
    );
}

#[tokio::test]
async fn complete_requires_pending_record() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    let absent = idem.complete(&key, serde_json::Value::Null).await;
    assert!(matches!(
        absent,
        Err(CoordinationError::RecordNotPending { ref status, .. }) if status == "absent"
    ));

    idem.check(&key).await.unwrap();
    idem.complete(&key, serde_json::Value::Null).await.unwrap();
    let again = idem.fail(&key, "late failure").await;
    assert!(matches!(
        again,
        Err(CoordinationError::RecordNotPending { ref status, .. }) if status == "completed"
    ));
}

#[tokio::test]
async fn failed_record_is_retryable() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    idem.check(&key).await.unwrap();
    idem.fail(&key, "gateway timeout").await.unwrap();

    assert_eq!(
        idem.check(&key).await.unwrap(),
        CheckOutcome::Proceed { attempt: 2 }
    );
    let record = idem.record(&key).await.unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Pending);
    assert_eq!(record.error, None);
}

#[tokio::test]
async fn stale_pending_record_is_reclaimed() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    idem.check(&key).await.unwrap();
    store.clock().advance(PENDING_TIMEOUT - Duration::from_millis(1));
    assert_eq!(idem.check(&key).await.unwrap(), CheckOutcome::Pending);

    store.clock().advance(Duration::from_millis(1));
    assert_eq!(
        idem.check(&key).await.unwrap(),
        CheckOutcome::Proceed { attempt: 2 }
    );
    // Timestamp was reset, so the reclaimed attempt is fresh again
    assert_eq!(idem.check(&key).await.unwrap(), CheckOutcome::Pending);
}

// Two callers see the same stale record at once; only one may win the reset.
#[tokio::test(start_paused = true)]
async fn simultaneous_stale_reclaims_have_one_winner() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    idem.check(&key).await.unwrap();
    store.clock().advance(PENDING_TIMEOUT * 2);
    store.set_latency(Some(Duration::from_millis(1)));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let idem = idem.clone();
            let key = key.clone();
            tokio::spawn(async move { idem.check(&key).await.unwrap() })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    let winners = outcomes
        .iter()
        .filter(|o| matches!(o, CheckOutcome::Proceed { .. }))
        .count();
    assert_eq!(winners, 1, "outcomes: {:?}", outcomes);
    assert!(outcomes.contains(&CheckOutcome::Proceed { attempt: 2 }));
}

// Five redeliveries of one webhook create exactly one payment.
#[tokio::test(start_paused = true)]
async fn concurrent_duplicate_webhooks_create_one_payment() {
    let store = FakeLockStore::new();
    store.set_latency(Some(Duration::from_millis(1)));
    let idem = coordinator(&store);
    let created = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let idem = idem.clone();
            let created = created.clone();
            tokio::spawn(async move {
                idem.execute(&webhook_key(), || async {
                    created.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, std::io::Error>(Payment {
                        id: "pay_1".to_string(),
                        amount_cents: 1500,
                    })
                })
                .await
            })
        })
        .collect();

    let mut paid = 0;
    let mut pending = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(payment) => {
                assert_eq!(payment.id, "pay_1");
                paid += 1;
            }
            Err(GuardedError::Coordination(CoordinationError::OperationPending { .. })) => {
                pending += 1
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(paid + pending, 5);
    assert!(paid >= 1);

    // A later redelivery replays the stored payment
    let replay: Payment = idem
        .execute(&webhook_key(), || async {
            Err::<Payment, _>(std::io::Error::other("must not run"))
        })
        .await
        .unwrap();
    assert_eq!(replay.amount_cents, 1500);
}

#[tokio::test]
async fn completed_execute_does_not_run_second_operation() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();
    let calls = AtomicU32::new(0);

    let first: u64 = idem
        .execute(&key, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(41)
        })
        .await
        .unwrap();
    let second: u64 = idem
        .execute(&key, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(99)
        })
        .await
        .unwrap();

    assert_eq!((first, second), (41, 41));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_execute_records_failure_and_allows_retry() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    let first = idem
        .execute(&key, || async {
            Err::<u64, _>(std::io::Error::other("card declined"))
        })
        .await;
    match first {
        Err(GuardedError::Operation(e)) => assert_eq!(e.to_string(), "card declined"),
        other => panic!("expected operation error, got {:?}", other),
    }

    let lookup = idem.lookup::<u64>(&key).await;
    assert!(matches!(
        lookup,
        Err(CoordinationError::OperationFailed { ref reason, .. }) if reason == "card declined"
    ));

    let second: u64 = idem
        .execute(&key, || async { Ok::<_, std::io::Error>(7) })
        .await
        .unwrap();
    assert_eq!(second, 7);
    assert_eq!(idem.record(&key).await.unwrap().unwrap().attempts, 2);
}

#[tokio::test]
async fn lookup_reports_each_status() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    assert_eq!(idem.lookup::<Payment>(&key).await.unwrap(), None);

    idem.check(&key).await.unwrap();
    assert!(matches!(
        idem.lookup::<Payment>(&key).await,
        Err(CoordinationError::OperationPending { .. })
    ));

    let payment = Payment {
        id: "pay_9".to_string(),
        amount_cents: 250,
    };
    idem.complete(&key, serde_json::to_value(&payment).unwrap())
        .await
        .unwrap();
    assert_eq!(idem.lookup::<Payment>(&key).await.unwrap(), Some(payment));
}

#[tokio::test]
async fn failure_to_record_completion_still_returns_result() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    let result = idem
        .execute(&key, || async {
            store.fail_on(StoreOp::CompareAndSwap);
            Ok::<_, std::io::Error>(1u64)
        })
        .await;

    assert_eq!(result.unwrap(), 1);
    // Left pending; a redelivery within the timeout is not re-executed
    store.clear_failures();
    assert_eq!(idem.check(&key).await.unwrap(), CheckOutcome::Pending);
}

// The first attempt runs longer than the pending timeout, a redelivery
// reclaims the key and completes it. The first attempt's side effect has
// happened, so it still reports its own value.
#[tokio::test]
async fn completion_after_takeover_returns_result() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();

    let result = idem
        .execute(&key, || async {
            store.clock().advance(PENDING_TIMEOUT);
            assert_eq!(
                idem.check(&key).await.unwrap(),
                CheckOutcome::Proceed { attempt: 2 }
            );
            idem.complete(&key, serde_json::json!(2)).await.unwrap();
            Ok::<_, std::io::Error>(1u64)
        })
        .await;

    assert_eq!(result.unwrap(), 1);
    // The takeover's completion is the recorded one
    assert_eq!(idem.lookup::<u64>(&key).await.unwrap(), Some(2));
    let record = idem.record(&key).await.unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Completed);
    assert_eq!(record.attempts, 2);
}

#[tokio::test]
async fn corrupted_record_is_reported() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);
    let key = webhook_key();
    store.put(&key.store_key(), "{not json").await.unwrap();

    assert!(matches!(
        idem.check(&key).await,
        Err(CoordinationError::Store(StoreError::Corrupted { .. }))
    ));
}

#[tokio::test]
async fn records_lists_every_key() {
    let store = FakeLockStore::new();
    let idem = coordinator(&store);

    idem.check(&IdempotencyKey::new("b")).await.unwrap();
    idem.check(&IdempotencyKey::new("a")).await.unwrap();
    idem.fail(&IdempotencyKey::new("a"), "boom").await.unwrap();

    let records = idem.records().await.unwrap();
    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.key.as_str(), r.status))
        .collect();
    assert_eq!(
        summary,
        vec![("a", IdempotencyStatus::Failed), ("b", IdempotencyStatus::Pending)]
    );
}
