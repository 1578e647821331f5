// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gapless per-scope sequences
//!
//! Each `get_next` reads the scope's counter, adds one and persists it, all
//! under the scope's lock. The persist is the only write: if it fails the
//! stored counter is unchanged and the error reaches the caller, so no value
//! is ever consumed without being returned.
//!
//! The persist is a compare-and-swap against the exact text that was read.
//! A holder that stalls past its TTL can lose the lock to another caller; its
//! swap is then refused and it reports `LockLost` instead of a number the
//! new holder has already issued.

use tally_core::sequence::parse_counter;
use tally_core::{IdGen, LockStore, RetryPolicy, SequenceScope, StoreError, UuidIdGen};
use tracing::{debug, warn};

use crate::error::CoordinationError;
use crate::retry::RetryCoordinator;

/// Issues gapless sequence numbers per scope
#[derive(Clone, Debug)]
pub struct SequenceGenerator<S, G = UuidIdGen> {
    store: S,
    retry: RetryCoordinator<S, G>,
    policy: RetryPolicy,
}

impl<S: LockStore, G: IdGen> SequenceGenerator<S, G> {
    pub fn new(retry: RetryCoordinator<S, G>, policy: RetryPolicy) -> Self {
        Self {
            store: retry.locks().store().clone(),
            retry,
            policy,
        }
    }

    /// Next value for `scope`, starting at 1
    pub async fn get_next(&self, scope: &SequenceScope) -> Result<u64, CoordinationError> {
        let counter_key = scope.counter_key();
        let store = &self.store;

        self.retry
            .with_lock(&scope.lock_resource(), &self.policy, || async {
                let raw = store.get(&counter_key).await?;
                let current = parse(&counter_key, raw.as_deref())?;
                let next = current.checked_add(1).ok_or_else(|| {
                    CoordinationError::Store(StoreError::Corrupted {
                        key: counter_key.clone(),
                        reason: "counter overflow".to_string(),
                    })
                })?;

                let saved = store
                    .compare_and_swap(&counter_key, raw.as_deref(), &next.to_string())
                    .await?;
                if !saved {
                    warn!(scope = %scope, value = next, "counter moved under us, lock was lost");
                    return Err(CoordinationError::LockLost {
                        resource: scope.lock_resource(),
                    });
                }
                debug!(scope = %scope, value = next, "sequence advanced");
                Ok::<_, CoordinationError>(next)
            })
            .await
            .map_err(|e| e.flatten())
    }

    /// Next fiscal document number for an organization and document type.
    ///
    /// Call exactly once per logical document; every call consumes a number.
    pub async fn get_next_invoice_number(
        &self,
        organization_id: &str,
        document_type: &str,
    ) -> Result<u64, CoordinationError> {
        self.get_next(&SequenceScope::invoice(organization_id, document_type))
            .await
    }

    /// Last issued value for `scope` (0 if none), without advancing it
    pub async fn current(&self, scope: &SequenceScope) -> Result<u64, CoordinationError> {
        read_counter(&self.store, &scope.counter_key()).await
    }
}

async fn read_counter<S: LockStore>(store: &S, key: &str) -> Result<u64, CoordinationError> {
    let raw = store.get(key).await?;
    parse(key, raw.as_deref())
}

fn parse(key: &str, raw: Option<&str>) -> Result<u64, CoordinationError> {
    parse_counter(raw).map_err(|e| {
        CoordinationError::Store(StoreError::Corrupted {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}

#[cfg(test)]
#[path = "sequence_tests.rs"]
mod tests;
