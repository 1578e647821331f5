// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named, TTL-bounded exclusive locks
//!
//! `acquire` is a single conditional set and never waits; waiting belongs to
//! the retry coordinator. `release` is a single compare-and-delete on the
//! acquisition token, so a holder that stalled past its TTL cannot remove a
//! lock that has since been granted to someone else.

use std::time::Duration;
use tally_core::lock::{lock_key, LOCK_KEY_PREFIX};
use tally_core::{IdGen, LockStore, LockToken, UuidIdGen};
use tracing::{debug, warn};

use crate::error::CoordinationError;

/// Acquires and releases locks against a shared store
#[derive(Clone, Debug)]
pub struct LockManager<S, G = UuidIdGen> {
    store: S,
    ids: G,
}

impl<S: LockStore> LockManager<S, UuidIdGen> {
    pub fn new(store: S) -> Self {
        Self::with_ids(store, UuidIdGen)
    }
}

impl<S: LockStore, G: IdGen> LockManager<S, G> {
    pub fn with_ids(store: S, ids: G) -> Self {
        Self { store, ids }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Try once to take the lock; `None` when someone else holds it
    pub async fn acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<LockToken>, CoordinationError> {
        let token = LockToken::new(self.ids.next());
        let granted = self
            .store
            .set_if_absent_or_expired(&lock_key(resource), token.as_str(), ttl)
            .await?;

        if granted {
            debug!(resource, token = %token, ttl_ms = ttl.as_millis() as u64, "lock acquired");
            Ok(Some(token))
        } else {
            debug!(resource, "lock held elsewhere");
            Ok(None)
        }
    }

    /// Release the lock if `token` still holds it.
    ///
    /// Returns `false` when the lock had already expired or passed to another
    /// holder; that is logged and otherwise ignored.
    pub async fn release(&self, resource: &str, token: &LockToken) -> Result<bool, CoordinationError> {
        let released = self
            .store
            .compare_and_delete(&lock_key(resource), token.as_str())
            .await?;

        if released {
            debug!(resource, token = %token, "lock released");
        } else {
            warn!(
                resource,
                token = %token,
                "lock release mismatch: lock expired or is held by another token"
            );
        }
        Ok(released)
    }

    /// Token of the current live holder, if any
    pub async fn holder(&self, resource: &str) -> Result<Option<LockToken>, CoordinationError> {
        Ok(self.store.get(&lock_key(resource)).await?.map(LockToken::new))
    }

    /// Every live lock as `(resource, token)`, sorted by resource
    pub async fn held(&self) -> Result<Vec<(String, LockToken)>, CoordinationError> {
        let entries = self.store.entries(LOCK_KEY_PREFIX).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, token)| {
                key.strip_prefix(LOCK_KEY_PREFIX)
                    .map(|resource| (resource.to_string(), LockToken::new(token)))
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
