// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced store wrapper for consistent observability

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tally_core::{LockStore, StoreError};
use tracing::Instrument;

/// Wrapper that adds tracing to any LockStore
#[derive(Clone, Debug)]
pub struct TracedLockStore<S> {
    inner: S,
}

impl<S> TracedLockStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[async_trait]
impl<S: LockStore> LockStore for TracedLockStore<S> {
    async fn set_if_absent_or_expired(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let span = tracing::info_span!("store.set_if_absent", key, ttl_ms = ttl.as_millis() as u64);
        async {
            let start = Instant::now();
            let result = self.inner.set_if_absent_or_expired(key, value, ttl).await;
            match &result {
                Ok(granted) => tracing::debug!(granted, elapsed_ms = elapsed_ms(start), "set"),
                Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "set failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let span = tracing::info_span!("store.compare_and_delete", key);
        async {
            let result = self.inner.compare_and_delete(key, expected).await;
            match &result {
                Ok(true) => tracing::debug!("deleted"),
                // Mismatch is an expected outcome for late releases
                Ok(false) => tracing::debug!("value mismatch, kept"),
                Err(e) => tracing::error!(error = %e, "delete failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        let span = tracing::info_span!("store.compare_and_swap", key, create = expected.is_none());
        async {
            let start = Instant::now();
            let result = self.inner.compare_and_swap(key, expected, new_value).await;
            match &result {
                Ok(swapped) => tracing::debug!(swapped, elapsed_ms = elapsed_ms(start), "swap"),
                Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "swap failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result = self.inner.get(key).await;
        tracing::trace!(key, found = ?result.as_ref().ok().map(Option::is_some), "read");
        result
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.put", key);
        async {
            let result = self.inner.put(key, value).await;
            match &result {
                Ok(()) => tracing::debug!(value_len = value.len(), "written"),
                Err(e) => tracing::error!(error = %e, "write failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let result = self.inner.entries(prefix).await;
        tracing::trace!(
            prefix,
            count = result.as_ref().map(|v| v.len()).ok(),
            "listed entries"
        );
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
