// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake lock store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tally_core::{FakeClock, LockStore, MemoryStore, StoreError};

/// Store operation kinds, used to target injected failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    SetIfAbsent,
    CompareAndDelete,
    CompareAndSwap,
    Get,
    Put,
    Entries,
}

/// Recorded store call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    SetIfAbsent { key: String, value: String, ttl: Duration },
    CompareAndDelete { key: String, expected: String },
    CompareAndSwap { key: String, expected: Option<String>, new_value: String },
    Get { key: String },
    Put { key: String, value: String },
    Entries { prefix: String },
}

/// In-memory store with a controllable clock, call recording, injected
/// failures, optional per-call latency and stalled replies
#[derive(Clone, Default)]
pub struct FakeLockStore {
    inner: MemoryStore<FakeClock>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    failing: Arc<Mutex<HashSet<StoreOp>>>,
    latency: Arc<Mutex<Option<Duration>>>,
    stalls: Arc<Mutex<HashMap<StoreOp, Duration>>>,
}

impl FakeLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock used for entry expiry
    pub fn clock(&self) -> &FakeClock {
        self.inner.clock()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make every future call of `op` fail with `StoreError::Unavailable`
    pub fn fail_on(&self, op: StoreOp) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op);
    }

    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Sleep this long before every call, widening race windows
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Hold back the reply of the next `op` call for `delay`.
    ///
    /// The call itself is applied immediately; only the caller waits, as if
    /// the response were slow on the wire.
    pub fn stall_next(&self, op: StoreOp, delay: Duration) {
        self.stalls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op, delay);
    }

    async fn leave(&self, op: StoreOp) {
        let stall = self
            .stalls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&op);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
    }

    async fn enter(&self, op: StoreOp, call: StoreCall) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&op);
        if failing {
            return Err(StoreError::Unavailable(format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl LockStore for FakeLockStore {
    async fn set_if_absent_or_expired(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.enter(
            StoreOp::SetIfAbsent,
            StoreCall::SetIfAbsent {
                key: key.to_string(),
                value: value.to_string(),
                ttl,
            },
        )
        .await?;
        let result = self.inner.set_if_absent_or_expired(key, value, ttl).await;
        self.leave(StoreOp::SetIfAbsent).await;
        result
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.enter(
            StoreOp::CompareAndDelete,
            StoreCall::CompareAndDelete {
                key: key.to_string(),
                expected: expected.to_string(),
            },
        )
        .await?;
        let result = self.inner.compare_and_delete(key, expected).await;
        self.leave(StoreOp::CompareAndDelete).await;
        result
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        self.enter(
            StoreOp::CompareAndSwap,
            StoreCall::CompareAndSwap {
                key: key.to_string(),
                expected: expected.map(str::to_string),
                new_value: new_value.to_string(),
            },
        )
        .await?;
        let result = self.inner.compare_and_swap(key, expected, new_value).await;
        self.leave(StoreOp::CompareAndSwap).await;
        result
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.enter(StoreOp::Get, StoreCall::Get { key: key.to_string() })
            .await?;
        let result = self.inner.get(key).await;
        self.leave(StoreOp::Get).await;
        result
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.enter(
            StoreOp::Put,
            StoreCall::Put {
                key: key.to_string(),
                value: value.to_string(),
            },
        )
        .await?;
        let result = self.inner.put(key, value).await;
        self.leave(StoreOp::Put).await;
        result
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.enter(
            StoreOp::Entries,
            StoreCall::Entries {
                prefix: prefix.to_string(),
            },
        )
        .await?;
        let result = self.inner.entries(prefix).await;
        self.leave(StoreOp::Entries).await;
        result
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
