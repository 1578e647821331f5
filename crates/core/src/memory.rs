// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process lock store
//!
//! Shares one entry map between clones. Suitable for a single process and for
//! tests; multi-process deployments need a store every process can reach
//! (see `tally-storage`).

use crate::clock::{duration_ms, Clock, SystemClock};
use crate::entries::EntryMap;
use crate::store::{LockStore, StoreError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Lock store backed by a mutex-guarded map
#[derive(Clone, Debug, Default)]
pub struct MemoryStore<C: Clock = SystemClock> {
    entries: Arc<Mutex<EntryMap>>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Arc::new(Mutex::new(EntryMap::new())),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn lock(&self) -> MutexGuard<'_, EntryMap> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the raw entries (including expired ones)
    pub fn snapshot(&self) -> EntryMap {
        self.lock().clone()
    }

    /// Remove expired entries
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        self.lock().purge_expired(now)
    }
}

#[async_trait]
impl<C: Clock> LockStore for MemoryStore<C> {
    async fn set_if_absent_or_expired(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        let expires_at = now.saturating_add(duration_ms(ttl));
        Ok(self.lock().set_if_absent_or_expired(key, value, expires_at, now))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        Ok(self.lock().compare_and_delete(key, expected, now))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        Ok(self.lock().compare_and_swap(key, expected, new_value, now))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_ms();
        Ok(self.lock().get(key, now).map(str::to_string))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().put(key, value);
        Ok(())
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let now = self.clock.now_ms();
        Ok(self.lock().entries(prefix, now))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
