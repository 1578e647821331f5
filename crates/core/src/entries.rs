// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed entries with optional expiry
//!
//! The conditional write rules shared by every store implementation. Callers
//! are responsible for making each method call exclusive (a mutex in memory,
//! an advisory file lock on disk).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored value and the time at which it stops being visible
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

impl StoredEntry {
    pub fn is_live(&self, now_ms: u64) -> bool {
        !matches!(self.expires_at_ms, Some(at) if at <= now_ms)
    }
}

/// Entries keyed by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryMap {
    entries: BTreeMap<String, StoredEntry>,
}

impl EntryMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, key: &str, now_ms: u64) -> Option<&StoredEntry> {
        self.entries.get(key).filter(|e| e.is_live(now_ms))
    }

    pub fn get(&self, key: &str, now_ms: u64) -> Option<&str> {
        self.live(key, now_ms).map(|e| e.value.as_str())
    }

    /// Expiry of a live entry, `None` if absent, expired or non-expiring
    pub fn expires_at(&self, key: &str, now_ms: u64) -> Option<u64> {
        self.live(key, now_ms).and_then(|e| e.expires_at_ms)
    }

    pub fn set_if_absent_or_expired(
        &mut self,
        key: &str,
        value: &str,
        expires_at_ms: u64,
        now_ms: u64,
    ) -> bool {
        if self.live(key, now_ms).is_some() {
            return false;
        }
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at_ms: Some(expires_at_ms),
            },
        );
        true
    }

    pub fn compare_and_delete(&mut self, key: &str, expected: &str, now_ms: u64) -> bool {
        match self.live(key, now_ms) {
            Some(entry) if entry.value == expected => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn compare_and_swap(
        &mut self,
        key: &str,
        expected: Option<&str>,
        new_value: &str,
        now_ms: u64,
    ) -> bool {
        let current = self.get(key, now_ms);
        if current != expected {
            return false;
        }
        self.put(key, new_value);
        true
    }

    pub fn put(&mut self, key: &str, value: &str) {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at_ms: None,
            },
        );
    }

    pub fn entries(&self, prefix: &str, now_ms: u64) -> Vec<(String, String)> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| e.is_live(now_ms))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now_ms));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "entries_tests.rs"]
mod tests;
