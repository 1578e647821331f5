// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock store adapter contract
//!
//! All coordination state lives behind this trait. Every implementation must
//! make each method atomic with respect to every other caller of the same
//! store, including callers in other processes; nothing above this layer adds
//! in-process locking.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupted value at {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

/// Shared key-value store with the atomic primitives coordination relies on
#[async_trait]
pub trait LockStore: Clone + Send + Sync + 'static {
    /// Write `value` with an expiry of `now + ttl` if the key is absent or expired
    async fn set_if_absent_or_expired(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete the key only if its live value equals `expected`
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Replace the value only if it currently equals `expected`
    ///
    /// `expected = None` means "create only if absent". The new value never expires.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool, StoreError>;

    /// Read a live value; expired entries read as absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditionally write a non-expiring value
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Live entries whose key starts with `prefix`, sorted by key
    async fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}
