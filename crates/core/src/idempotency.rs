// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency record state machine
//!
//! One record per key, stored as JSON under `idem:<key>`:
//!
//! ```text
//! absent    --check-->                   pending
//! pending   --check, fresh-->            pending   (in flight, do not run)
//! pending   --check, stale-->            pending   (abandoned, timestamp reset)
//! pending   --complete(result)-->        completed
//! pending   --fail(reason)-->            failed
//! completed --check-->                   completed (replay cached result)
//! failed    --check-->                   pending   (failures are retryable)
//! ```
//!
//! The functions here are pure; the engine applies each claim to the store
//! with a single compare-and-swap against the exact record it read.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::clock::duration_ms;

/// Store key prefix for idempotency records
pub const RECORD_KEY_PREFIX: &str = "idem:";

/// Caller-supplied identifier for one logical operation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Deterministic key for an upstream event, e.g. a payment provider's
    /// webhook event id. Redeliveries of the same event map to the same key.
    pub fn derive(source: &str, external_id: &str) -> Self {
        let digest = Sha256::digest(external_id.as_bytes());
        Self(format!("{}:{:x}", source, digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn store_key(&self) -> String {
        format!("{}{}", RECORD_KEY_PREFIX, self.0)
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdempotencyStatus::Pending => write!(f, "pending"),
            IdempotencyStatus::Completed => write!(f, "completed"),
            IdempotencyStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted state for one idempotency key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub status: IdempotencyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the current pending attempt started (Unix ms)
    pub created_at_ms: u64,
    /// Executions started for this key
    pub attempts: u32,
}

/// Why a check granted the caller permission to execute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimReason {
    /// No record existed
    New,
    /// A pending record outlived the pending timeout
    Abandoned,
    /// The previous attempt failed
    Retry,
}

/// Outcome of evaluating a check against the current record
#[derive(Clone, Debug, PartialEq)]
pub enum CheckDecision {
    /// Write `record` (conditionally) and run the operation
    Claim {
        record: IdempotencyRecord,
        reason: ClaimReason,
    },
    /// Another attempt is running; do not execute
    InFlight { age_ms: u64 },
    /// Already completed; return the cached result
    Replay(serde_json::Value),
}

impl IdempotencyRecord {
    pub fn pending(key: &IdempotencyKey, now_ms: u64, attempts: u32) -> Self {
        Self {
            key: key.as_str().to_string(),
            status: IdempotencyStatus::Pending,
            result: None,
            error: None,
            created_at_ms: now_ms,
            attempts,
        }
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    /// Evaluate a check against the record currently stored (if any)
    pub fn on_check(
        current: Option<&IdempotencyRecord>,
        key: &IdempotencyKey,
        now_ms: u64,
        pending_timeout: Duration,
    ) -> CheckDecision {
        let Some(record) = current else {
            return CheckDecision::Claim {
                record: Self::pending(key, now_ms, 1),
                reason: ClaimReason::New,
            };
        };

        match record.status {
            IdempotencyStatus::Pending => {
                let age_ms = record.age_ms(now_ms);
                if age_ms < duration_ms(pending_timeout) {
                    CheckDecision::InFlight { age_ms }
                } else {
                    CheckDecision::Claim {
                        record: record.reclaimed(now_ms),
                        reason: ClaimReason::Abandoned,
                    }
                }
            }
            IdempotencyStatus::Completed => {
                CheckDecision::Replay(record.result.clone().unwrap_or(serde_json::Value::Null))
            }
            IdempotencyStatus::Failed => CheckDecision::Claim {
                record: record.reclaimed(now_ms),
                reason: ClaimReason::Retry,
            },
        }
    }

    fn reclaimed(&self, now_ms: u64) -> Self {
        Self {
            key: self.key.clone(),
            status: IdempotencyStatus::Pending,
            result: None,
            error: None,
            created_at_ms: now_ms,
            attempts: self.attempts.saturating_add(1),
        }
    }

    /// `pending -> completed`; `None` from any other status
    pub fn completed(&self, result: serde_json::Value) -> Option<Self> {
        (self.status == IdempotencyStatus::Pending).then(|| Self {
            status: IdempotencyStatus::Completed,
            result: Some(result),
            error: None,
            ..self.clone()
        })
    }

    /// `pending -> failed`; `None` from any other status
    pub fn failed(&self, reason: impl Into<String>) -> Option<Self> {
        (self.status == IdempotencyStatus::Pending).then(|| Self {
            status: IdempotencyStatus::Failed,
            result: None,
            error: Some(reason.into()),
            ..self.clone()
        })
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
