// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent execution keyed by caller-supplied identifiers
//!
//! The record state machine lives in `tally_core::idempotency`; this module
//! applies it to the store. Every write is a compare-and-swap against the
//! exact serialized record that was read, so of several callers racing on the
//! same record (new key, stale pending, failed retry) exactly one wins and the
//! rest re-read and see the winner's pending record.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tally_core::idempotency::RECORD_KEY_PREFIX;
use tally_core::{
    CheckDecision, ClaimReason, Clock, IdempotencyKey, IdempotencyRecord, IdempotencySettings,
    IdempotencyStatus, LockStore, StoreError, SystemClock,
};
use tracing::{debug, info, warn};

use crate::error::{CoordinationError, GuardedError};

/// What a caller should do after [`IdempotencyCoordinator::check`]
#[derive(Clone, Debug, PartialEq)]
pub enum CheckOutcome {
    /// Not a duplicate: run the operation, then `complete` or `fail`
    Proceed { attempt: u32 },
    /// Duplicate of an attempt still in flight: do not run
    Pending,
    /// Duplicate of a completed attempt: use the cached result
    Completed(serde_json::Value),
}

/// Applies idempotency records to a shared store
#[derive(Clone, Debug)]
pub struct IdempotencyCoordinator<S, C = SystemClock> {
    store: S,
    clock: C,
    settings: IdempotencySettings,
}

impl<S: LockStore> IdempotencyCoordinator<S, SystemClock> {
    pub fn new(store: S, settings: IdempotencySettings) -> Self {
        Self::with_clock(store, SystemClock, settings)
    }
}

impl<S: LockStore, C: Clock> IdempotencyCoordinator<S, C> {
    pub fn with_clock(store: S, clock: C, settings: IdempotencySettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &IdempotencySettings {
        &self.settings
    }

    /// Decide whether the caller may execute the operation for `key`
    pub async fn check(&self, key: &IdempotencyKey) -> Result<CheckOutcome, CoordinationError> {
        let store_key = key.store_key();

        for _ in 0..self.settings.max_cas_attempts {
            let current = self.read(key).await?;
            let now_ms = self.clock.now_ms();
            let decision = IdempotencyRecord::on_check(
                current.as_ref().map(|(_, record)| record),
                key,
                now_ms,
                self.settings.pending_timeout,
            );

            let (record, reason) = match decision {
                CheckDecision::InFlight { age_ms } => {
                    debug!(key = %key, age_ms, "duplicate, still pending");
                    return Ok(CheckOutcome::Pending);
                }
                CheckDecision::Replay(result) => {
                    debug!(key = %key, "duplicate, replaying completed result");
                    return Ok(CheckOutcome::Completed(result));
                }
                CheckDecision::Claim { record, reason } => (record, reason),
            };

            let new_value = serde_json::to_string(&record)?;
            let expected = current.as_ref().map(|(raw, _)| raw.as_str());
            if !self
                .store
                .compare_and_swap(&store_key, expected, &new_value)
                .await?
            {
                debug!(key = %key, "record changed underneath check, re-reading");
                continue;
            }

            match reason {
                ClaimReason::New => debug!(key = %key, "claimed new key"),
                ClaimReason::Retry => {
                    info!(key = %key, attempt = record.attempts, "retrying failed operation")
                }
                ClaimReason::Abandoned => warn!(
                    key = %key,
                    attempt = record.attempts,
                    "reclaimed abandoned pending record"
                ),
            }
            return Ok(CheckOutcome::Proceed {
                attempt: record.attempts,
            });
        }

        Err(CoordinationError::Contention {
            key: key.to_string(),
            attempts: self.settings.max_cas_attempts,
        })
    }

    /// Mark the pending attempt for `key` completed with `result`
    pub async fn complete(
        &self,
        key: &IdempotencyKey,
        result: serde_json::Value,
    ) -> Result<(), CoordinationError> {
        self.finish(key, |record| record.completed(result.clone()))
            .await
    }

    /// Mark the pending attempt for `key` failed
    pub async fn fail(&self, key: &IdempotencyKey, reason: &str) -> Result<(), CoordinationError> {
        self.finish(key, |record| record.failed(reason)).await
    }

    /// Run `op` at most once per key.
    ///
    /// A completed key returns its cached result without calling `op`; a key
    /// still in flight fails with `OperationPending`. Errors from `op` are
    /// recorded as a failed attempt and returned as
    /// [`GuardedError::Operation`]. Once `op` has returned, its outcome is
    /// what the caller gets; failing to record it is only logged.
    pub async fn execute<T, E, F, Fut>(
        &self,
        key: &IdempotencyKey,
        op: F,
    ) -> Result<T, GuardedError<E>>
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.check(key).await? {
            CheckOutcome::Pending => Err(CoordinationError::OperationPending {
                key: key.to_string(),
            }
            .into()),
            CheckOutcome::Completed(cached) => {
                Ok(serde_json::from_value(cached).map_err(CoordinationError::from)?)
            }
            CheckOutcome::Proceed { .. } => match op().await {
                Ok(value) => {
                    // `op` has run; its value stands even if the record
                    // cannot say so. The key is reclaimed after the pending
                    // timeout, or already was if this is RecordNotPending.
                    let recorded = match serde_json::to_value(&value) {
                        Ok(result) => self.complete(key, result).await,
                        Err(e) => Err(CoordinationError::from(e)),
                    };
                    if let Err(record_err) = recorded {
                        warn!(
                            key = %key,
                            error = %record_err,
                            "could not record completed attempt"
                        );
                    }
                    Ok(value)
                }
                Err(e) => {
                    if let Err(record_err) = self.fail(key, &e.to_string()).await {
                        warn!(
                            key = %key,
                            error = %record_err,
                            "could not record failed attempt (will be reclaimed after pending timeout)"
                        );
                    }
                    Err(GuardedError::Operation(e))
                }
            },
        }
    }

    /// Cached result for `key` without claiming it.
    ///
    /// `Ok(None)` if the key was never checked; errors if the latest attempt
    /// is still pending or failed.
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<T>, CoordinationError> {
        let Some((_, record)) = self.read(key).await? else {
            return Ok(None);
        };

        match record.status {
            IdempotencyStatus::Pending => Err(CoordinationError::OperationPending {
                key: key.to_string(),
            }),
            IdempotencyStatus::Failed => Err(CoordinationError::OperationFailed {
                key: key.to_string(),
                reason: record.error.unwrap_or_default(),
            }),
            IdempotencyStatus::Completed => {
                let result = record.result.unwrap_or(serde_json::Value::Null);
                Ok(Some(serde_json::from_value(result)?))
            }
        }
    }

    /// Stored record for `key`, if any
    pub async fn record(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, CoordinationError> {
        Ok(self.read(key).await?.map(|(_, record)| record))
    }

    /// Every stored record, sorted by key
    pub async fn records(&self) -> Result<Vec<IdempotencyRecord>, CoordinationError> {
        let entries = self.store.entries(RECORD_KEY_PREFIX).await?;
        entries
            .into_iter()
            .map(|(key, raw)| {
                serde_json::from_str(&raw).map_err(|e| {
                    CoordinationError::Store(StoreError::Corrupted {
                        key,
                        reason: e.to_string(),
                    })
                })
            })
            .collect()
    }

    async fn finish<F>(&self, key: &IdempotencyKey, transition: F) -> Result<(), CoordinationError>
    where
        F: Fn(&IdempotencyRecord) -> Option<IdempotencyRecord>,
    {
        let store_key = key.store_key();

        for _ in 0..self.settings.max_cas_attempts {
            let Some((raw, record)) = self.read(key).await? else {
                return Err(CoordinationError::RecordNotPending {
                    key: key.to_string(),
                    status: "absent".to_string(),
                });
            };
            let Some(next) = transition(&record) else {
                return Err(CoordinationError::RecordNotPending {
                    key: key.to_string(),
                    status: record.status.to_string(),
                });
            };

            let new_value = serde_json::to_string(&next)?;
            if self
                .store
                .compare_and_swap(&store_key, Some(&raw), &new_value)
                .await?
            {
                debug!(key = %key, status = %next.status, "idempotency record finished");
                return Ok(());
            }
        }

        Err(CoordinationError::Contention {
            key: key.to_string(),
            attempts: self.settings.max_cas_attempts,
        })
    }

    /// Raw stored text alongside the parsed record; the raw text is the
    /// compare-and-swap witness for the next write.
    async fn read(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<(String, IdempotencyRecord)>, CoordinationError> {
        let store_key = key.store_key();
        let Some(raw) = self.store.get(&store_key).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupted {
            key: store_key,
            reason: e.to_string(),
        })?;
        Ok(Some((raw, record)))
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
