// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for coordination
//!
//! Coordination failures ("could not get exclusive access", "already in
//! flight") are kept apart from failures of the caller's own operation so
//! callers can answer them differently.

use std::fmt;
use std::time::Duration;
use tally_core::StoreError;
use thiserror::Error;

/// Failures of the coordinator's own bookkeeping
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("lock acquisition timeout for {resource} after {attempts} attempts")]
    LockAcquisitionTimeout { resource: String, attempts: u32 },
    #[error("deadline of {deadline:?} exceeded acquiring lock for {resource}")]
    DeadlineExceeded { resource: String, deadline: Duration },
    #[error("lock on {resource} expired before the update was saved")]
    LockLost { resource: String },
    #[error("operation {key} is pending, try later")]
    OperationPending { key: String },
    #[error("operation {key} previously failed: {reason}")]
    OperationFailed { key: String, reason: String },
    #[error("idempotency record {key} is {status}, expected pending")]
    RecordNotPending { key: String, status: String },
    #[error("gave up on {key} after {attempts} conflicting updates")]
    Contention { key: String, attempts: u32 },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoordinationError {
    /// Whether the same request may succeed if retried later
    pub fn is_retryable(&self) -> bool {
        match self {
            CoordinationError::LockAcquisitionTimeout { .. }
            | CoordinationError::DeadlineExceeded { .. }
            | CoordinationError::LockLost { .. }
            | CoordinationError::OperationPending { .. }
            | CoordinationError::OperationFailed { .. }
            | CoordinationError::Contention { .. } => true,
            CoordinationError::Store(StoreError::Unavailable(_) | StoreError::Io(_)) => true,
            CoordinationError::Store(_)
            | CoordinationError::RecordNotPending { .. }
            | CoordinationError::Json(_) => false,
        }
    }
}

/// Result of a coordinated operation: either coordination failed, or the
/// operation ran and returned its own error
#[derive(Debug)]
pub enum GuardedError<E> {
    Coordination(CoordinationError),
    Operation(E),
}

impl<E> GuardedError<E> {
    pub fn coordination(&self) -> Option<&CoordinationError> {
        match self {
            GuardedError::Coordination(e) => Some(e),
            GuardedError::Operation(_) => None,
        }
    }

    pub fn into_operation(self) -> Option<E> {
        match self {
            GuardedError::Coordination(_) => None,
            GuardedError::Operation(e) => Some(e),
        }
    }
}

impl GuardedError<CoordinationError> {
    /// Collapse when the operation itself reports coordination errors
    pub fn flatten(self) -> CoordinationError {
        match self {
            GuardedError::Coordination(e) | GuardedError::Operation(e) => e,
        }
    }
}

impl<E> From<CoordinationError> for GuardedError<E> {
    fn from(e: CoordinationError) -> Self {
        GuardedError::Coordination(e)
    }
}

impl<E: fmt::Display> fmt::Display for GuardedError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardedError::Coordination(e) => write!(f, "{}", e),
            GuardedError::Operation(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GuardedError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GuardedError::Coordination(e) => Some(e),
            GuardedError::Operation(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn timeout() -> CoordinationError {
        CoordinationError::LockAcquisitionTimeout {
            resource: "seq:x".to_string(),
            attempts: 3,
        }
    }

    #[parameterized(
        timeout_is_retryable = { timeout(), true },
        lock_lost_is_retryable = { CoordinationError::LockLost { resource: "seq:x".into() }, true },
        pending_is_retryable = { CoordinationError::OperationPending { key: "k".into() }, true },
        failed_is_retryable = { CoordinationError::OperationFailed { key: "k".into(), reason: "r".into() }, true },
        unavailable_store_is_retryable = { CoordinationError::Store(StoreError::Unavailable("down".into())), true },
        corrupted_store_is_not = { CoordinationError::Store(StoreError::Corrupted { key: "k".into(), reason: "r".into() }), false },
        not_pending_is_not = { CoordinationError::RecordNotPending { key: "k".into(), status: "completed".into() }, false },
    )]
    fn retryability(error: CoordinationError, retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn guarded_error_keeps_kinds_apart() {
        let coordination: GuardedError<std::io::Error> = timeout().into();
        assert!(coordination.coordination().is_some());
        assert!(coordination.to_string().contains("lock acquisition timeout"));

        let operation: GuardedError<std::io::Error> =
            GuardedError::Operation(std::io::Error::other("disk full"));
        assert!(operation.coordination().is_none());
        assert_eq!(operation.to_string(), "disk full");
        assert!(operation.into_operation().is_some());
    }

    #[test]
    fn flatten_unwraps_either_side() {
        let inner: GuardedError<CoordinationError> = GuardedError::Operation(timeout());
        assert!(matches!(
            inner.flatten(),
            CoordinationError::LockAcquisitionTimeout { attempts: 3, .. }
        ));
    }
}
