// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One handle over a shared store
//!
//! Wires the lock manager, retry coordinator, sequence generator and
//! idempotency coordinator to the same store with policies from
//! [`TallyConfig`].

use std::future::Future;
use tally_core::{Clock, IdGen, LockStore, SystemClock, TallyConfig, UuidIdGen};

use crate::error::GuardedError;
use crate::idempotency::IdempotencyCoordinator;
use crate::lock::LockManager;
use crate::retry::RetryCoordinator;
use crate::sequence::SequenceGenerator;

/// Injectable dependencies for a [`Coordinator`]
pub struct CoordinatorDeps<S, C, G> {
    pub store: S,
    pub clock: C,
    pub ids: G,
}

/// Locks, sequences and idempotency over one store
#[derive(Clone, Debug)]
pub struct Coordinator<S, C = SystemClock, G = UuidIdGen> {
    retry: RetryCoordinator<S, G>,
    sequences: SequenceGenerator<S, G>,
    idempotency: IdempotencyCoordinator<S, C>,
    config: TallyConfig,
}

impl<S: LockStore> Coordinator<S> {
    pub fn new(store: S, config: TallyConfig) -> Self {
        Self::with_deps(
            CoordinatorDeps {
                store,
                clock: SystemClock,
                ids: UuidIdGen,
            },
            config,
        )
    }
}

impl<S: LockStore, C: Clock, G: IdGen> Coordinator<S, C, G> {
    pub fn with_deps(deps: CoordinatorDeps<S, C, G>, config: TallyConfig) -> Self {
        let retry = RetryCoordinator::new(LockManager::with_ids(deps.store.clone(), deps.ids));
        let sequences = SequenceGenerator::new(retry.clone(), config.sequence.clone());
        let idempotency =
            IdempotencyCoordinator::with_clock(deps.store, deps.clock, config.idempotency.clone());

        Self {
            retry,
            sequences,
            idempotency,
            config,
        }
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockManager<S, G> {
        self.retry.locks()
    }

    pub fn retry(&self) -> &RetryCoordinator<S, G> {
        &self.retry
    }

    pub fn sequences(&self) -> &SequenceGenerator<S, G> {
        &self.sequences
    }

    pub fn idempotency(&self) -> &IdempotencyCoordinator<S, C> {
        &self.idempotency
    }

    /// Run `op` under `resource` with the configured `[lock]` policy
    pub async fn with_lock<T, E, F, Fut>(&self, resource: &str, op: F) -> Result<T, GuardedError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.retry.with_lock(resource, &self.config.lock, op).await
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
