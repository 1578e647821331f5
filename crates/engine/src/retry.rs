// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry around lock acquisition
//!
//! `with_lock` turns "try to acquire" into "acquire or fail cleanly": up to
//! `max_retries + 1` attempts separated by `base_delay + jitter`, then a
//! `LockAcquisitionTimeout`. The protected operation runs only while the lock
//! is held, and the lock is released on every exit path.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tally_core::{IdGen, LockStore, LockToken, RetryPolicy, UuidIdGen};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{CoordinationError, GuardedError};
use crate::lock::LockManager;

/// A lock held by this process
///
/// Call [`HeldLock::release`] when done. If the guard is dropped instead
/// (cancelled future, panicking operation) the release is spawned onto the
/// current runtime; without a runtime the lock is left to expire by TTL.
#[must_use = "dropping a HeldLock releases it"]
pub struct HeldLock<S: LockStore, G: IdGen> {
    locks: LockManager<S, G>,
    resource: String,
    token: LockToken,
    released: bool,
}

impl<S: LockStore, G: IdGen> HeldLock<S, G> {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// Release now; `false` if the lock had already expired or moved on
    pub async fn release(mut self) -> Result<bool, CoordinationError> {
        self.released = true;
        self.locks.release(&self.resource, &self.token).await
    }
}

impl<S: LockStore, G: IdGen> Drop for HeldLock<S, G> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(resource = %self.resource, "no runtime to release lock, leaving it to expire");
            return;
        };

        let locks = self.locks.clone();
        let resource = std::mem::take(&mut self.resource);
        let token = self.token.clone();
        runtime.spawn(async move {
            match locks.release(&resource, &token).await {
                Ok(released) => debug!(resource, released, "lock released on drop"),
                Err(e) => {
                    warn!(resource, error = %e, "lock release on drop failed (will expire via TTL)")
                }
            }
        });
    }
}

/// Acquire-with-retry on top of a [`LockManager`]
#[derive(Clone, Debug)]
pub struct RetryCoordinator<S, G = UuidIdGen> {
    locks: LockManager<S, G>,
}

impl<S: LockStore, G: IdGen> RetryCoordinator<S, G> {
    pub fn new(locks: LockManager<S, G>) -> Self {
        Self { locks }
    }

    pub fn locks(&self) -> &LockManager<S, G> {
        &self.locks
    }

    /// Acquire `resource`, retrying per `policy`
    pub async fn acquire(
        &self,
        resource: &str,
        policy: &RetryPolicy,
    ) -> Result<HeldLock<S, G>, CoordinationError> {
        self.acquire_within(resource, policy, None).await
    }

    /// Acquire loop shared by the bounded and deadline variants.
    ///
    /// The deadline is checked between attempts and caps each backoff sleep;
    /// an attempt already sent to the store is never abandoned, so a granted
    /// lock always has a `HeldLock` to release it.
    async fn acquire_within(
        &self,
        resource: &str,
        policy: &RetryPolicy,
        deadline: Option<Duration>,
    ) -> Result<HeldLock<S, G>, CoordinationError> {
        // A deadline too far out to represent never fires
        let expires = deadline.and_then(|d| Instant::now().checked_add(d));
        let exceeded = || CoordinationError::DeadlineExceeded {
            resource: resource.to_string(),
            deadline: deadline.unwrap_or_default(),
        };

        let attempts = policy.attempts();
        for attempt in 1..=attempts {
            if expires.is_some_and(|at| Instant::now() >= at) {
                return Err(exceeded());
            }

            if let Some(token) = self.locks.acquire(resource, policy.ttl).await? {
                let held = HeldLock {
                    locks: self.locks.clone(),
                    resource: resource.to_string(),
                    token,
                    released: false,
                };
                if expires.is_some_and(|at| Instant::now() > at) {
                    debug!(resource, attempt, "lock granted after the deadline, giving it back");
                    if let Err(e) = held.release().await {
                        warn!(resource, error = %e, "late lock release failed (will expire via TTL)");
                    }
                    return Err(exceeded());
                }
                return Ok(held);
            }

            if attempt < attempts {
                let mut delay = backoff(policy);
                if let Some(at) = expires {
                    delay = delay.min(at.saturating_duration_since(Instant::now()));
                }
                debug!(
                    resource,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "lock busy, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(CoordinationError::LockAcquisitionTimeout {
            resource: resource.to_string(),
            attempts,
        })
    }

    /// Run `op` while holding `resource`.
    ///
    /// Coordination failures come back as [`GuardedError::Coordination`] and
    /// mean `op` never ran; errors from `op` come back unchanged as
    /// [`GuardedError::Operation`].
    pub async fn with_lock<T, E, F, Fut>(
        &self,
        resource: &str,
        policy: &RetryPolicy,
        op: F,
    ) -> Result<T, GuardedError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let held = self.acquire(resource, policy).await?;
        run_held(held, op).await
    }

    /// As [`with_lock`](Self::with_lock), but give up acquiring once
    /// `deadline` has passed. The deadline does not bound `op` itself.
    ///
    /// A store call in flight when the deadline passes is allowed to finish;
    /// if it granted the lock, the lock is released again before
    /// `DeadlineExceeded` is returned.
    pub async fn with_lock_deadline<T, E, F, Fut>(
        &self,
        resource: &str,
        policy: &RetryPolicy,
        deadline: Duration,
        op: F,
    ) -> Result<T, GuardedError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let held = self.acquire_within(resource, policy, Some(deadline)).await?;
        run_held(held, op).await
    }
}

async fn run_held<S, G, T, E, F, Fut>(held: HeldLock<S, G>, op: F) -> Result<T, GuardedError<E>>
where
    S: LockStore,
    G: IdGen,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let result = op().await;

    // The operation's outcome stands even if the release bookkeeping fails;
    // the lock then expires by TTL.
    let resource = held.resource().to_string();
    if let Err(e) = held.release().await {
        warn!(resource, error = %e, "lock release failed after operation");
    }

    result.map_err(GuardedError::Operation)
}

/// `base_delay` plus uniform jitter in `[0, max_jitter]`
fn backoff(policy: &RetryPolicy) -> Duration {
    let jitter_ms = policy.max_jitter.as_millis() as u64;
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_ms)
    };
    policy.base_delay.saturating_add(Duration::from_millis(jitter))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
