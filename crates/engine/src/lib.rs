// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Tally coordination engine: locks, gapless sequences and idempotent
//! execution over a shared [`LockStore`](tally_core::LockStore)

mod coordinator;
mod error;
mod idempotency;
mod lock;
mod retry;
mod sequence;

pub use coordinator::{Coordinator, CoordinatorDeps};
pub use error::{CoordinationError, GuardedError};
pub use idempotency::{CheckOutcome, IdempotencyCoordinator};
pub use lock::LockManager;
pub use retry::{HeldLock, RetryCoordinator};
pub use sequence::SequenceGenerator;
