// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tally-core: shared types for the tally coordination library
//!
//! This crate provides:
//! - Clock and token abstractions that can be faked in tests
//! - The data model: lock tokens, sequence scopes, idempotency records
//! - The `LockStore` adapter contract and an in-process `MemoryStore`
//! - TOML configuration

pub mod clock;
pub mod id;

pub mod config;
pub mod entries;
pub mod idempotency;
pub mod lock;
pub mod memory;
pub mod sequence;
pub mod store;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, IdempotencySettings, RetryPolicy, TallyConfig};
pub use entries::{EntryMap, StoredEntry};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use idempotency::{CheckDecision, ClaimReason, IdempotencyKey, IdempotencyRecord, IdempotencyStatus};
pub use lock::LockToken;
pub use memory::MemoryStore;
pub use sequence::SequenceScope;
pub use store::{LockStore, StoreError};
