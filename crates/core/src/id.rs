// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fencing token generation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates opaque, unique lock tokens
///
/// Uniqueness must hold across every process sharing a store, otherwise two
/// holders could present the same token on release.
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;
}

/// UUID-based token generator for production use
#[derive(Clone, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential token generator for testing
///
/// Only unique within one generator and its clones.
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("token")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_gen_creates_unique_tokens() {
        let id_gen = UuidIdGen;
        let t1 = id_gen.next();
        let t2 = id_gen.next();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 36);
    }

    #[test]
    fn sequential_gen_creates_predictable_tokens() {
        let id_gen = SequentialIdGen::new("lock");
        assert_eq!(id_gen.next(), "lock-1");
        assert_eq!(id_gen.next(), "lock-2");
    }

    #[test]
    fn sequential_gen_clones_share_a_counter() {
        let id_gen1 = SequentialIdGen::default();
        let id_gen2 = id_gen1.clone();
        assert_eq!(id_gen1.next(), "token-1");
        assert_eq!(id_gen2.next(), "token-2");
        assert_eq!(id_gen1.next(), "token-3");
    }
}
