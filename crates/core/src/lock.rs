// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock identity
//!
//! A lock is a single store entry: key `lock:<resource>`, value the holder's
//! token, expiry `acquired_at + ttl`. At most one live entry exists per key,
//! and only a caller presenting the stored token can delete it early.

use serde::{Deserialize, Serialize};

/// Store key prefix for lock entries
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Store key for a named resource's lock
pub fn lock_key(resource: &str) -> String {
    format!("{}{}", LOCK_KEY_PREFIX, resource)
}

/// Fencing token returned by a successful acquire and required to release
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockToken(pub String);

impl LockToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_namespaced() {
        assert_eq!(lock_key("seq:invoice:org-1:FACTURA_A"), "lock:seq:invoice:org-1:FACTURA_A");
    }

    #[test]
    fn token_displays_raw_value() {
        let token = LockToken::new("abc-123");
        assert_eq!(token.to_string(), "abc-123");
        assert_eq!(token.as_str(), "abc-123");
    }
}
