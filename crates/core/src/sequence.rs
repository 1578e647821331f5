// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequence counter scopes

use serde::{Deserialize, Serialize};

/// Store key prefix for counter values
pub const COUNTER_KEY_PREFIX: &str = "counter:";

/// Lock resource prefix serializing access to one counter
pub const SEQUENCE_LOCK_PREFIX: &str = "seq:";

/// Identifies one independent gapless sequence
///
/// Scopes are arbitrary composite keys; two different scopes never share a
/// counter or a lock.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceScope(String);

impl SequenceScope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// Scope for fiscal document numbers of one organization and document type
    pub fn invoice(organization_id: &str, document_type: &str) -> Self {
        Self(format!("invoice:{}:{}", organization_id, document_type))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key holding the last issued value
    pub fn counter_key(&self) -> String {
        format!("{}{}", COUNTER_KEY_PREFIX, self.0)
    }

    /// Lock resource guarding the read-increment-persist cycle
    pub fn lock_resource(&self) -> String {
        format!("{}{}", SEQUENCE_LOCK_PREFIX, self.0)
    }
}

impl std::fmt::Display for SequenceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a stored counter; a missing counter is 0
pub fn parse_counter(raw: Option<&str>) -> Result<u64, std::num::ParseIntError> {
    match raw {
        None => Ok(0),
        Some(value) => value.trim().parse::<u64>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn invoice_scope_keys() {
        let scope = SequenceScope::invoice("org-test-123", "FACTURA_A");
        assert_eq!(scope.as_str(), "invoice:org-test-123:FACTURA_A");
        assert_eq!(scope.counter_key(), "counter:invoice:org-test-123:FACTURA_A");
        assert_eq!(scope.lock_resource(), "seq:invoice:org-test-123:FACTURA_A");
    }

    #[test]
    fn distinct_document_types_are_distinct_scopes() {
        assert_ne!(
            SequenceScope::invoice("org", "FACTURA_A"),
            SequenceScope::invoice("org", "FACTURA_B")
        );
    }

    #[parameterized(
        missing_is_zero = { None, Some(0) },
        plain_value = { Some("41"), Some(41) },
        surrounding_whitespace = { Some(" 7\n"), Some(7) },
        negative_is_rejected = { Some("-1"), None },
        garbage_is_rejected = { Some("seven"), None },
    )]
    fn counter_parsing(raw: Option<&str>, expected: Option<u64>) {
        assert_eq!(parse_counter(raw).ok(), expected);
    }
}
