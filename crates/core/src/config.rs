// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [lock]
//! ttl = "5s"
//! max_retries = 50
//! base_delay = "20ms"
//! max_jitter = "20ms"
//!
//! [sequence]
//! ttl = "5s"
//!
//! [idempotency]
//! pending_timeout = "5m"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bounded, jittered retry policy for lock acquisition
///
/// A caller waits at most `(max_retries) * (base_delay + max_jitter)` before
/// giving up with a lock acquisition timeout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Lifetime of an acquired lock; a crashed holder's lock frees up after this
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Attempts after the first before failing
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound of the uniform random delay added to `base_delay`
    #[serde(with = "humantime_serde")]
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            max_retries: 50,
            base_delay: Duration::from_millis(20),
            max_jitter: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Total attempts including the first
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Worst-case time spent waiting between attempts
    pub fn max_wait(&self) -> Duration {
        self.base_delay
            .saturating_add(self.max_jitter)
            .saturating_mul(self.max_retries)
    }
}

/// Idempotency coordinator settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencySettings {
    /// Age after which a pending record is treated as abandoned
    #[serde(with = "humantime_serde")]
    pub pending_timeout: Duration,
    /// Conditional-update races tolerated in one call before giving up
    pub max_cas_attempts: u32,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            pending_timeout: Duration::from_secs(300),
            max_cas_attempts: 8,
        }
    }
}

impl IdempotencySettings {
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// Default policy for caller-managed locks
    pub lock: RetryPolicy,
    /// Policy for the per-scope sequence locks
    pub sequence: RetryPolicy,
    pub idempotency: IdempotencySettings,
}

impl TallyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: TallyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (section, policy) in [("lock", &self.lock), ("sequence", &self.sequence)] {
            if policy.ttl.is_zero() {
                return Err(ConfigError::Invalid(format!("[{}] ttl must be non-zero", section)));
            }
        }
        if self.idempotency.pending_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "[idempotency] pending_timeout must be non-zero".to_string(),
            ));
        }
        if self.idempotency.max_cas_attempts == 0 {
            return Err(ConfigError::Invalid(
                "[idempotency] max_cas_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
