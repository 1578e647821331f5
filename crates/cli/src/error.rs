// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! This module provides enhanced error types that include:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)

use std::fmt;
use tally_engine::CoordinationError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct TallyError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TallyError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    /// Add context about why this error might have happened.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Add a suggestion for how to fix this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Set the source error that caused this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for TallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for TallyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Common error builders for typical failure scenarios.
impl TallyError {
    /// Error for when a lock is held by someone else.
    pub fn lock_held(resource: &str, holder: Option<&str>) -> Self {
        TallyError::new(format!("Failed to acquire lock '{}'", resource))
            .with_context(format!(
                "Lock is currently held by '{}'",
                holder.unwrap_or("unknown")
            ))
            .with_suggestion("Wait for the holder to release it or for its TTL to expire")
            .with_suggestion(format!("Check the holder: tally lock status {}", resource))
    }

    /// Error for when an idempotency record does not exist.
    pub fn record_not_found(key: &str) -> Self {
        TallyError::new(format!("No idempotency record for '{}'", key))
            .with_context("Records are created by the first check of a key")
            .with_suggestion("List known records: tally record list")
    }

    /// Wrap a coordination failure, pointing out when retrying may help.
    pub fn coordination(err: CoordinationError) -> Self {
        let mut error = TallyError::new(err.to_string());

        match &err {
            CoordinationError::LockAcquisitionTimeout { resource, .. }
            | CoordinationError::DeadlineExceeded { resource, .. } => {
                error = error
                    .with_context(format!("Another caller kept '{}' locked", resource))
                    .with_suggestion(format!("Check the holder: tally lock status {}", resource));
            }
            CoordinationError::Store(_) => {
                error = error
                    .with_context("The store file could not be read or written")
                    .with_suggestion("Check --store (or TALLY_STORE) points at a writable file");
            }
            _ => {}
        }
        if err.is_retryable() {
            error = error.with_suggestion("Retry the command later");
        }

        error.with_source(err)
    }
}
