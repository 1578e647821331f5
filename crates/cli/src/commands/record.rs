// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency record commands

use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use tally_core::{IdempotencyKey, IdempotencyRecord, IdempotencyStatus};
use tally_engine::Coordinator;

use crate::error::TallyError;
use crate::output::{self, OutputFormat};
use crate::Store;

#[derive(Args)]
pub struct RecordArgs {
    #[command(subcommand)]
    pub command: RecordCommand,
}

#[derive(Subcommand)]
pub enum RecordCommand {
    /// Show the record for a key
    Show {
        /// Idempotency key
        key: String,
    },
    /// List all records
    List,
    /// Print the key derived from an upstream event identifier
    Key {
        /// Event source, e.g. the payment provider name
        source: String,
        /// Upstream event identifier
        external_id: String,
    },
}

#[derive(Serialize)]
struct RecordInfo {
    key: String,
    status: IdempotencyStatus,
    attempts: u32,
    created_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<IdempotencyRecord> for RecordInfo {
    fn from(record: IdempotencyRecord) -> Self {
        Self {
            key: record.key,
            status: record.status,
            attempts: record.attempts,
            created_at_ms: record.created_at_ms,
            result: record.result,
            error: record.error,
        }
    }
}

impl fmt::Display for RecordInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<40} {:<10} attempts={:<3}",
            self.key,
            self.status.to_string(),
            self.attempts
        )?;
        if let Some(result) = &self.result {
            write!(f, " result={}", result)?;
        }
        if let Some(error) = &self.error {
            write!(f, " error={}", error)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct DerivedKey {
    key: String,
}

impl fmt::Display for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

pub async fn handle(
    tally: &Coordinator<Store>,
    command: RecordCommand,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        RecordCommand::Show { key } => {
            let record = tally
                .idempotency()
                .record(&IdempotencyKey::new(key.clone()))
                .await
                .map_err(TallyError::coordination)?
                .ok_or_else(|| TallyError::record_not_found(&key))?;
            output::print(&RecordInfo::from(record), format);
        }
        RecordCommand::List => {
            let records = tally
                .idempotency()
                .records()
                .await
                .map_err(TallyError::coordination)?;
            let items: Vec<RecordInfo> = records.into_iter().map(RecordInfo::from).collect();
            output::print_list(&items, format, "No records");
        }
        RecordCommand::Key {
            source,
            external_id,
        } => {
            let key = IdempotencyKey::derive(&source, &external_id);
            output::print(
                &DerivedKey {
                    key: key.as_str().to_string(),
                },
                format,
            );
        }
    }
    Ok(())
}
