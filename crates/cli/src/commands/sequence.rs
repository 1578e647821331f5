// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invoice sequence commands

use clap::Args;
use serde::Serialize;
use std::fmt;
use tally_core::SequenceScope;
use tally_engine::Coordinator;

use crate::error::TallyError;
use crate::output::{self, OutputFormat};
use crate::Store;

#[derive(Args)]
pub struct ScopeArgs {
    /// Organization identifier
    pub organization_id: String,
    /// Fiscal document type, e.g. FACTURA_A
    pub document_type: String,
}

#[derive(Serialize)]
struct SequenceValue {
    organization_id: String,
    document_type: String,
    value: u64,
}

impl fmt::Display for SequenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

pub async fn next(
    tally: &Coordinator<Store>,
    args: ScopeArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let value = tally
        .sequences()
        .get_next_invoice_number(&args.organization_id, &args.document_type)
        .await
        .map_err(TallyError::coordination)?;

    output::print(
        &SequenceValue {
            organization_id: args.organization_id,
            document_type: args.document_type,
            value,
        },
        format,
    );
    Ok(())
}

pub async fn current(
    tally: &Coordinator<Store>,
    args: ScopeArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let scope = SequenceScope::invoice(&args.organization_id, &args.document_type);
    let value = tally
        .sequences()
        .current(&scope)
        .await
        .map_err(TallyError::coordination)?;

    output::print(
        &SequenceValue {
            organization_id: args.organization_id,
            document_type: args.document_type,
            value,
        },
        format,
    );
    Ok(())
}
