// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock commands

use anyhow::bail;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tally_core::LockToken;
use tally_engine::{Coordinator, GuardedError};
use tracing::debug;

use crate::error::TallyError;
use crate::output::{self, OutputFormat};
use crate::Store;

#[derive(Args)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommand,
}

#[derive(Subcommand)]
pub enum LockCommand {
    /// Try once to take a lock and print its token
    Acquire {
        /// Resource name
        resource: String,
        /// Lock lifetime (defaults to the [lock] ttl)
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,
    },
    /// Release a lock previously acquired with TOKEN
    Release {
        /// Resource name
        resource: String,
        /// Token printed by `tally lock acquire`
        token: String,
    },
    /// Show who holds a lock
    Status {
        /// Resource name
        resource: String,
    },
    /// List all held locks
    List,
    /// Run a command while holding a lock, waiting for it if busy
    Run {
        /// Resource name
        resource: String,
        /// Lock lifetime (defaults to the [lock] ttl)
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,
        /// Give up if the lock is not acquired within this long
        #[arg(long, value_parser = humantime::parse_duration)]
        deadline: Option<Duration>,
        /// Command and arguments
        #[arg(last = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },
}

#[derive(Serialize)]
struct LockInfo {
    resource: String,
    token: Option<String>,
}

impl LockInfo {
    fn new(resource: impl Into<String>, token: Option<LockToken>) -> Self {
        Self {
            resource: resource.into(),
            token: token.map(|t| t.as_str().to_string()),
        }
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(f, "{:<30} {}", self.resource, token),
            None => write!(f, "{:<30} free", self.resource),
        }
    }
}

#[derive(Serialize)]
struct ReleaseInfo {
    resource: String,
    released: bool,
}

impl fmt::Display for ReleaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.released {
            write!(f, "Released {}", self.resource)
        } else {
            write!(
                f,
                "Lock {} was not held by that token (expired or taken over)",
                self.resource
            )
        }
    }
}

pub async fn handle(
    tally: &Coordinator<Store>,
    command: LockCommand,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        LockCommand::Acquire { resource, ttl } => acquire(tally, resource, ttl, format).await,
        LockCommand::Release { resource, token } => {
            let released = tally
                .locks()
                .release(&resource, &LockToken::new(token))
                .await
                .map_err(TallyError::coordination)?;
            output::print(&ReleaseInfo { resource, released }, format);
            Ok(())
        }
        LockCommand::Status { resource } => {
            let holder = tally
                .locks()
                .holder(&resource)
                .await
                .map_err(TallyError::coordination)?;
            output::print(&LockInfo::new(resource, holder), format);
            Ok(())
        }
        LockCommand::List => {
            let held = tally
                .locks()
                .held()
                .await
                .map_err(TallyError::coordination)?;
            let items: Vec<_> = held
                .into_iter()
                .map(|(resource, token)| LockInfo::new(resource, Some(token)))
                .collect();
            output::print_list(&items, format, "No locks held");
            Ok(())
        }
        LockCommand::Run {
            resource,
            ttl,
            deadline,
            command,
        } => run(tally, resource, ttl, deadline, command).await,
    }
}

async fn acquire(
    tally: &Coordinator<Store>,
    resource: String,
    ttl: Option<Duration>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ttl = ttl.unwrap_or(tally.config().lock.ttl);
    let token = tally
        .locks()
        .acquire(&resource, ttl)
        .await
        .map_err(TallyError::coordination)?;

    match token {
        Some(token) => {
            output::print(&LockInfo::new(resource, Some(token)), format);
            Ok(())
        }
        None => {
            let holder = tally
                .locks()
                .holder(&resource)
                .await
                .map_err(TallyError::coordination)?;
            Err(TallyError::lock_held(&resource, holder.as_ref().map(|t| t.as_str())).into())
        }
    }
}

async fn run(
    tally: &Coordinator<Store>,
    resource: String,
    ttl: Option<Duration>,
    deadline: Option<Duration>,
    command: Vec<String>,
) -> anyhow::Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("no command given");
    };

    let mut policy = tally.config().lock.clone();
    if let Some(ttl) = ttl {
        policy.ttl = ttl;
    }

    let op = || async {
        debug!(resource = %resource, program = %program, "running command under lock");
        tokio::process::Command::new(program)
            .args(args)
            .status()
            .await
    };
    let result = match deadline {
        Some(deadline) => {
            tally
                .retry()
                .with_lock_deadline(&resource, &policy, deadline, op)
                .await
        }
        None => tally.retry().with_lock(&resource, &policy, op).await,
    };

    let status = match result {
        Ok(status) => status,
        Err(GuardedError::Coordination(e)) => return Err(TallyError::coordination(e).into()),
        Err(GuardedError::Operation(e)) => bail!("failed to run {}: {}", program, e),
    };
    debug!(resource = %resource, %status, "command finished, lock released");
    if !status.success() {
        bail!("{} exited with {}", program, status);
    }
    Ok(())
}
