// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory holding a store file and optional config
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("store.json")
    }

    /// Write a config with generous retries so parallel processes never
    /// exhaust them on a slow machine
    pub fn patient_config(&self) -> PathBuf {
        let path = self.dir.path().join("tally.toml");
        std::fs::write(
            &path,
            "[sequence]\nmax_retries = 2000\nbase_delay = \"5ms\"\nmax_jitter = \"10ms\"\n\n\
             [lock]\nmax_retries = 2000\nbase_delay = \"5ms\"\nmax_jitter = \"10ms\"\n",
        )
        .expect("Failed to write config");
        path
    }

    /// `tally` bound to this environment's store
    pub fn tally(&self) -> Command {
        let mut cmd = Command::cargo_bin("tally").expect("tally binary");
        cmd.env("TALLY_STORE", self.store_path())
            .env_remove("TALLY_CONFIG")
            .env_remove("RUST_LOG")
            .current_dir(self.dir.path());
        cmd
    }

    /// Seed an idempotency record directly in the store file
    pub fn seed_record(&self, key: &str, record: serde_json::Value) {
        seed_entry(&self.store_path(), &format!("idem:{}", key), &record.to_string());
    }
}

fn seed_entry(path: &Path, key: &str, value: &str) {
    let mut state: serde_json::Value = std::fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_else(|| serde_json::json!({"version": 1, "entries": {}}));
    state["entries"][key] = serde_json::json!({ "value": value });
    std::fs::write(path, state.to_string()).expect("Failed to write store");
}
