// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed lock store
//!
//! State is one JSON document. Every operation takes an exclusive advisory
//! lock on a sibling `.lock` file, reads the document, applies the change and
//! atomically replaces the document before unlocking, so processes sharing
//! the path see each operation as indivisible.

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_core::clock::duration_ms;
use tally_core::{Clock, EntryMap, LockStore, StoreError, SystemClock};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileState {
    version: u32,
    entries: EntryMap,
}

/// Lock store persisted to a JSON file shared between processes
#[derive(Clone, Debug)]
pub struct FileStore<C: Clock = SystemClock> {
    path: PathBuf,
    lock_path: PathBuf,
    clock: C,
}

impl FileStore<SystemClock> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, SystemClock)
    }
}

impl<C: Clock> FileStore<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, "lock");
        Self {
            path,
            lock_path,
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the stored entries while holding the file lock.
    ///
    /// `f` returns its result and whether the entries changed; unchanged
    /// entries are not rewritten.
    fn transact<R>(&self, f: impl FnOnce(&mut EntryMap, u64) -> (R, bool)) -> Result<R, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;
        FileExt::lock_exclusive(&lock_file)?;

        let result = self.apply(f);

        if let Err(e) = FileExt::unlock(&lock_file) {
            // Closing the descriptor below releases the lock regardless
            tracing::warn!(path = %self.lock_path.display(), error = %e, "unlock failed");
        }
        result
    }

    fn apply<R>(&self, f: impl FnOnce(&mut EntryMap, u64) -> (R, bool)) -> Result<R, StoreError> {
        let mut state = self.read_state()?;
        let now = self.clock.now_ms();
        let (result, dirty) = f(&mut state.entries, now);
        if dirty {
            let purged = state.entries.purge_expired(now);
            if purged > 0 {
                tracing::trace!(purged, "dropped expired entries");
            }
            self.write_state(&state)?;
        }
        Ok(result)
    }

    fn read_state(&self) -> Result<FileState, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileState::default()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(FileState::default());
        }

        let state: FileState =
            serde_json::from_str(&text).map_err(|e| StoreError::Corrupted {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        if state.version > FORMAT_VERSION {
            return Err(StoreError::Corrupted {
                key: self.path.display().to_string(),
                reason: format!("unsupported format version {}", state.version),
            });
        }
        Ok(state)
    }

    fn write_state(&self, state: &FileState) -> Result<(), StoreError> {
        let tmp_path = sibling(&self.path, "tmp");
        let json = serde_json::to_vec_pretty(&FileState {
            version: FORMAT_VERSION,
            entries: state.entries.clone(),
        })?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    async fn run<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        R: Send + 'static,
        F: FnOnce(&mut EntryMap, u64) -> (R, bool) + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.transact(f))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

/// `state.json` -> `state.json.<ext>`
fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[async_trait]
impl<C: Clock> LockStore for FileStore<C> {
    async fn set_if_absent_or_expired(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let (key, value, ttl_ms) = (key.to_string(), value.to_string(), duration_ms(ttl));
        self.run(move |entries, now| {
            let granted =
                entries.set_if_absent_or_expired(&key, &value, now.saturating_add(ttl_ms), now);
            (granted, granted)
        })
        .await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let (key, expected) = (key.to_string(), expected.to_string());
        self.run(move |entries, now| {
            let deleted = entries.compare_and_delete(&key, &expected, now);
            (deleted, deleted)
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        let (key, expected, new_value) = (
            key.to_string(),
            expected.map(str::to_string),
            new_value.to_string(),
        );
        self.run(move |entries, now| {
            let swapped = entries.compare_and_swap(&key, expected.as_deref(), &new_value, now);
            (swapped, swapped)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.run(move |entries, now| (entries.get(&key, now).map(str::to_string), false))
            .await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.run(move |entries, _| {
            entries.put(&key, &value);
            ((), true)
        })
        .await
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let prefix = prefix.to_string();
        self.run(move |entries, now| (entries.entries(&prefix, now), false))
            .await
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
