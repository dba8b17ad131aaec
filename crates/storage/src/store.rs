// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The file store.

use crate::rows::{CpRow, DriverRow};
use evc_core::{ChargingPoint, Driver, HistoryRecord};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const CPS_FILE: &str = "charging_points.txt";
const DRIVERS_FILE: &str = "drivers.txt";
const HISTORY_FILE: &str = "charging_history.txt";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// State recovered at startup.
#[derive(Debug, Default)]
pub struct Loaded {
    pub cps: Vec<ChargingPoint>,
    pub drivers: Vec<Driver>,
}

/// Append-oriented store under one data directory.
///
/// All writes are serialized under the store's own mutex; the session
/// manager and the HTTP surfaces may call in concurrently.
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load both keyed tables. Missing files mean empty tables; a line that
    /// does not parse is skipped with a warning so one bad record cannot
    /// hold the whole fleet hostage.
    pub fn load(&self) -> Result<Loaded, StorageError> {
        let cps = read_lines::<CpRow>(&self.dir.join(CPS_FILE))?
            .into_iter()
            .map(CpRow::into_disconnected)
            .collect();
        let drivers = read_lines::<DriverRow>(&self.dir.join(DRIVERS_FILE))?
            .into_iter()
            .map(DriverRow::into_idle)
            .collect();
        Ok(Loaded { cps, drivers })
    }

    /// Rewrite the CP table.
    pub fn save_cps(&self, rows: &[CpRow]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        rewrite(&self.dir.join(CPS_FILE), rows)
    }

    /// Rewrite the driver table.
    pub fn save_drivers(&self, rows: &[DriverRow]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        rewrite(&self.dir.join(DRIVERS_FILE), rows)
    }

    /// Append one completed-session record. Never mutates prior lines.
    pub fn append_history(&self, record: &HistoryRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(HISTORY_FILE))?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Last `limit` history records, oldest first.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, StorageError> {
        let mut records = read_lines::<HistoryRecord>(&self.dir.join(HISTORY_FILE))?;
        if records.len() > limit {
            records.drain(..records.len() - limit);
        }
        Ok(records)
    }
}

fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => out.push(record),
            Err(e) => {
                warn!(file = %path.display(), line = n + 1, error = %e, "skipping bad record");
            }
        }
    }
    Ok(out)
}

/// Full rewrite via temp file + rename, so readers never observe a torn
/// table.
fn rewrite<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        for row in rows {
            let mut line = serde_json::to_string(row)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        file.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
