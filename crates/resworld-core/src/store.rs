//! Progress store - durable pregeneration state for every region
//!
//! One JSON file holds the whole mapping from region name to its record:
//!
//! ```json
//! { "resource_normal.a.20260101": { "borderSize": 5000, "cursor": 4210,
//!   "priorityCompleted": true, "allCompleted": false } }
//! ```
//!
//! The store is best-effort. A missing or unreadable file loads as an empty
//! mapping and a failed save leaves the in-memory state serving queries until
//! the next successful checkpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Default file name inside the data directory
pub const STATE_FILE_NAME: &str = "pregeneration_state.json";

/// Persisted pregeneration progress for one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Region name, taken from the mapping key on load
    #[serde(skip)]
    pub region: String,
    pub border_size: u32,
    /// Index into the region's plan of the next unit to request
    #[serde(default, alias = "currentIndex")]
    pub cursor: usize,
    #[serde(default)]
    pub priority_completed: bool,
    #[serde(default)]
    pub all_completed: bool,
}

impl ProgressRecord {
    /// Record for a pregeneration that starts at `cursor`
    pub fn new(region: impl Into<String>, border_size: u32, cursor: usize) -> Self {
        Self {
            region: region.into(),
            border_size,
            cursor,
            priority_completed: false,
            all_completed: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed progress state in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize progress state: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Mapping from region name to progress, backed by one file
///
/// All accessors go through one lock; `save` holds it while writing so
/// checkpoints from different regions never interleave in the file.
pub struct ProgressStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, ProgressRecord>>,
}

impl ProgressStore {
    /// Empty store that will persist to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create the store and load whatever is on disk
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::new(path);
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory mapping with the file content
    ///
    /// Returns the number of records loaded. Never fails: a missing file is an
    /// empty mapping, a corrupt one is logged and treated as empty.
    pub fn load(&self) -> usize {
        let loaded = if self.path.exists() {
            match read_records(&self.path) {
                Ok(records) => records,
                Err(e) => {
                    log::warn!("[STORE] Failed to load pregeneration state: {}", e);
                    BTreeMap::new()
                }
            }
        } else {
            log::debug!("[STORE] No state file at {:?}, starting empty", self.path);
            BTreeMap::new()
        };

        let count = loaded.len();
        *self.lock() = loaded;
        if count > 0 {
            log::info!("[STORE] Loaded pregeneration state for {} region(s)", count);
        }
        count
    }

    /// Persist the whole mapping
    pub fn save(&self) -> Result<(), StoreError> {
        let records = self.lock();
        write_records(&self.path, &records)
    }

    /// Insert or replace a record
    pub fn upsert(&self, record: ProgressRecord) {
        self.lock().insert(record.region.clone(), record);
    }

    /// Mutate an existing record; returns false when there is none
    pub fn update(&self, region: &str, updater: impl FnOnce(&mut ProgressRecord)) -> bool {
        match self.lock().get_mut(region) {
            Some(record) => {
                updater(record);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, region: &str) -> Option<ProgressRecord> {
        self.lock().remove(region)
    }

    /// Remove every record whose name starts with `prefix`
    pub fn remove_matching(&self, prefix: &str) -> Vec<ProgressRecord> {
        let mut records = self.lock();
        let names: Vec<String> = records
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names
            .into_iter()
            .filter_map(|name| records.remove(&name))
            .collect()
    }

    pub fn get(&self, region: &str) -> Option<ProgressRecord> {
        self.lock().get(region).cloned()
    }

    pub fn all(&self) -> BTreeMap<String, ProgressRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ProgressRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_records(path: &Path) -> Result<BTreeMap<String, ProgressRecord>, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut records: BTreeMap<String, ProgressRecord> =
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    for (name, record) in records.iter_mut() {
        record.region = name.clone();
    }

    Ok(records)
}

fn write_records(path: &Path, records: &BTreeMap<String, ProgressRecord>) -> Result<(), StoreError> {
    let serialized = serde_json::to_string_pretty(records).map_err(StoreError::Serialize)?;
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    // Atomic write: write to temp file, then rename
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, serialized).map_err(io_err)?;
    std::fs::rename(&temp_path, path).map_err(io_err)?;

    log::debug!("[STORE] Saved {} record(s) to {:?}", records.len(), path);
    Ok(())
}
