//! Filesystem-backed world engine for running the manager standalone
//!
//! Each region is a directory under the world container holding a
//! `region.ron` marker. Chunk generation is simulated by recording which
//! units were requested; occupants are plain names that live either in the
//! lobby or inside one loaded region.

use chrono::{DateTime, Utc};
use resworld_core::pregen::WorkUnit;
use resworld_core::{EngineError, RegionEngine, RegionKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

const MARKER_FILE: &str = "region.ron";

/// Contents of a region's marker file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMeta {
    pub name: String,
    pub kind: RegionKind,
    pub border_size: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct EngineState {
    /// Loaded region name to the units requested so far
    loaded: HashMap<String, HashSet<WorkUnit>>,
    /// Occupant name to the region it is in (`None` is the lobby)
    occupants: HashMap<String, Option<String>>,
}

pub struct LocalEngine {
    root: PathBuf,
    state: Mutex<EngineState>,
}

impl LocalEngine {
    /// Use `root` as the world container, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        log::info!("[REGION] World container at {:?}", root);
        Ok(Self {
            root,
            state: Mutex::new(EngineState::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Put an occupant directly into a loaded region
    pub fn place(&self, occupant: &str, region: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        if !state.loaded.contains_key(region) {
            return Err(EngineError::NotLoaded(region.to_string()));
        }
        state
            .occupants
            .insert(occupant.to_string(), Some(region.to_string()));
        Ok(())
    }

    /// Region an occupant is in, `None` for the lobby or unknown occupants
    pub fn location(&self, occupant: &str) -> Option<String> {
        self.lock().occupants.get(occupant).cloned().flatten()
    }

    pub fn materialized_count(&self, region: &str) -> usize {
        self.lock().loaded.get(region).map_or(0, HashSet::len)
    }

    pub fn read_meta(&self, name: &str) -> anyhow::Result<RegionMeta> {
        use anyhow::Context;

        let path = self.root.join(name).join(MARKER_FILE);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        ron::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    fn write_meta(&self, meta: &RegionMeta) -> Result<(), EngineError> {
        let io_err = |source| EngineError::Io {
            name: meta.name.clone(),
            source,
        };
        let serialized = ron::ser::to_string_pretty(meta, ron::ser::PrettyConfig::default())
            .map_err(|e| io_err(std::io::Error::other(e)))?;
        std::fs::write(self.root.join(&meta.name).join(MARKER_FILE), serialized).map_err(io_err)
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RegionEngine for LocalEngine {
    fn create_region(
        &self,
        name: &str,
        kind: RegionKind,
        border_size: u32,
    ) -> Result<(), EngineError> {
        let dir = self.root.join(name);
        if dir.exists() {
            return Err(EngineError::Refused {
                name: name.to_string(),
                reason: "folder already exists".to_string(),
            });
        }
        std::fs::create_dir_all(&dir).map_err(|source| EngineError::Io {
            name: name.to_string(),
            source,
        })?;
        self.write_meta(&RegionMeta {
            name: name.to_string(),
            kind,
            border_size,
            created_at: Utc::now(),
        })?;

        self.lock().loaded.insert(name.to_string(), HashSet::new());
        Ok(())
    }

    fn open_region(&self, name: &str, kind: RegionKind) -> Result<(), EngineError> {
        if !self.root.join(name).is_dir() {
            return Err(EngineError::NotLoaded(name.to_string()));
        }
        match self.read_meta(name) {
            Ok(meta) if meta.kind != kind => log::warn!(
                "[REGION] {} is marked as {} but opened as {}",
                name,
                meta.kind,
                kind
            ),
            Ok(_) => {}
            Err(e) => log::debug!("[REGION] No readable marker for {}: {:#}", name, e),
        }
        self.lock()
            .loaded
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn region_exists(&self, name: &str) -> bool {
        self.lock().loaded.contains_key(name) || self.root.join(name).is_dir()
    }

    fn loaded_regions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().loaded.keys().cloned().collect();
        names.sort();
        names
    }

    fn request_materialize(&self, region: &str, unit: WorkUnit) {
        if let Some(units) = self.lock().loaded.get_mut(region) {
            units.insert(unit);
        }
    }

    fn occupants(&self, region: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .occupants
            .iter()
            .filter(|(_, location)| location.as_deref() == Some(region))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn evacuate(&self, occupant: &str, command: &str) {
        log::debug!("[REGION] {} runs /{}", occupant, command);
        self.lock().occupants.insert(occupant.to_string(), None);
    }

    fn teleport(&self, occupant: &str, region: &str) -> Result<(), EngineError> {
        self.place(occupant, region)
    }

    fn unload_region(&self, region: &str) {
        let mut state = self.lock();
        state.loaded.remove(region);
        for location in state.occupants.values_mut() {
            if location.as_deref() == Some(region) {
                *location = None;
            }
        }
    }

    fn region_folders(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("[REGION] Failed to scan {:?}: {}", self.root, e);
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    fn delete_region_folder(&self, name: &str) -> Result<(), EngineError> {
        if self.lock().loaded.contains_key(name) {
            return Err(EngineError::Refused {
                name: name.to_string(),
                reason: "region is still loaded".to_string(),
            });
        }
        std::fs::remove_dir_all(self.root.join(name)).map_err(|source| EngineError::Io {
            name: name.to_string(),
            source,
        })
    }
}
