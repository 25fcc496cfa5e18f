//! Shared fixtures: an in-memory engine and a recording announcer

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use resworld_core::config::MacroHook;
use resworld_core::pregen::WorkUnit;
use resworld_core::{
    Announcer, EngineError, ManagerConfig, ManualClock, ProgressStore, RegionCoordinator,
    RegionEngine, RegionKind, SharedConfig,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Barrier, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct EngineState {
    folders: BTreeSet<String>,
    loaded: BTreeSet<String>,
    requested: HashMap<String, Vec<WorkUnit>>,
    occupants: HashMap<String, Option<String>>,
    fail_create: bool,
    creation_gate: Option<Arc<Barrier>>,
}

#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<EngineState>,
}

impl MemoryEngine {
    pub fn with_folders(folders: &[&str]) -> Self {
        let engine = Self::default();
        engine
            .state
            .lock()
            .unwrap()
            .folders
            .extend(folders.iter().map(|f| f.to_string()));
        engine
    }

    pub fn fail_creation(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    /// Make `create_region` wait on the returned barrier twice: once on entry
    /// and once before it proceeds
    pub fn hold_creation(&self) -> Arc<Barrier> {
        let gate = Arc::new(Barrier::new(2));
        self.state.lock().unwrap().creation_gate = Some(gate.clone());
        gate
    }

    pub fn requested(&self, region: &str) -> Vec<WorkUnit> {
        self.state
            .lock()
            .unwrap()
            .requested
            .get(region)
            .cloned()
            .unwrap_or_default()
    }

    pub fn place(&self, occupant: &str, region: &str) {
        self.state
            .lock()
            .unwrap()
            .occupants
            .insert(occupant.to_string(), Some(region.to_string()));
    }

    pub fn location(&self, occupant: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .occupants
            .get(occupant)
            .cloned()
            .flatten()
    }
}

impl RegionEngine for MemoryEngine {
    fn create_region(&self, name: &str, _: RegionKind, _: u32) -> Result<(), EngineError> {
        let gate = self.state.lock().unwrap().creation_gate.take();
        if let Some(gate) = gate {
            gate.wait();
            gate.wait();
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(EngineError::Refused {
                name: name.to_string(),
                reason: "disk full".to_string(),
            });
        }
        state.folders.insert(name.to_string());
        state.loaded.insert(name.to_string());
        Ok(())
    }

    fn open_region(&self, name: &str, _: RegionKind) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if !state.folders.contains(name) {
            return Err(EngineError::NotLoaded(name.to_string()));
        }
        state.loaded.insert(name.to_string());
        Ok(())
    }

    fn region_exists(&self, name: &str) -> bool {
        self.state.lock().unwrap().folders.contains(name)
    }

    fn loaded_regions(&self) -> Vec<String> {
        self.state.lock().unwrap().loaded.iter().cloned().collect()
    }

    fn request_materialize(&self, region: &str, unit: WorkUnit) {
        self.state
            .lock()
            .unwrap()
            .requested
            .entry(region.to_string())
            .or_default()
            .push(unit);
    }

    fn occupants(&self, region: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .occupants
            .iter()
            .filter(|(_, at)| at.as_deref() == Some(region))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn evacuate(&self, occupant: &str, _: &str) {
        self.state
            .lock()
            .unwrap()
            .occupants
            .insert(occupant.to_string(), None);
    }

    fn teleport(&self, occupant: &str, region: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if !state.loaded.contains(region) {
            return Err(EngineError::NotLoaded(region.to_string()));
        }
        state
            .occupants
            .insert(occupant.to_string(), Some(region.to_string()));
        Ok(())
    }

    fn unload_region(&self, region: &str) {
        self.state.lock().unwrap().loaded.remove(region);
    }

    fn region_folders(&self) -> Vec<String> {
        self.state.lock().unwrap().folders.iter().cloned().collect()
    }

    fn delete_region_folder(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.folders.remove(name);
        state.requested.remove(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    pub broadcasts: Mutex<Vec<String>>,
    pub console: Mutex<Vec<String>>,
    pub told: Mutex<Vec<(String, String)>>,
    pub commands: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn broadcasts_containing(&self, needle: &str) -> usize {
        self.broadcasts
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }
}

impl Announcer for RecordingAnnouncer {
    fn broadcast(&self, message: &str) {
        self.broadcasts.lock().unwrap().push(message.to_string());
    }

    fn console(&self, message: &str) {
        self.console.lock().unwrap().push(message.to_string());
    }

    fn tell(&self, occupant: &str, message: &str) {
        self.told
            .lock()
            .unwrap()
            .push((occupant.to_string(), message.to_string()));
    }

    fn run_command(&self, command: &str) -> bool {
        self.commands.lock().unwrap().push(command.to_string());
        true
    }
}

/// Small plan (169 units, 49 priority) with a configurable cadence
pub fn test_config(tick_interval_ms: u64) -> ManagerConfig {
    let mut config = ManagerConfig::default();
    config.pregen.priority_diameter = 64;
    config.pregen.tick_interval_ms = tick_interval_ms;
    config.pregen.batch_size = 10;
    config.purge.attempts = 3;
    config.purge.backoff_ms = 0;
    config.macros.after_generation = MacroHook {
        enabled: true,
        commands: vec!["worldborder %region_name% %border_size%".to_string()],
    };
    config
}

pub struct Harness {
    pub engine: Arc<MemoryEngine>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub store: Arc<ProgressStore>,
    pub clock: Arc<ManualClock>,
    pub coordinator: RegionCoordinator,
}

impl Harness {
    pub fn new(dir: &Path, config: ManagerConfig, engine: MemoryEngine) -> Self {
        Self::with_store_path(&dir.join("pregeneration_state.json"), config, engine)
    }

    pub fn with_store_path(store_path: &Path, config: ManagerConfig, engine: MemoryEngine) -> Self {
        let engine = Arc::new(engine);
        let announcer = Arc::new(RecordingAnnouncer::default());
        let store = Arc::new(ProgressStore::open(store_path));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let coordinator = RegionCoordinator::new(
            SharedConfig::new(config),
            engine.clone(),
            announcer.clone(),
            store.clone(),
        )
        .with_clock(clock.clone());

        Self {
            engine,
            announcer,
            store,
            clock,
            coordinator,
        }
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
