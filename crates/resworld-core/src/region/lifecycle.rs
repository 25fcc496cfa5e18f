//! Region lifecycle coordinator
//!
//! Owns the `(kind, variation)` slots and drives each through
//! `Absent -> Creating -> Active -> Deleting -> Absent`. Creating a region
//! always clears whatever the slot held before: its job is cancelled, its
//! progress record dropped, occupants evacuated and folders purged.
//!
//! Lifecycle operations are meant to be called from one control thread (the
//! operator console); concurrent calls on the same slot fail with
//! [`LifecycleError::Busy`] instead of interleaving.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::engine::{Announcer, EngineError, RegionEngine};
use super::id::{RegionId, RegionKind, RegionTarget};
use super::messages::{Placeholders, render, run_macro};
use super::purge::{PurgeOutcome, purge_folders};
use crate::clock::{Clock, SystemClock};
use crate::config::{ManagerConfig, SharedConfig};
use crate::pregen::{JobContext, JobRegistry, JobSpec, MilestoneListener, PregenJob};
use crate::store::ProgressStore;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("unknown region kind '{0}'")]
    UnknownKind(String),

    #[error("unknown variation '{variation}' for {kind} regions")]
    UnknownVariation { kind: RegionKind, variation: String },

    #[error("border size {border_size} exceeds the maximum of {max}")]
    BorderTooLarge { border_size: u32, max: u32 },

    #[error("{0} is already being created or deleted")]
    Busy(String),

    #[error("failed to create region {name}: {source}")]
    CreationFailed {
        name: String,
        #[source]
        source: EngineError,
    },

    #[error("no active region for {0}")]
    NotFound(String),

    #[error("region {region} is still generating ({percent}%)")]
    NotReady { region: String, percent: u8 },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A region currently serving its slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRegion {
    pub id: RegionId,
    pub border_size: u32,
}

impl ActiveRegion {
    pub fn name(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone)]
enum SlotState {
    Creating,
    Active(ActiveRegion),
    Deleting,
}

/// One row of the status view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRow {
    pub slot: String,
    pub region: String,
    pub kind: RegionKind,
    pub border_size: u32,
    pub running: bool,
    /// A progress record is waiting for a resume
    pub pending: bool,
    pub percent: u8,
    pub ready: bool,
    pub priority_completed_at: Option<DateTime<Utc>>,
    pub all_completed_at: Option<DateTime<Utc>>,
    /// Only while a job is running
    pub eta_minutes: Option<u32>,
}

/// Turns job milestones into notifications and macro runs
struct MilestoneNotifier {
    config: SharedConfig,
    announcer: Arc<dyn Announcer>,
}

impl MilestoneListener for MilestoneNotifier {
    fn priority_ready(&self, region: &str) {
        let config = self.config.current();
        let values = Placeholders::region(region);
        self.announcer
            .broadcast(&render(&config.messages.priority_ready, values));
        self.announcer
            .console(&render(&config.messages.console_priority_ready, values));
        run_macro(
            self.announcer.as_ref(),
            "after_priority_pregen",
            &config.macros.after_priority_pregen,
            values,
        );
    }

    fn all_ready(&self, region: &str) {
        let config = self.config.current();
        let values = Placeholders::region(region);
        self.announcer
            .broadcast(&render(&config.messages.all_ready, values));
        run_macro(
            self.announcer.as_ref(),
            "after_all_pregen",
            &config.macros.after_all_pregen,
            values,
        );
    }
}

/// Creates, pregenerates, pauses and tears down resource regions
pub struct RegionCoordinator {
    config: SharedConfig,
    engine: Arc<dyn RegionEngine>,
    announcer: Arc<dyn Announcer>,
    store: Arc<ProgressStore>,
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, SlotState>>,
}

impl RegionCoordinator {
    pub fn new(
        config: SharedConfig,
        engine: Arc<dyn RegionEngine>,
        announcer: Arc<dyn Announcer>,
        store: Arc<ProgressStore>,
    ) -> Self {
        Self {
            config,
            engine,
            announcer,
            store,
            registry: Arc::new(JobRegistry::new()),
            clock: Arc::new(SystemClock),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the time source (tests use a manual clock)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    pub fn config(&self) -> Arc<ManagerConfig> {
        self.config.current()
    }

    /// Swap in a new configuration; running jobs keep their cadence
    pub fn reload(&self, config: ManagerConfig) {
        self.config.replace(config);
        log::info!("[REGION] Configuration reloaded");
    }

    /// Create a fresh region for `target`, replacing whatever the slot held
    ///
    /// `border_size` overrides the kind's default border. On engine failure
    /// the slot is left empty, no job is started and no record is written.
    pub fn create(
        &self,
        target: &RegionTarget,
        border_size: Option<u32>,
    ) -> Result<RegionId, LifecycleError> {
        let config = self.config.current();
        let (base_name, variation) = resolve(&config, target)?;
        let border_size = border_size.unwrap_or(config.resources.get(target.kind).default_border);
        if border_size > config.pregen.max_border_size {
            return Err(LifecycleError::BorderTooLarge {
                border_size,
                max: config.pregen.max_border_size,
            });
        }
        let id = RegionId::new(
            target.kind,
            base_name,
            variation,
            self.clock.now().date_naive(),
        );
        let slot = id.slot();
        let name = id.to_string();

        let previous = self.claim(&slot, SlotState::Creating)?;
        if let Some(previous) = &previous {
            run_macro(
                self.announcer.as_ref(),
                "before_delete",
                &config.macros.before_delete,
                Placeholders::region(&previous.name()),
            );
        }
        self.clear_slot(&id.base_name, &id.variation, &config);

        log::info!("[REGION] Creating {} (border size {})", name, border_size);
        if let Err(source) = self.engine.create_region(&name, target.kind, border_size) {
            log::error!("[REGION] Failed to create {}: {}", name, source);
            self.announcer.broadcast(&render(
                &config.messages.creation_failed,
                Placeholders::region(&name).with_border(border_size),
            ));
            self.lock_slots().remove(&slot);
            return Err(LifecycleError::CreationFailed { name, source });
        }

        let values = Placeholders::region(&name).with_border(border_size);
        self.announcer
            .broadcast(&render(&config.messages.broadcast_success, values));
        self.announcer
            .console(&render(&config.messages.console_success, values));
        run_macro(
            self.announcer.as_ref(),
            "after_generation",
            &config.macros.after_generation,
            values,
        );

        self.start_job(JobSpec::fresh(name, border_size, &config.pregen), &config);
        self.lock_slots().insert(
            slot,
            SlotState::Active(ActiveRegion {
                id: id.clone(),
                border_size,
            }),
        );
        Ok(id)
    }

    /// Tear down every generation of `target`'s slot
    ///
    /// Folders that survive the retry budget are logged, not returned as an
    /// error.
    pub fn delete(&self, target: &RegionTarget) -> Result<PurgeOutcome, LifecycleError> {
        let config = self.config.current();
        let (base_name, variation) = resolve(&config, target)?;
        let slot = format!("{}.{}", base_name, variation);

        let previous = self.claim(&slot, SlotState::Deleting)?;
        if let Some(previous) = &previous {
            run_macro(
                self.announcer.as_ref(),
                "before_delete",
                &config.macros.before_delete,
                Placeholders::region(&previous.name()),
            );
        }
        let outcome = self.clear_slot(&base_name, &variation, &config);
        self.lock_slots().remove(&slot);

        log::info!("[REGION] Deleted {}", slot);
        Ok(outcome)
    }

    /// Stop the slot's job, keeping its progress record for a later resume
    ///
    /// Returns whether a job was running.
    pub fn pause(&self, target: &RegionTarget) -> Result<bool, LifecycleError> {
        let active = self.require_active(target)?;
        let paused = self.registry.cancel_one(&active.name());
        if paused {
            log::info!("[REGION] Paused pregeneration of {}", active.name());
        }
        Ok(paused)
    }

    /// Pause, evacuate with the `closed` message, and clear readiness
    ///
    /// The region stays loaded and its progress record is untouched.
    pub fn close(&self, target: &RegionTarget) -> Result<bool, LifecycleError> {
        let config = self.config.current();
        let active = self.require_active(target)?;
        let name = active.name();

        let paused = self.registry.cancel_one(&name);
        self.evacuate(&name, &config.messages.closed, &config);
        self.registry.forget(&name);

        log::info!("[REGION] Closed {}", name);
        Ok(paused)
    }

    /// Move an occupant into the slot's region once its priority zone is ready
    pub fn teleport(&self, occupant: &str, target: &RegionTarget) -> Result<(), LifecycleError> {
        let active = self.require_active(target)?;
        let name = active.name();
        if !self.registry.is_ready(&name) {
            return Err(LifecycleError::NotReady {
                percent: self.registry.progress(&name),
                region: name,
            });
        }
        self.engine.teleport(occupant, &name)?;
        log::debug!("[REGION] Teleported {} to {}", occupant, name);
        Ok(())
    }

    /// Register the newest existing folder of every configured slot
    ///
    /// Returns the number of regions adopted.
    pub fn discover_existing(&self) -> usize {
        let config = self.config.current();

        let mut latest: BTreeMap<String, RegionId> = BTreeMap::new();
        for folder in self.engine.region_folders() {
            let Some(id) = RegionId::parse(&folder, &config.resources) else {
                continue;
            };
            let slot = id.slot();
            if latest.get(&slot).is_none_or(|current| id.date > current.date) {
                latest.insert(slot, id);
            }
        }

        let mut adopted = 0;
        for (slot, id) in latest {
            if self.lock_slots().contains_key(&slot) {
                continue;
            }
            let name = id.to_string();
            if let Err(e) = self.engine.open_region(&name, id.kind) {
                log::warn!("[REGION] Failed to open existing region {}: {}", name, e);
                continue;
            }

            let record = self.store.get(&name);
            let border_size = record
                .as_ref()
                .map(|r| r.border_size)
                .unwrap_or(config.resources.get(id.kind).default_border);
            match &record {
                Some(r) if !r.all_completed => {
                    if r.priority_completed {
                        self.registry.mark_ready(&name, None);
                    }
                }
                _ => self.registry.mark_completed(&name, None),
            }

            log::info!("[REGION] Found existing region {}", name);
            self.lock_slots()
                .insert(slot, SlotState::Active(ActiveRegion { id, border_size }));
            adopted += 1;
        }
        adopted
    }

    /// Restart a job for every unfinished progress record
    ///
    /// Records whose region no longer exists are dropped. Records of regions
    /// that exist but are not loaded (older generations) are kept and
    /// skipped. Returns the number of jobs started.
    pub fn resume_pending(&self) -> usize {
        let config = self.config.current();
        let loaded: HashSet<String> = self.engine.loaded_regions().into_iter().collect();
        let mut dropped = false;
        let mut resumed = 0;

        for (name, record) in self.store.all() {
            if record.all_completed {
                continue;
            }
            if !self.engine.region_exists(&name) {
                log::warn!(
                    "[REGION] Region {} no longer exists, dropping its pregeneration state",
                    name
                );
                self.store.remove(&name);
                dropped = true;
                continue;
            }
            if !loaded.contains(&name) {
                log::warn!(
                    "[REGION] Region {} is not loaded, leaving its pregeneration state for later",
                    name
                );
                continue;
            }
            if self.registry.is_running(&name) {
                continue;
            }

            log::info!(
                "[REGION] Resuming pregeneration of {} at index {}",
                name,
                record.cursor
            );
            if record.priority_completed {
                self.registry.mark_ready(&name, None);
            }
            if let Some(id) = RegionId::parse(&name, &config.resources) {
                self.lock_slots()
                    .entry(id.slot())
                    .or_insert_with(|| {
                        SlotState::Active(ActiveRegion {
                            id,
                            border_size: record.border_size,
                        })
                    });
            }
            if self.start_job(JobSpec::resume(&record, &config.pregen), &config) {
                resumed += 1;
            }
        }

        if dropped && let Err(e) = self.store.save() {
            log::warn!("[STORE] Failed to save pregeneration state: {}", e);
        }
        resumed
    }

    /// Stop every job and flush the store
    pub fn shutdown(&self) {
        let cancelled = self.registry.cancel_all();
        if let Err(e) = self.store.save() {
            log::warn!("[STORE] Failed to save pregeneration state on shutdown: {}", e);
        }
        log::info!("[REGION] Shut down ({} job(s) stopped)", cancelled);
    }

    pub fn active_region(&self, target: &RegionTarget) -> Option<ActiveRegion> {
        self.require_active(target).ok()
    }

    pub fn get_progress(&self, region: &str) -> u8 {
        self.registry.progress(region)
    }

    pub fn is_ready(&self, region: &str) -> bool {
        self.registry.is_ready(region)
    }

    pub fn priority_complete_time(&self, region: &str) -> Option<DateTime<Utc>> {
        self.registry.priority_complete_time(region)
    }

    pub fn all_complete_time(&self, region: &str) -> Option<DateTime<Utc>> {
        self.registry.all_complete_time(region)
    }

    /// Minutes left for a running job, 0 when there is no estimate
    pub fn estimate_remaining_minutes(&self, region: &str) -> u32 {
        self.registry
            .get(region)
            .map(|job| job.eta_minutes(self.clock.now_millis()))
            .unwrap_or(0)
    }

    /// One row per active region, ordered by slot
    pub fn statuses(&self) -> Vec<RegionRow> {
        let active: Vec<(String, ActiveRegion)> = self
            .lock_slots()
            .iter()
            .filter_map(|(slot, state)| match state {
                SlotState::Active(region) => Some((slot.clone(), region.clone())),
                _ => None,
            })
            .collect();
        let now_ms = self.clock.now_millis();

        let mut rows: Vec<RegionRow> = active
            .into_iter()
            .map(|(slot, region)| {
                let name = region.name();
                let status = self.registry.status(&name);
                let job = self.registry.get(&name);
                RegionRow {
                    slot,
                    kind: region.id.kind,
                    border_size: region.border_size,
                    running: job.is_some(),
                    pending: job.is_none() && self.store.get(&name).is_some(),
                    percent: status.percent.unwrap_or(0),
                    ready: status.ready,
                    priority_completed_at: status.priority_completed_at,
                    all_completed_at: status.all_completed_at,
                    eta_minutes: job.map(|j| j.eta_minutes(now_ms)),
                    region: name,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.slot.cmp(&b.slot));
        rows
    }

    fn start_job(&self, spec: JobSpec, config: &ManagerConfig) -> bool {
        let region = spec.region.clone();
        let job = PregenJob::new(self.job_context(), spec);
        match self.registry.launch(job, config.pregen.tick_interval()) {
            Ok(_) => true,
            Err(e) => {
                log::error!("[PREGEN] Failed to start job for {}: {}", region, e);
                false
            }
        }
    }

    fn job_context(&self) -> JobContext {
        JobContext {
            engine: self.engine.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
            listener: Arc::new(MilestoneNotifier {
                config: self.config.clone(),
                announcer: self.announcer.clone(),
            }),
            clock: self.clock.clone(),
        }
    }

    /// Move the slot into a transitional state, returning what was active
    fn claim(&self, slot: &str, next: SlotState) -> Result<Option<ActiveRegion>, LifecycleError> {
        let mut slots = self.lock_slots();
        let previous = match slots.get(slot) {
            Some(SlotState::Creating | SlotState::Deleting) => {
                return Err(LifecycleError::Busy(slot.to_string()));
            }
            Some(SlotState::Active(region)) => Some(region.clone()),
            None => None,
        };
        slots.insert(slot.to_string(), next);
        Ok(previous)
    }

    /// Cancel, forget, evacuate, unload and purge every generation of a slot
    fn clear_slot(&self, base_name: &str, variation: &str, config: &ManagerConfig) -> PurgeOutcome {
        let prefix = RegionId::slot_prefix(base_name, variation);

        let mut names: HashSet<String> = self
            .registry
            .snapshot()
            .into_keys()
            .filter(|name| name.starts_with(&prefix))
            .collect();
        let removed = self.store.remove_matching(&prefix);
        names.extend(removed.iter().map(|record| record.region.clone()));
        let loaded: Vec<String> = self
            .engine
            .loaded_regions()
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect();
        names.extend(loaded.iter().cloned());

        for name in &names {
            if self.registry.cancel_one(name) {
                log::info!("[REGION] Cancelled pregeneration of {}", name);
            }
            self.registry.forget(name);
        }
        if !removed.is_empty()
            && let Err(e) = self.store.save()
        {
            log::warn!("[STORE] Failed to save pregeneration state: {}", e);
        }

        for name in &loaded {
            self.evacuate(name, &config.messages.evacuated, config);
            self.engine.unload_region(name);
            log::info!("[REGION] Unloaded {}", name);
        }

        purge_folders(self.engine.as_ref(), &prefix, &config.purge)
    }

    fn evacuate(&self, region: &str, template: &str, config: &ManagerConfig) {
        let message = render(template, Placeholders::region(region));
        let occupants = self.engine.occupants(region);
        for occupant in &occupants {
            self.announcer.tell(occupant, &message);
            self.engine.evacuate(occupant, &config.evacuation_command);
        }
        if !occupants.is_empty() {
            log::info!(
                "[REGION] Evacuated {} occupant(s) from {}",
                occupants.len(),
                region
            );
        }
    }

    fn require_active(&self, target: &RegionTarget) -> Result<ActiveRegion, LifecycleError> {
        let config = self.config.current();
        let (base_name, variation) = resolve(&config, target)?;
        let slot = format!("{}.{}", base_name, variation);
        match self.lock_slots().get(&slot) {
            Some(SlotState::Active(region)) => Ok(region.clone()),
            _ => Err(LifecycleError::NotFound(slot)),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, SlotState>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Validate a target against the catalog, returning `(base_name, variation)`
/// with the variation spelled as configured
fn resolve(config: &ManagerConfig, target: &RegionTarget) -> Result<(String, String), LifecycleError> {
    let resource = config.resources.get(target.kind);
    let variation = resource
        .variations
        .iter()
        .find(|v| v.eq_ignore_ascii_case(&target.variation))
        .ok_or_else(|| LifecycleError::UnknownVariation {
            kind: target.kind,
            variation: target.variation.clone(),
        })?;
    Ok((resource.base_name.clone(), variation.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_configured_spelling() {
        let mut config = ManagerConfig::default();
        config.resources.normal.variations = vec!["Deep".into()];

        let (base, variation) =
            resolve(&config, &RegionTarget::new(RegionKind::Normal, "deep")).unwrap();
        assert_eq!(base, "resource_normal");
        assert_eq!(variation, "Deep");

        assert!(matches!(
            resolve(&config, &RegionTarget::new(RegionKind::Normal, "b")),
            Err(LifecycleError::UnknownVariation { .. })
        ));
    }

    #[test]
    fn test_not_ready_message_carries_percent() {
        let err = LifecycleError::NotReady {
            region: "r1".into(),
            percent: 17,
        };
        assert_eq!(err.to_string(), "region r1 is still generating (17%)");
    }
}
