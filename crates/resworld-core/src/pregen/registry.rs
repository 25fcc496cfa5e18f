//! Job registry - running jobs and per-region progress status
//!
//! Two maps behind one lock: live job handles keyed by region name, and the
//! status (percent, readiness, milestone times) callers query. Status outlives
//! the job so a completed region still answers "ready".

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::job::PregenJob;
use super::ticker::{self, StopSignal};

/// Unique id of one job run
pub type JobId = u64;

/// Queryable state of one region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionStatus {
    /// Last reported percent; `None` once the job finished or was cancelled
    pub percent: Option<u8>,
    /// Teleport gate
    pub ready: bool,
    pub priority_completed_at: Option<DateTime<Utc>>,
    pub all_completed_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a running job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub region: String,
    pub percent: u8,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub priority_len: usize,
}

struct JobHandle {
    id: JobId,
    started_at: DateTime<Utc>,
    total: usize,
    priority_len: usize,
    stop: StopSignal,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Stop the job and wait for an in-flight tick to finish
    fn cancel(mut self, region: &str) {
        self.stop.stop();
        let Some(thread) = self.thread.take() else {
            return;
        };
        // A job cancelling itself from its own tick must not join itself
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            log::error!("[PREGEN] Tick thread for {} panicked", region);
        }
    }
}

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<String, JobHandle>,
    status: HashMap<String, RegionStatus>,
}

/// Concurrent map of region name to running job and status
#[derive(Default)]
pub struct JobRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new job
    pub fn next_job_id(&self) -> JobId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register `job` and start ticking it every `interval`
    ///
    /// A job already registered for the same region is stopped and replaced.
    pub fn launch(&self, mut job: PregenJob, interval: Duration) -> io::Result<JobId> {
        let wake = job
            .take_wake()
            .ok_or_else(|| io::Error::other("job was already launched"))?;
        let id = job.id();
        let region = job.region().to_string();
        let mut handle = JobHandle {
            id,
            started_at: job.started_at(),
            total: job.total(),
            priority_len: job.priority_len(),
            stop: job.stop_signal(),
            thread: None,
        };

        let replaced = {
            let mut state = self.lock();
            // Spawned under the lock so the first tick sees its own entry
            handle.thread = Some(ticker::spawn(job, interval, wake)?);
            state.status.entry(region.clone()).or_default();
            state.jobs.insert(region.clone(), handle)
        };

        if let Some(previous) = replaced {
            log::warn!(
                "[PREGEN] Replacing running job {} for {}",
                previous.id,
                region
            );
            previous.cancel(&region);
        }

        log::info!(
            "[PREGEN] Started job {} for {} every {:?}",
            id,
            region,
            interval
        );
        Ok(id)
    }

    pub fn get(&self, region: &str) -> Option<JobSnapshot> {
        let state = self.lock();
        state
            .jobs
            .get(region)
            .map(|handle| snapshot_of(&state, region, handle))
    }

    /// All running jobs, ordered by region name
    pub fn snapshot(&self) -> BTreeMap<String, JobSnapshot> {
        let state = self.lock();
        state
            .jobs
            .iter()
            .map(|(region, handle)| (region.clone(), snapshot_of(&state, region, handle)))
            .collect()
    }

    pub fn is_running(&self, region: &str) -> bool {
        self.lock().jobs.contains_key(region)
    }

    pub fn running_count(&self) -> usize {
        self.lock().jobs.len()
    }

    /// Stop one job, waiting for its in-flight tick; returns false if none ran
    pub fn cancel_one(&self, region: &str) -> bool {
        let Some(handle) = self.lock().jobs.remove(region) else {
            return false;
        };

        log::info!("[PREGEN] Cancelling job {} for {}", handle.id, region);
        handle.cancel(region);

        if let Some(status) = self.lock().status.get_mut(region) {
            status.percent = None;
        }
        true
    }

    /// Stop every job; returns how many were running
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<(String, JobHandle)> = self.lock().jobs.drain().collect();
        let count = handles.len();

        for (region, handle) in handles {
            log::info!("[PREGEN] Cancelling job {} for {}", handle.id, region);
            handle.cancel(&region);
        }

        for status in self.lock().status.values_mut() {
            status.percent = None;
        }
        count
    }

    pub fn report_progress(&self, region: &str, percent: u8) {
        self.lock()
            .status
            .entry(region.to_string())
            .or_default()
            .percent = Some(percent);
    }

    /// Last reported percent, 0 when nothing is known
    pub fn progress(&self, region: &str) -> u8 {
        self.lock()
            .status
            .get(region)
            .and_then(|status| status.percent)
            .unwrap_or(0)
    }

    /// Open the teleport gate, recording when the priority zone finished
    pub fn mark_ready(&self, region: &str, at: Option<DateTime<Utc>>) {
        let mut state = self.lock();
        let status = state.status.entry(region.to_string()).or_default();
        status.ready = true;
        if at.is_some() {
            status.priority_completed_at = at;
        }
    }

    pub fn is_ready(&self, region: &str) -> bool {
        self.lock()
            .status
            .get(region)
            .is_some_and(|status| status.ready)
    }

    /// Record full completion; clears the percent and implies ready
    pub fn mark_completed(&self, region: &str, at: Option<DateTime<Utc>>) {
        let mut state = self.lock();
        let status = state.status.entry(region.to_string()).or_default();
        status.percent = None;
        status.ready = true;
        if at.is_some() {
            status.all_completed_at = at;
        }
    }

    pub fn priority_complete_time(&self, region: &str) -> Option<DateTime<Utc>> {
        self.lock()
            .status
            .get(region)
            .and_then(|status| status.priority_completed_at)
    }

    pub fn all_complete_time(&self, region: &str) -> Option<DateTime<Utc>> {
        self.lock()
            .status
            .get(region)
            .and_then(|status| status.all_completed_at)
    }

    pub fn status(&self, region: &str) -> RegionStatus {
        self.lock().status.get(region).cloned().unwrap_or_default()
    }

    /// Drop everything known about a region's status
    pub fn forget(&self, region: &str) {
        self.lock().status.remove(region);
    }

    /// Remove a finished job's entry if it still belongs to job `id`
    pub(crate) fn release(&self, region: &str, id: JobId) {
        let mut state = self.lock();
        if state.jobs.get(region).is_some_and(|handle| handle.id == id) {
            // Dropping the handle detaches the (exiting) thread
            state.jobs.remove(region);
            log::debug!("[PREGEN] Released job {} for {}", id, region);
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot_of(state: &RegistryState, region: &str, handle: &JobHandle) -> JobSnapshot {
    JobSnapshot {
        id: handle.id,
        region: region.to_string(),
        percent: state
            .status
            .get(region)
            .and_then(|status| status.percent)
            .unwrap_or(0),
        started_at: handle.started_at,
        total: handle.total,
        priority_len: handle.priority_len,
    }
}
