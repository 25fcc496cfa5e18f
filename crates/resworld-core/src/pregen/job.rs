//! Pregeneration job - resumable, cancellable batch runner for one region
//!
//! State machine: `Planned -> Running -> PriorityReady -> Completed`, with
//! `Cancelled` reachable from any non-terminal state.
//!
//! The cursor counts *requested* chunks. Materialization is fire-and-forget,
//! so a job can finish before the engine has rendered everything it asked for.

use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use std::sync::Arc;

use super::planner::PregenPlan;
use super::registry::{JobId, JobRegistry};
use super::ticker::StopSignal;
use crate::clock::Clock;
use crate::config::PregenConfig;
use crate::region::RegionEngine;
use crate::store::{ProgressRecord, ProgressStore};

/// Receives the two one-shot milestones of a job
///
/// Called on the job's tick thread; implementations must not block on the
/// job registry's cancel operations.
pub trait MilestoneListener: Send + Sync {
    /// Every unit of the priority zone has been requested
    fn priority_ready(&self, region: &str);

    /// Every unit of the region has been requested
    fn all_ready(&self, region: &str);
}

/// Collaborators a job needs while ticking
#[derive(Clone)]
pub struct JobContext {
    pub engine: Arc<dyn RegionEngine>,
    pub store: Arc<ProgressStore>,
    pub registry: Arc<JobRegistry>,
    pub listener: Arc<dyn MilestoneListener>,
    pub clock: Arc<dyn Clock>,
}

/// Parameters for starting or resuming a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub region: String,
    pub border_size: u32,
    pub priority_diameter: u32,
    pub unit_size: u32,
    pub batch_size: usize,
    /// Plan index to continue from (0 for a fresh start)
    pub resume_index: usize,
    pub priority_completed: bool,
}

impl JobSpec {
    /// Fresh pregeneration of a newly created region
    pub fn fresh(region: impl Into<String>, border_size: u32, pregen: &PregenConfig) -> Self {
        Self {
            region: region.into(),
            border_size,
            priority_diameter: pregen.priority_diameter,
            unit_size: pregen.unit_size,
            batch_size: pregen.batch_size,
            resume_index: 0,
            priority_completed: false,
        }
    }

    /// Continue from a persisted record
    pub fn resume(record: &ProgressRecord, pregen: &PregenConfig) -> Self {
        Self {
            resume_index: record.cursor,
            priority_completed: record.priority_completed,
            ..Self::fresh(record.region.clone(), record.border_size, pregen)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Planned,
    Running,
    PriorityReady,
    Completed,
    Cancelled,
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// More work remains
    Continue,
    /// The last unit was requested on this tick
    Completed,
    /// The job was stopped before this tick did any work
    Cancelled,
}

/// Batch runner bound to one region
pub struct PregenJob {
    id: JobId,
    region: String,
    plan: PregenPlan,
    cursor: usize,
    batch_size: usize,
    priority_completed: bool,
    last_checkpoint_decile: u8,
    started_at: DateTime<Utc>,
    state: JobState,
    stop: StopSignal,
    wake: Option<Receiver<()>>,
    ctx: JobContext,
}

impl PregenJob {
    /// Plan the region and write its initial progress record
    pub fn new(ctx: JobContext, spec: JobSpec) -> Self {
        let plan =
            PregenPlan::with_unit_size(spec.border_size, spec.priority_diameter, spec.unit_size);
        let total = plan.total();

        let cursor = if spec.resume_index > total {
            log::warn!(
                "[PREGEN] Saved index {} for {} exceeds plan size {} (border changed?), clamping",
                spec.resume_index,
                spec.region,
                total
            );
            total
        } else {
            spec.resume_index
        };

        ctx.store.upsert(ProgressRecord {
            region: spec.region.clone(),
            border_size: spec.border_size,
            cursor,
            priority_completed: spec.priority_completed,
            all_completed: false,
        });
        if let Err(e) = ctx.store.save() {
            log::warn!("[PREGEN] Failed to persist initial state for {}: {}", spec.region, e);
        }

        let (stop, wake) = StopSignal::pair();

        Self {
            id: ctx.registry.next_job_id(),
            region: spec.region,
            plan,
            cursor,
            batch_size: spec.batch_size.max(1),
            priority_completed: spec.priority_completed,
            last_checkpoint_decile: percent_of(cursor, total) / 10,
            started_at: ctx.clock.now(),
            state: JobState::Planned,
            stop,
            wake: Some(wake),
            ctx,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn plan(&self) -> &PregenPlan {
        &self.plan
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.plan.total()
    }

    pub fn priority_len(&self) -> usize {
        self.plan.priority_len()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_priority_completed(&self) -> bool {
        self.priority_completed
    }

    /// Integer percent of requested units
    pub fn percent(&self) -> u8 {
        percent_of(self.cursor, self.plan.total())
    }

    /// Handle for stopping this job from another thread
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub(crate) fn take_wake(&mut self) -> Option<Receiver<()>> {
        self.wake.take()
    }

    pub(crate) fn mark_cancelled(&mut self) {
        if self.state != JobState::Completed {
            self.state = JobState::Cancelled;
        }
    }

    /// Drop this job's registry entry after natural completion
    pub(crate) fn release(&self) {
        self.ctx.registry.release(&self.region, self.id);
    }

    /// Request the next batch and advance progress
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            JobState::Completed => return TickOutcome::Completed,
            JobState::Cancelled => return TickOutcome::Cancelled,
            _ => {}
        }
        if self.stop.is_stopped() {
            self.state = JobState::Cancelled;
            return TickOutcome::Cancelled;
        }
        if self.state == JobState::Planned {
            self.state = if self.priority_completed {
                JobState::PriorityReady
            } else {
                JobState::Running
            };
        }

        let total = self.plan.total();
        let end = (self.cursor + self.batch_size).min(total);
        for unit in &self.plan.units()[self.cursor..end] {
            log::trace!("[PREGEN] {} requesting chunk ({}, {})", self.region, unit.x, unit.z);
            self.ctx.engine.request_materialize(&self.region, *unit);
        }
        self.cursor = end;

        let percent = percent_of(self.cursor, total);
        self.ctx.registry.report_progress(&self.region, percent);

        if percent / 10 > self.last_checkpoint_decile {
            log::info!("[PREGEN] {} generating chunks... {}%", self.region, percent);
            let cursor = self.cursor;
            self.ctx.store.update(&self.region, |record| record.cursor = cursor);
            self.persist("checkpoint");
            self.last_checkpoint_decile = percent / 10;
        }

        if !self.priority_completed && self.cursor >= self.plan.priority_len() {
            self.finish_priority_zone();
        }

        if self.cursor >= total {
            self.finish();
            return TickOutcome::Completed;
        }

        TickOutcome::Continue
    }

    fn finish_priority_zone(&mut self) {
        self.priority_completed = true;
        self.state = JobState::PriorityReady;
        log::info!(
            "[PREGEN] Priority zone of {} requested ({} chunks)",
            self.region,
            self.plan.priority_len()
        );

        self.ctx.listener.priority_ready(&self.region);
        self.ctx
            .registry
            .mark_ready(&self.region, Some(self.ctx.clock.now()));
        self.ctx
            .store
            .update(&self.region, |record| record.priority_completed = true);
        self.persist("priority flag");
    }

    fn finish(&mut self) {
        log::info!(
            "[PREGEN] All {} chunks of {} requested",
            self.plan.total(),
            self.region
        );

        self.ctx.listener.all_ready(&self.region);
        self.ctx
            .registry
            .mark_completed(&self.region, Some(self.ctx.clock.now()));
        self.ctx
            .store
            .update(&self.region, |record| record.all_completed = true);
        self.ctx.store.remove(&self.region);
        self.persist("completion");
        self.state = JobState::Completed;
    }

    fn persist(&self, what: &str) {
        if let Err(e) = self.ctx.store.save() {
            log::warn!(
                "[PREGEN] Failed to persist {} for {}: {}",
                what,
                self.region,
                e
            );
        }
    }
}

fn percent_of(cursor: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        (cursor * 100 / total) as u8
    }
}
