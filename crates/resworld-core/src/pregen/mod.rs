//! Chunk pregeneration - planning, batch jobs, and the job registry

pub mod eta;
mod job;
pub mod planner;
mod registry;
mod ticker;

pub use eta::estimate_remaining_minutes;
pub use job::{JobContext, JobSpec, JobState, MilestoneListener, PregenJob, TickOutcome};
pub use planner::{DEFAULT_UNIT_SIZE, PregenPlan, WorkUnit, unit_radius};
pub use registry::{JobId, JobRegistry, JobSnapshot, RegionStatus};
pub use ticker::StopSignal;
