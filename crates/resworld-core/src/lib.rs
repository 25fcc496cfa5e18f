//! Resource region lifecycle and resumable priority chunk pregeneration
//!
//! Regions are bounded worlds that are created on demand, pregenerated in
//! priority order (spawn area first), and torn down safely. Pregeneration
//! progress is checkpointed to a single JSON store so it survives restarts.

pub mod clock;
pub mod config;
pub mod pregen;
pub mod region;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ManagerConfig, SharedConfig};
pub use pregen::{JobRegistry, JobSnapshot, PregenJob, PregenPlan, WorkUnit};
pub use region::{
    Announcer, EngineError, LifecycleError, PurgeOutcome, RegionCoordinator, RegionEngine,
    RegionId, RegionKind, RegionTarget,
};
pub use store::{ProgressRecord, ProgressStore};
