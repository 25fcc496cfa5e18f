//! Resource regions - identity, engine seams and lifecycle

mod engine;
mod id;
mod lifecycle;
pub mod messages;
mod purge;

pub use engine::{Announcer, EngineError, RegionEngine};
pub use id::{RegionId, RegionKind, RegionTarget};
pub use lifecycle::{ActiveRegion, LifecycleError, RegionCoordinator, RegionRow};
pub use purge::{PurgeOutcome, purge_folders};
