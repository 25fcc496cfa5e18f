//! Seams to the host world engine and its notification sinks

use thiserror::Error;

use super::id::RegionKind;
use crate::pregen::WorkUnit;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("region {0} is not loaded")]
    NotLoaded(String),

    #[error("engine refused to create {name}: {reason}")]
    Refused { name: String, reason: String },

    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// World-engine capabilities the coordinator and jobs rely on
///
/// `request_materialize` is fire-and-forget and must be idempotent: resumed
/// jobs replay up to one checkpoint interval of units.
pub trait RegionEngine: Send + Sync {
    /// Create and load a new region bounded by `border_size`
    fn create_region(&self, name: &str, kind: RegionKind, border_size: u32)
    -> Result<(), EngineError>;

    /// Load a region that already exists on disk
    fn open_region(&self, name: &str, kind: RegionKind) -> Result<(), EngineError>;

    /// Whether the region exists (loaded or on disk)
    fn region_exists(&self, name: &str) -> bool;

    fn loaded_regions(&self) -> Vec<String>;

    /// Ask the engine to generate one unit if it is absent
    fn request_materialize(&self, region: &str, unit: WorkUnit);

    /// Occupants currently inside a region
    fn occupants(&self, region: &str) -> Vec<String>;

    /// Move an occupant out by running `command` on its behalf
    fn evacuate(&self, occupant: &str, command: &str);

    fn teleport(&self, occupant: &str, region: &str) -> Result<(), EngineError>;

    /// Request unload; may complete asynchronously
    fn unload_region(&self, region: &str);

    /// Names of every region folder in the world container
    fn region_folders(&self) -> Vec<String>;

    fn delete_region_folder(&self, name: &str) -> Result<(), EngineError>;
}

/// Broadcast, console and per-occupant message sinks plus command execution
pub trait Announcer: Send + Sync {
    fn broadcast(&self, message: &str);

    fn console(&self, message: &str);

    fn tell(&self, occupant: &str, message: &str);

    /// Dispatch an operator command; returns false when it was rejected
    fn run_command(&self, command: &str) -> bool;
}
