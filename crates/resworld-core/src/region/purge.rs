//! Folder deletion with bounded retry
//!
//! Unloading may finish asynchronously in the engine, so every attempt waits
//! first and re-scans for folders that still match.

use std::thread;

use super::engine::RegionEngine;
use crate::config::PurgeConfig;

/// Result of a purge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub deleted: Vec<String>,
    /// Folders left behind after the last attempt
    pub remaining: Vec<String>,
    pub attempts: u32,
}

impl PurgeOutcome {
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Delete every folder starting with `prefix` that is not currently loaded
pub fn purge_folders(engine: &dyn RegionEngine, prefix: &str, config: &PurgeConfig) -> PurgeOutcome {
    let mut outcome = PurgeOutcome::default();

    for attempt in 1..=config.attempts.max(1) {
        thread::sleep(config.backoff());
        outcome.attempts = attempt;

        let pending = matching_folders(engine, prefix);
        if pending.is_empty() {
            outcome.remaining.clear();
            break;
        }

        outcome.remaining.clear();
        for folder in pending {
            match engine.delete_region_folder(&folder) {
                Ok(()) => {
                    log::info!("[PURGE] Deleted region folder {}", folder);
                    outcome.deleted.push(folder);
                }
                Err(e) => {
                    log::debug!(
                        "[PURGE] Attempt {}/{} could not delete {}: {}",
                        attempt,
                        config.attempts,
                        folder,
                        e
                    );
                    outcome.remaining.push(folder);
                }
            }
        }

        if outcome.remaining.is_empty() {
            break;
        }
    }

    if !outcome.remaining.is_empty() {
        log::error!(
            "[PURGE] Could not delete {} after {} attempt(s), manual removal required: {}",
            prefix,
            outcome.attempts,
            outcome.remaining.join(", ")
        );
    }
    outcome
}

fn matching_folders(engine: &dyn RegionEngine, prefix: &str) -> Vec<String> {
    let loaded = engine.loaded_regions();
    let mut folders: Vec<String> = engine
        .region_folders()
        .into_iter()
        .filter(|name| name.starts_with(prefix) && !loaded.contains(name))
        .collect();
    folders.sort();
    folders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregen::WorkUnit;
    use crate::region::{EngineError, RegionKind};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Folder set where some folders refuse deletion a fixed number of times
    struct FlakyFolders {
        folders: Mutex<BTreeSet<String>>,
        loaded: Vec<String>,
        failures_left: Mutex<u32>,
    }

    impl FlakyFolders {
        fn new(folders: &[&str], loaded: &[&str], failures: u32) -> Self {
            Self {
                folders: Mutex::new(folders.iter().map(|s| s.to_string()).collect()),
                loaded: loaded.iter().map(|s| s.to_string()).collect(),
                failures_left: Mutex::new(failures),
            }
        }
    }

    impl RegionEngine for FlakyFolders {
        fn create_region(&self, _: &str, _: RegionKind, _: u32) -> Result<(), EngineError> {
            Ok(())
        }
        fn open_region(&self, _: &str, _: RegionKind) -> Result<(), EngineError> {
            Ok(())
        }
        fn region_exists(&self, name: &str) -> bool {
            self.folders.lock().unwrap().contains(name)
        }
        fn loaded_regions(&self) -> Vec<String> {
            self.loaded.clone()
        }
        fn request_materialize(&self, _: &str, _: WorkUnit) {}
        fn occupants(&self, _: &str) -> Vec<String> {
            Vec::new()
        }
        fn evacuate(&self, _: &str, _: &str) {}
        fn teleport(&self, _: &str, _: &str) -> Result<(), EngineError> {
            Ok(())
        }
        fn unload_region(&self, _: &str) {}
        fn region_folders(&self) -> Vec<String> {
            self.folders.lock().unwrap().iter().cloned().collect()
        }
        fn delete_region_folder(&self, name: &str) -> Result<(), EngineError> {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(EngineError::Io {
                    name: name.to_string(),
                    source: std::io::Error::other("busy"),
                });
            }
            self.folders.lock().unwrap().remove(name);
            Ok(())
        }
    }

    fn fast(attempts: u32) -> PurgeConfig {
        PurgeConfig {
            attempts,
            backoff_ms: 0,
        }
    }

    #[test]
    fn test_deletes_matching_folders_only() {
        let engine = FlakyFolders::new(&["res.a.20260101", "res.a.20260102", "res.b.20260101"], &[], 0);
        let outcome = purge_folders(&engine, "res.a.", &fast(3));
        assert!(outcome.is_clean());
        assert_eq!(outcome.deleted, vec!["res.a.20260101", "res.a.20260102"]);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(engine.region_folders(), vec!["res.b.20260101"]);
    }

    #[test]
    fn test_retries_until_deleted() {
        let engine = FlakyFolders::new(&["res.a.20260101"], &[], 2);
        let outcome = purge_folders(&engine, "res.a.", &fast(5));
        assert!(outcome.is_clean());
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_reports_remaining_after_exhaustion() {
        let engine = FlakyFolders::new(&["res.a.20260101"], &[], 10);
        let outcome = purge_folders(&engine, "res.a.", &fast(2));
        assert!(!outcome.is_clean());
        assert_eq!(outcome.remaining, vec!["res.a.20260101"]);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn test_skips_loaded_regions() {
        let engine = FlakyFolders::new(&["res.a.20260101", "res.a.20260102"], &["res.a.20260102"], 0);
        let outcome = purge_folders(&engine, "res.a.", &fast(1));
        assert_eq!(outcome.deleted, vec!["res.a.20260101"]);
        assert!(engine.region_exists("res.a.20260102"));
    }

    #[test]
    fn test_nothing_to_delete() {
        let engine = FlakyFolders::new(&[], &[], 0);
        let outcome = purge_folders(&engine, "res.a.", &fast(3));
        assert!(outcome.is_clean());
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.attempts, 1);
    }
}
