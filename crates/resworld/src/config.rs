//! Host configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `<stem>.ron` file (if exists, default stem `resworld`)
//! 3. Environment variables prefixed with `RESWORLD_`
//!
//! Example environment variable: `RESWORLD_PREGEN__BATCH_SIZE=20`

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use resworld_core::ManagerConfig;

/// Load the manager configuration from defaults, file and environment
pub fn load(stem: &str) -> Result<ManagerConfig> {
    load_with_prefix(stem, "RESWORLD")
}

fn load_with_prefix(stem: &str, env_prefix: &str) -> Result<ManagerConfig> {
    let defaults = ManagerConfig::default();

    let builder = Config::builder()
        // Layer 1: Compiled defaults
        .set_default("evacuation_command", defaults.evacuation_command)?
        .set_default(
            "pregen.priority_diameter",
            i64::from(defaults.pregen.priority_diameter),
        )?
        .set_default("pregen.tick_interval_ms", defaults.pregen.tick_interval_ms)?
        .set_default("pregen.batch_size", defaults.pregen.batch_size as u64)?
        .set_default("pregen.unit_size", i64::from(defaults.pregen.unit_size))?
        .set_default(
            "pregen.max_border_size",
            i64::from(defaults.pregen.max_border_size),
        )?
        .set_default("purge.attempts", i64::from(defaults.purge.attempts))?
        .set_default("purge.backoff_ms", defaults.purge.backoff_ms)?
        // Layer 2: Config file (optional, won't error if missing)
        .add_source(File::with_name(stem).format(FileFormat::Ron).required(false))
        // Layer 3: Environment variables (RESWORLD_PREGEN__BATCH_SIZE, etc.)
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build().context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stem_in(dir: &TempDir) -> String {
        dir.path().join("resworld").to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_config_with_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_with_prefix(&stem_in(&dir), "RESWORLD_TEST_UNSET").unwrap();
        assert_eq!(config.pregen.batch_size, 10);
        assert_eq!(config.pregen.priority_diameter, 1000);
        assert_eq!(config.purge.attempts, 5);
        assert_eq!(config.evacuation_command, "spawn");
        assert_eq!(config.resources.normal.base_name, "resource_normal");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("resworld.ron"),
            r#"{
                "pregen": { "batch_size": 25, "tick_interval_ms": 50 },
                "resources": { "nether": {
                    "base_name": "mining_nether",
                    "default_border": 2000,
                    "variations": ["a", "b"],
                } },
            }"#,
        )
        .unwrap();

        let config = load_with_prefix(&stem_in(&dir), "RESWORLD_TEST_UNSET").unwrap();
        assert_eq!(config.pregen.batch_size, 25);
        assert_eq!(config.pregen.tick_interval_ms, 50);
        assert_eq!(config.pregen.unit_size, 16);
        assert_eq!(config.resources.nether.base_name, "mining_nether");
        assert!(config.resources.nether.has_variation("b"));
        assert_eq!(config.resources.end.base_name, "resource_end");
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("resworld.ron"),
            r#"{ "pregen": { "batch_size": 25, "unit_size": 8 } }"#,
        )
        .unwrap();
        // Prefix is unique to this test so parallel tests never see it
        unsafe {
            std::env::set_var("RESWORLD_ENV_TEST_PREGEN__BATCH_SIZE", "20");
            std::env::set_var("RESWORLD_ENV_TEST_RESOURCES__END__DEFAULT_BORDER", "900");
        }

        let config = load_with_prefix(&stem_in(&dir), "RESWORLD_ENV_TEST").unwrap();
        assert_eq!(config.pregen.batch_size, 20);
        assert_eq!(config.pregen.unit_size, 8);
        assert_eq!(config.pregen.tick_interval_ms, 250);
        assert_eq!(config.resources.end.default_border, 900);
        assert_eq!(config.resources.end.base_name, "resource_end");
    }

    #[test]
    fn test_partial_resource_override_keeps_kind_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("resworld.ron"),
            r#"{ "resources": { "nether": { "default_border": 2000 } } }"#,
        )
        .unwrap();

        let config = load_with_prefix(&stem_in(&dir), "RESWORLD_TEST_UNSET").unwrap();
        assert_eq!(config.resources.nether.default_border, 2000);
        assert_eq!(config.resources.nether.base_name, "resource_nether");
        assert!(config.resources.nether.has_variation("a"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("resworld.ron"), "{ pregen: ").unwrap();
        assert!(load_with_prefix(&stem_in(&dir), "RESWORLD_TEST_UNSET").is_err());
    }
}
