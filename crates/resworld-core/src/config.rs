//! Manager configuration - serializable settings for regions and pregeneration
//!
//! Partial config files (or a missing one) fall back to the compiled
//! defaults field by field, per region kind for the resource catalog.

use crate::region::RegionKind;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Complete manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Command an occupant runs to leave a region that is going away
    pub evacuation_command: String,

    /// Pregeneration cadence and zone sizes
    pub pregen: PregenConfig,

    /// Per-kind naming, border and variation catalog
    pub resources: ResourcesConfig,

    /// Notification templates
    pub messages: MessageTemplates,

    /// Operator commands run at lifecycle milestones
    pub macros: MacroConfig,

    /// Folder deletion retry policy
    pub purge: PurgeConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            evacuation_command: "spawn".to_string(),
            pregen: PregenConfig::default(),
            resources: ResourcesConfig::default(),
            messages: MessageTemplates::default(),
            macros: MacroConfig::default(),
            purge: PurgeConfig::default(),
        }
    }
}

/// Pregeneration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PregenConfig {
    /// Diameter (in blocks) of the square generated first (default: 1000)
    pub priority_diameter: u32,
    /// Delay between batches in milliseconds (default: 250)
    pub tick_interval_ms: u64,
    /// Work units requested per tick (default: 10)
    pub batch_size: usize,
    /// Edge length of one chunk in blocks (default: 16)
    pub unit_size: u32,
    /// Largest border size accepted on create (default: 30000)
    pub max_border_size: u32,
}

impl Default for PregenConfig {
    fn default() -> Self {
        Self {
            priority_diameter: 1000,
            tick_interval_ms: 250,
            batch_size: 10,
            unit_size: 16,
            max_border_size: 30_000,
        }
    }
}

impl PregenConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Settings for one region kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Leading segment of region names, e.g. `resource_normal`
    pub base_name: String,
    /// Border size used when none is given on create
    pub default_border: u32,
    /// Allowed variation labels
    pub variations: Vec<String>,
}

impl ResourceConfig {
    fn for_kind(kind: RegionKind) -> Self {
        Self {
            base_name: format!("resource_{}", kind.as_str()),
            default_border: 5000,
            variations: vec!["a".to_string()],
        }
    }

    pub fn has_variation(&self, variation: &str) -> bool {
        self.variations
            .iter()
            .any(|v| v.eq_ignore_ascii_case(variation))
    }
}

/// Catalog of all region kinds
///
/// Fields missing from a kind's section keep that kind's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ResourcesOverrides")]
pub struct ResourcesConfig {
    pub normal: ResourceConfig,
    pub nether: ResourceConfig,
    pub end: ResourceConfig,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            normal: ResourceConfig::for_kind(RegionKind::Normal),
            nether: ResourceConfig::for_kind(RegionKind::Nether),
            end: ResourceConfig::for_kind(RegionKind::End),
        }
    }
}

/// Partially specified catalog as it appears in config files
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourcesOverrides {
    normal: ResourceOverride,
    nether: ResourceOverride,
    end: ResourceOverride,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceOverride {
    base_name: Option<String>,
    default_border: Option<u32>,
    variations: Option<Vec<String>>,
}

impl ResourceOverride {
    fn apply(self, kind: RegionKind) -> ResourceConfig {
        let defaults = ResourceConfig::for_kind(kind);
        ResourceConfig {
            base_name: self.base_name.unwrap_or(defaults.base_name),
            default_border: self.default_border.unwrap_or(defaults.default_border),
            variations: self.variations.unwrap_or(defaults.variations),
        }
    }
}

impl From<ResourcesOverrides> for ResourcesConfig {
    fn from(overrides: ResourcesOverrides) -> Self {
        Self {
            normal: overrides.normal.apply(RegionKind::Normal),
            nether: overrides.nether.apply(RegionKind::Nether),
            end: overrides.end.apply(RegionKind::End),
        }
    }
}

impl ResourcesConfig {
    pub fn get(&self, kind: RegionKind) -> &ResourceConfig {
        match kind {
            RegionKind::Normal => &self.normal,
            RegionKind::Nether => &self.nether,
            RegionKind::End => &self.end,
        }
    }

    /// Iterate kinds together with their settings
    pub fn iter(&self) -> impl Iterator<Item = (RegionKind, &ResourceConfig)> {
        RegionKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    /// Find the kind whose base name matches
    pub fn kind_for_base_name(&self, base_name: &str) -> Option<RegionKind> {
        self.iter()
            .find(|(_, resource)| resource.base_name == base_name)
            .map(|(kind, _)| kind)
    }
}

/// Notification templates
///
/// Placeholders: `%region_name%` and `%border_size%`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    pub broadcast_success: String,
    pub console_success: String,
    pub creation_failed: String,
    pub priority_ready: String,
    pub console_priority_ready: String,
    pub all_ready: String,
    pub evacuated: String,
    pub closed: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            broadcast_success: "Resource region %region_name% has been generated.".to_string(),
            console_success:
                "Generated resource region %region_name% (border size %border_size%).".to_string(),
            creation_failed: "Failed to generate resource region %region_name%.".to_string(),
            priority_ready:
                "Spawn area of %region_name% is ready. Teleporting is now available.".to_string(),
            console_priority_ready:
                "Priority zone of %region_name% generated, teleport unlocked.".to_string(),
            all_ready: "All zones of resource region %region_name% have been generated."
                .to_string(),
            evacuated: "The resource region is being regenerated, you have been evacuated."
                .to_string(),
            closed: "The resource region has been closed, you have been sent back.".to_string(),
        }
    }
}

/// One operator macro
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroHook {
    pub enabled: bool,
    pub commands: Vec<String>,
}

impl MacroHook {
    /// Commands to run, empty while the hook is disabled
    pub fn active_commands(&self) -> &[String] {
        if self.enabled { &self.commands } else { &[] }
    }
}

/// Macros run at lifecycle milestones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    /// Before an existing region is deleted for regeneration
    pub before_delete: MacroHook,
    /// After a region is created (supports `%border_size%`)
    pub after_generation: MacroHook,
    /// After the priority zone is pregenerated
    pub after_priority_pregen: MacroHook,
    /// After every zone is pregenerated
    pub after_all_pregen: MacroHook,
}

/// Folder deletion retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    /// Deletion attempts before giving up (default: 5)
    pub attempts: u32,
    /// Wait before each attempt in milliseconds (default: 1000)
    pub backoff_ms: u64,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff_ms: 1000,
        }
    }
}

impl PurgeConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Configuration handle shared by the coordinator and its jobs
///
/// `replace` swaps the whole config at once; jobs already running keep the
/// cadence they were started with.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<Arc<ManagerConfig>>>);

impl SharedConfig {
    pub fn new(config: ManagerConfig) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(config))))
    }

    pub fn current(&self) -> Arc<ManagerConfig> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: ManagerConfig) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.evacuation_command, "spawn");
        assert_eq!(config.pregen.priority_diameter, 1000);
        assert_eq!(config.pregen.batch_size, 10);
        assert_eq!(config.pregen.unit_size, 16);
        assert_eq!(config.pregen.max_border_size, 30_000);
        assert_eq!(config.pregen.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.purge.attempts, 5);
        assert_eq!(config.resources.nether.base_name, "resource_nether");
        assert_eq!(config.resources.end.default_border, 5000);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let json = r#"{ "pregen": { "batch_size": 25 }, "resources": { "end": {
            "base_name": "the_end", "default_border": 800, "variations": ["x"] } } }"#;
        let config: ManagerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pregen.batch_size, 25);
        assert_eq!(config.pregen.priority_diameter, 1000);
        assert_eq!(config.resources.end.base_name, "the_end");
        assert_eq!(config.resources.normal.base_name, "resource_normal");
    }

    #[test]
    fn test_partial_resource_keeps_kind_defaults() {
        let json = r#"{ "resources": { "nether": { "default_border": 2000 } } }"#;
        let config: ManagerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.resources.nether.default_border, 2000);
        assert_eq!(config.resources.nether.base_name, "resource_nether");
        assert_eq!(config.resources.nether.variations, vec!["a".to_string()]);
        assert_eq!(config.resources.end, ResourceConfig::for_kind(RegionKind::End));
    }

    #[test]
    fn test_has_variation_is_case_insensitive() {
        let resource = ResourceConfig {
            base_name: "res".into(),
            default_border: 100,
            variations: vec!["a".into(), "Deep".into()],
        };
        assert!(resource.has_variation("A"));
        assert!(resource.has_variation("deep"));
        assert!(!resource.has_variation("b"));
    }

    #[test]
    fn test_kind_for_base_name() {
        let resources = ResourcesConfig::default();
        assert_eq!(
            resources.kind_for_base_name("resource_nether"),
            Some(RegionKind::Nether)
        );
        assert_eq!(resources.kind_for_base_name("unknown"), None);
    }

    #[test]
    fn test_disabled_macro_has_no_commands() {
        let hook = MacroHook {
            enabled: false,
            commands: vec!["say hi".into()],
        };
        assert!(hook.active_commands().is_empty());

        let hook = MacroHook {
            enabled: true,
            ..hook
        };
        assert_eq!(hook.active_commands(), ["say hi".to_string()]);
    }

    #[test]
    fn test_shared_config_replace() {
        let shared = SharedConfig::new(ManagerConfig::default());
        let mut updated = ManagerConfig::default();
        updated.pregen.batch_size = 99;
        shared.replace(updated);
        assert_eq!(shared.current().pregen.batch_size, 99);
    }
}
