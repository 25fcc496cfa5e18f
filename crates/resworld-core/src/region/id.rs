//! Region identity - kind, variation and creation date
//!
//! On disk a region is a folder named `<base_name>.<variation>.<yyyyMMdd>`.
//! Internally it is a structured [`RegionId`]; the string form is produced
//! only at the engine and store boundaries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::lifecycle::LifecycleError;
use crate::config::ResourcesConfig;

const DATE_FORMAT: &str = "%Y%m%d";

/// Dimension type of a resource region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Normal,
    Nether,
    End,
}

impl RegionKind {
    pub const ALL: [RegionKind; 3] = [RegionKind::Normal, RegionKind::Nether, RegionKind::End];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Normal => "normal",
            RegionKind::Nether => "nether",
            RegionKind::End => "end",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionKind {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LifecycleError::UnknownKind(s.to_string()))
    }
}

/// A `(kind, variation)` pair as typed by an operator, e.g. `nether:a`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionTarget {
    pub kind: RegionKind,
    pub variation: String,
}

impl RegionTarget {
    pub fn new(kind: RegionKind, variation: impl Into<String>) -> Self {
        Self {
            kind,
            variation: variation.into(),
        }
    }
}

impl fmt::Display for RegionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.variation)
    }
}

impl FromStr for RegionTarget {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, variation) = s.split_once(':').unwrap_or((s, ""));
        let kind = kind.parse()?;
        if variation.is_empty() {
            return Err(LifecycleError::UnknownVariation {
                kind,
                variation: String::new(),
            });
        }
        Ok(Self::new(kind, variation.to_ascii_lowercase()))
    }
}

/// Structured identity of one concrete region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionId {
    pub kind: RegionKind,
    pub base_name: String,
    pub variation: String,
    pub date: NaiveDate,
}

impl RegionId {
    pub fn new(
        kind: RegionKind,
        base_name: impl Into<String>,
        variation: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            base_name: base_name.into(),
            variation: variation.into(),
            date,
        }
    }

    /// Key shared by every generation of this `(kind, variation)`
    pub fn slot(&self) -> String {
        format!("{}.{}", self.base_name, self.variation)
    }

    /// Name prefix matching every generation of a slot
    pub fn slot_prefix(base_name: &str, variation: &str) -> String {
        format!("{}.{}.", base_name, variation)
    }

    /// Parse a legacy folder name against the configured catalog
    ///
    /// Returns `None` for names that do not belong to any configured kind and
    /// variation or carry no valid date.
    pub fn parse(name: &str, resources: &ResourcesConfig) -> Option<Self> {
        let (rest, date) = name.rsplit_once('.')?;
        let (base_name, variation) = rest.rsplit_once('.')?;
        let kind = resources.kind_for_base_name(base_name)?;
        if !resources.get(kind).has_variation(variation) {
            return None;
        }
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
        Some(Self::new(kind, base_name, variation, date))
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.base_name,
            self.variation,
            self.date.format(DATE_FORMAT)
        )
    }
}
