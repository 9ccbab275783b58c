use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::model::RepairParams;
use crate::pipeline::{DEFAULT_SAMPLE_SIZE, RepairOptions};
use crate::reconstruct::ReconstructOptions;

pub const PREFERENCES_FILE: &str = ".recurfix.yml";
pub const DEFAULT_MEMORY_BUDGET_MIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Operator preferences remembered between runs. Every field is optional;
/// values given on the command line take precedence.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_distance: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_sample_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_size_mib: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_budget_mib: Option<u64>,
}

impl Preferences {
    /// Fields set in `overrides` win over the ones stored here.
    pub fn merged_with(&self, overrides: &Preferences) -> Preferences {
        Preferences {
            chunk_size: overrides.chunk_size.or(self.chunk_size),
            recurrence_size: overrides.recurrence_size.or(self.recurrence_size),
            recurrence_distance: overrides.recurrence_distance.or(self.recurrence_distance),
            consistency_sample_size: overrides
                .consistency_sample_size
                .or(self.consistency_sample_size),
            segment_size_mib: overrides.segment_size_mib.or(self.segment_size_mib),
            memory_budget_mib: overrides.memory_budget_mib.or(self.memory_budget_mib),
        }
    }

    pub fn repair_params(&self) -> Result<RepairParams> {
        let Some(chunk_size) = self.chunk_size else {
            bail!("no chunk size given; pass --chunk-size");
        };
        let Some(recurrence_size) = self.recurrence_size else {
            bail!("no recurrence size given; pass --recurrence-size");
        };
        let Some(recurrence_distance) = self.recurrence_distance else {
            bail!("no recurrence distance given; pass --recurrence-distance");
        };
        Ok(RepairParams {
            chunk_size,
            recurrence_size,
            recurrence_distance,
        })
    }

    pub fn repair_options(&self, seed: Option<u64>) -> RepairOptions {
        RepairOptions {
            consistency_sample_size: self.consistency_sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE),
            reconstruct: ReconstructOptions {
                memory_budget: self
                    .memory_budget_mib
                    .unwrap_or(DEFAULT_MEMORY_BUDGET_MIB)
                    .saturating_mul(MIB),
                segment_target: self.segment_size_mib.map(|mib| mib.saturating_mul(MIB)),
            },
            seed,
        }
    }
}

pub fn default_preferences_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(PREFERENCES_FILE))
}

/// A missing file yields empty preferences.
pub fn load_preferences(path: &Path) -> Result<Preferences> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Preferences::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading preferences {}", path.display()));
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Preferences::default());
    }
    serde_yaml::from_slice(&bytes).with_context(|| format!("parsing preferences {}", path.display()))
}

/// Merges `prefs` into the file at `path`, keeping keys this tool does not know.
pub fn save_preferences(path: &Path, prefs: &Preferences) -> Result<()> {
    let mut stored = match std::fs::read(path) {
        Ok(bytes) => match serde_yaml::from_slice::<serde_yaml::Value>(&bytes) {
            Ok(serde_yaml::Value::Mapping(map)) => map,
            _ => serde_yaml::Mapping::new(),
        },
        Err(_) => serde_yaml::Mapping::new(),
    };

    if let serde_yaml::Value::Mapping(fields) = serde_yaml::to_value(prefs)? {
        for (key, value) in fields {
            stored.insert(key, value);
        }
    }

    let text = serde_yaml::to_string(&serde_yaml::Value::Mapping(stored))?;
    std::fs::write(path, text).with_context(|| format!("writing preferences {}", path.display()))
}
