//! Configuration file support for the taper planner.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/taper/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TaperConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub composition: CompositionConfig,

    #[serde(default)]
    pub catalogue: CatalogueConfig,
}

/// Limits applied by the schedule orchestrator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Absolute plan length from the start date
    #[serde(default = "default_cap_days")]
    pub cap_days: u32,

    /// Hard ceiling on boundaries, independent of dates
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cap_days: default_cap_days(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Piece composition parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompositionConfig {
    /// Per-slot unit cap for the gabapentin three-way split search
    #[serde(default = "default_max_units_per_slot")]
    pub max_units_per_slot: u32,

    /// Permit quarter tablets for benzodiazepines (whole-only medicines excepted)
    #[serde(default)]
    pub allow_benzodiazepine_quarters: bool,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            max_units_per_slot: default_max_units_per_slot(),
            allow_benzodiazepine_quarters: false,
        }
    }
}

/// Catalogue source
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogueConfig {
    /// TOML catalogue replacing the built-in one
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// Default value functions
fn default_cap_days() -> u32 {
    90
}

fn default_max_iterations() -> u32 {
    200
}

fn default_max_units_per_slot() -> u32 {
    4
}

impl TaperConfig {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TaperConfig = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let base = match dirs::config_dir() {
            Some(dir) => dir,
            None => {
                let home = std::env::var("HOME").map_err(|_| {
                    Error::Config("HOME environment variable not set".into())
                })?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("taper").join("config.toml"))
    }

    /// Reject limits that would make generation meaningless
    pub fn validate(&self) -> Result<()> {
        if self.schedule.cap_days == 0 {
            return Err(Error::Config("schedule.cap_days must be at least 1".into()));
        }
        if self.schedule.max_iterations == 0 {
            return Err(Error::Config(
                "schedule.max_iterations must be at least 1".into(),
            ));
        }
        if self.composition.max_units_per_slot == 0 {
            return Err(Error::Config(
                "composition.max_units_per_slot must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TaperConfig::default();
        assert_eq!(config.schedule.cap_days, 90);
        assert_eq!(config.schedule.max_iterations, 200);
        assert_eq!(config.composition.max_units_per_slot, 4);
        assert!(!config.composition.allow_benzodiazepine_quarters);
        assert!(config.catalogue.path.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = TaperConfig::default();
        config.schedule.cap_days = 120;
        config.save_to(&path).unwrap();

        let parsed = TaperConfig::load_from(&path).unwrap();
        assert_eq!(parsed.schedule.cap_days, 120);
        assert_eq!(
            parsed.composition.max_units_per_slot,
            config.composition.max_units_per_slot
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[composition]
allow_benzodiazepine_quarters = true
"#;
        let config: TaperConfig = toml::from_str(toml_str).unwrap();
        assert!(config.composition.allow_benzodiazepine_quarters);
        assert_eq!(config.composition.max_units_per_slot, 4); // default
        assert_eq!(config.schedule.cap_days, 90); // default
    }

    #[test]
    fn test_zero_cap_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\ncap_days = 0\n").unwrap();

        assert!(matches!(
            TaperConfig::load_from(&path),
            Err(Error::Config(_))
        ));
    }
}
