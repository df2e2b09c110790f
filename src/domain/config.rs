use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::{AcademicYear, postponement::LearningUnitPolicy};

/// Configuration for the yearly postponement of learning units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// How many academic years ahead of the current one snapshots are
    /// extended to.
    horizon: u16,

    /// The academic year postponement is computed from.
    ///
    /// If unset, the academic year running today is used.
    current_year: Option<AcademicYear>,

    /// Whether classes are excluded from postponement.
    pub exclude_classes: bool,

    /// Whether external units followed through a mobility program are
    /// excluded from postponement.
    pub exclude_mobility: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            current_year: None,
            exclude_classes: true,
            exclude_mobility: true,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// The number of years ahead snapshots are extended to.
    #[must_use]
    pub const fn horizon(&self) -> u16 {
        self.horizon
    }

    /// Sets the number of years ahead snapshots are extended to.
    pub const fn set_horizon(&mut self, horizon: u16) {
        self.horizon = horizon;
    }

    /// Pins the academic year postponement is computed from.
    pub const fn set_current_year(&mut self, year: Option<AcademicYear>) {
        self.current_year = year;
    }

    /// The academic year postponement is computed from.
    #[must_use]
    pub fn current_year(&self) -> AcademicYear {
        self.current_year
            .unwrap_or_else(|| AcademicYear::containing(Utc::now().date_naive()))
    }

    /// The learning-unit postponement policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> LearningUnitPolicy {
        LearningUnitPolicy {
            horizon: self.current_year().plus(self.horizon),
            exclude_classes: self.exclude_classes,
            exclude_mobility: self.exclude_mobility,
        }
    }
}

const fn default_horizon() -> u16 {
    6
}

const fn default_true() -> bool {
    true
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        /// Years ahead of the current academic year ("N+6").
        #[serde(default = "default_horizon")]
        horizon: u16,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_year: Option<AcademicYear>,

        #[serde(default = "default_true")]
        exclude_classes: bool,

        #[serde(default = "default_true")]
        exclude_mobility: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                horizon,
                current_year,
                exclude_classes,
                exclude_mobility,
            } => Self {
                horizon,
                current_year,
                exclude_classes,
                exclude_mobility,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            horizon: config.horizon,
            current_year: config.current_year,
            exclude_classes: config.exclude_classes,
            exclude_mobility: config.exclude_mobility,
        }
    }
}
