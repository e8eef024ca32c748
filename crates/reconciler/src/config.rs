//! Reconciler configuration and the desired-state document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::{Codec, NumberFormat};
use crate::error::{Error, Result};
use crate::ignore::IgnoreRuleConfig;
use crate::types::{MetadataRecord, MetadataSet};

/// Environment variable overriding [`ReconcilerConfig::number_format`].
pub const ENV_NUMBER_FORMAT: &str = "METASYNC_NUMBER_FORMAT";
/// Environment variable overriding [`ReconcilerConfig::dry_run`].
pub const ENV_DRY_RUN: &str = "METASYNC_DRY_RUN";

/// Configuration for the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// How NUMBER values are rendered and validated.
    pub number_format: NumberFormat,
    /// Remote entries to leave alone.
    pub ignore: Vec<IgnoreRuleConfig>,
    /// Plan only; send no mutations.
    pub dry_run: bool,
}

impl ReconcilerConfig {
    /// The codec implied by this configuration.
    pub const fn codec(&self) -> Codec {
        Codec::new(self.number_format)
    }

    /// Apply `METASYNC_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unparseable override.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unparseable override.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(format) = lookup(ENV_NUMBER_FORMAT) {
            self.number_format = format.parse()?;
        }

        if let Some(flag) = lookup(ENV_DRY_RUN) {
            self.dry_run = parse_flag(&flag).ok_or_else(|| {
                Error::invalid_config(format!("{ENV_DRY_RUN} must be a boolean, got '{flag}'"))
            })?;
        }

        Ok(self)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// A desired-state document: reconciler settings plus the configured
/// entries.
///
/// ```toml
/// [settings]
/// number_format = "integral"
///
/// [[settings.ignore]]
/// key_regex = "^vcd\\."
/// conflict_action = "warn"
///
/// [[entry]]
/// key = "replicas"
/// value = "3"
/// type = "NUMBER"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFile {
    #[serde(default)]
    pub settings: ReconcilerConfig,
    #[serde(default, rename = "entry")]
    pub entries: Vec<MetadataRecord>,
}

impl SyncFile {
    /// Load a TOML, YAML or JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Core` when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(metasync_core::fs::load_structured(path)?)
    }

    /// Decode the configured entries with the document's own settings.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn desired(&self) -> Result<MetadataSet> {
        MetadataSet::from_records(&self.entries, &self.settings.codec())
    }
}
