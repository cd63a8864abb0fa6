use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Unit descriptors accepted for `energy_efficiency_units` unless overridden.
pub const DEFAULT_UNITS: &[&str] = &[
    "BTU out/BTU in",
    "R value",
    "COP",
    "EER",
    "SEER",
    "HSPF",
    "AFUE",
    "UEF",
    "EF",
    "U value",
    "SHGC",
    "lm/W",
    "W/ft2",
    "relative savings (constant)",
];

/// Knobs for [`crate::load_with`].
///
/// Every field has a default, so an options file only needs the keys it
/// changes:
///
/// ```toml
/// recursive = true
/// deny_unknown_fields = true
/// recognized_units = ["COP", "EER"]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Accepted values for `energy_efficiency_units`.
    pub recognized_units: Vec<String>,
    /// Treat unknown top-level record keys as schema errors instead of warnings.
    pub deny_unknown_fields: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            recognized_units: DEFAULT_UNITS.iter().map(|u| u.to_string()).collect(),
            deny_unknown_fields: false,
        }
    }
}

impl LoadOptions {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_deny_unknown_fields(mut self, deny: bool) -> Self {
        self.deny_unknown_fields = deny;
        self
    }

    pub fn with_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recognized_units = units.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_recognized_unit(&self, unit: &str) -> bool {
        self.recognized_units.iter().any(|u| u == unit)
    }
}
