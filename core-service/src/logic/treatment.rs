//! Treatment Catalog
//!
//! Static class-name → remediation mapping, loaded once at startup.
//! Lookups never fail: unknown classes get a placeholder entry.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config::ConfigError;

const NOT_AVAILABLE: &str = "Treatment information not available";
const DEFAULT_PREVENTIVE: &str = "Maintain good agricultural practices";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatments {
    #[serde(default)]
    pub organic: Vec<String>,
    #[serde(default)]
    pub chemical: Vec<String>,
    #[serde(default)]
    pub preventive: Vec<String>,
}

impl Treatments {
    /// Placeholder for classes with no catalog entry
    pub fn unavailable() -> Self {
        Self {
            organic: vec![NOT_AVAILABLE.to_string()],
            chemical: vec![NOT_AVAILABLE.to_string()],
            preventive: vec![DEFAULT_PREVENTIVE.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreatmentCatalog {
    entries: HashMap<String, Treatments>,
}

impl TreatmentCatalog {
    pub fn new(entries: HashMap<String, Treatments>) -> Self {
        Self { entries }
    }

    /// Read the catalog file. A missing file yields an empty catalog;
    /// unreadable or malformed content is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::warn!("Treatment catalog not found at {}, continuing without it", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let entries: HashMap<String, Treatments> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        log::info!("Loaded {} treatment entries from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    pub fn lookup(&self, class_name: &str) -> Treatments {
        self.entries
            .get(class_name)
            .cloned()
            .unwrap_or_else(Treatments::unavailable)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
