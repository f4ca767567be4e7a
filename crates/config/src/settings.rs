// User settings
// Loaded from ~/.config/memgrid/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use memgrid_engine::snapshot::SnapshotForm;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Store
    /// None = `<data_dir>/memgrid/memgrid.db`
    #[serde(rename = "store.path")]
    pub store_path: Option<PathBuf>,

    #[serde(rename = "store.snapshotForm")]
    pub snapshot_form: SnapshotForm,

    // New sheets (header row and column included)
    #[serde(rename = "sheet.defaultColumns")]
    pub default_columns: usize,

    #[serde(rename = "sheet.defaultRows")]
    pub default_rows: usize,

    #[serde(rename = "sheet.triggerSendDeep")]
    pub trigger_send_deep: i64,

    // Prompt text
    #[serde(rename = "export.includeNote")]
    pub include_note: bool,

    #[serde(rename = "export.includeRules")]
    pub include_rules: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            snapshot_form: SnapshotForm::Full,
            default_columns: 3,
            default_rows: 2,
            trigger_send_deep: 1,
            include_note: true,
            include_rules: true,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memgrid")
            .join("settings.json")
    }

    /// Load from the default path. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, json).map_err(io_err)
    }

    /// The configured store, or the default under the data directory.
    pub fn effective_store_path(&self) -> PathBuf {
        match &self.store_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("memgrid")
                .join("memgrid.db"),
        }
    }
}
