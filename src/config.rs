use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::output::ReportFormat;
use crate::report::DEFAULT_TITLE;

pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "PersistentData";

/// User defaults persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Directory offered when choosing a DNA export
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dna_dir: Option<PathBuf>,
    /// Directory reports are written to when no --output is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub report_format: ReportFormat,
    pub report_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dna_dir: None,
            output_dir: None,
            report_format: ReportFormat::Pdf,
            report_title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl Settings {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILE_NAME)
    }

    /// Load settings, writing the defaults on first use
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);

        if !path.exists() {
            info!("Creating default settings at {}", path.display());
            let settings = Settings::default();
            settings.save(data_dir)?;
            return Ok(settings);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let path = Self::path(data_dir);
        let contents = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    /// Output directory, falling back to the working directory
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
