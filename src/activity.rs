//! Append-only text logs kept next to the marker store.
//!
//! `log.txt` gets one timestamped line per user-visible event and
//! `not_founds.txt` gets one timestamped block per group whose markers were
//! missing from a DNA export.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const ACTIVITY_LOG_FILE: &str = "log.txt";
pub const NOT_FOUND_LOG_FILE: &str = "not_founds.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone)]
pub struct ActivityLog {
    activity_path: PathBuf,
    not_found_path: PathBuf,
}

impl ActivityLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            activity_path: data_dir.join(ACTIVITY_LOG_FILE),
            not_found_path: data_dir.join(NOT_FOUND_LOG_FILE),
        }
    }

    pub fn activity_path(&self) -> &Path {
        &self.activity_path
    }

    pub fn not_found_path(&self) -> &Path {
        &self.not_found_path
    }

    fn open_append(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))
    }

    /// Record one event line
    pub fn record(&self, message: impl AsRef<str>) -> Result<()> {
        let mut file = Self::open_append(&self.activity_path)?;
        writeln!(
            file,
            "{}: {}",
            Local::now().format(TIMESTAMP_FORMAT),
            message.as_ref()
        )
        .with_context(|| format!("Failed to write {}", self.activity_path.display()))
    }

    /// Record a batch of marker IDs missing from an export as one block
    pub fn record_not_found(&self, marker_ids: &[String]) -> Result<()> {
        if marker_ids.is_empty() {
            return Ok(());
        }

        let mut writer = BufWriter::new(Self::open_append(&self.not_found_path)?);
        writeln!(writer, "{}:", Local::now().format(TIMESTAMP_FORMAT))?;
        for marker_id in marker_ids {
            writeln!(writer, "{}", marker_id)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", self.not_found_path.display()))
    }
}
