//! Persisted marker groups.
//!
//! The whole collection is one bincode blob. Every save writes a full
//! snapshot to a temporary file next to the target and renames it into place.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::parsers::MarkerIdSet;
use crate::types::{MarkerDefinition, MarkerGroup};

/// File name of the serialized groups inside the data directory
pub const STORE_FILE_NAME: &str = "serial_groups.bin";

/// Errors raised by store mutations and persistence
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Group name is empty")]
    EmptyGroupName,

    #[error("Group name taken: {0}")]
    DuplicateGroup(String),

    #[error("No group named {0}")]
    UnknownGroup(String),

    #[error("Group {group} already has a marker named {marker}")]
    DuplicateMarker { group: String, marker: String },

    #[error("Group {group} has no marker named {marker}")]
    UnknownMarker { group: String, marker: String },

    #[error("Marker store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Marker store at {} is unreadable: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("Failed to encode marker store: {0}")]
    Encode(#[source] bincode::Error),
}

/// Ordered collection of uniquely named marker groups
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerGroups {
    groups: Vec<MarkerGroup>,
}

impl MarkerGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Groups in creation order
    pub fn iter(&self) -> impl Iterator<Item = &MarkerGroup> {
        self.groups.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|group| group.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&MarkerGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut MarkerGroup, StoreError> {
        self.groups
            .iter_mut()
            .find(|group| group.name == name)
            .ok_or_else(|| StoreError::UnknownGroup(name.to_string()))
    }

    fn validate_new_name(&self, name: &str) -> Result<String, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyGroupName);
        }
        if self.get(name).is_some() {
            return Err(StoreError::DuplicateGroup(name.to_string()));
        }
        Ok(name.to_string())
    }

    /// Add an empty group; the name is trimmed and must be unused
    pub fn create_group(&mut self, name: &str) -> Result<&mut MarkerGroup, StoreError> {
        let name = self.validate_new_name(name)?;
        self.groups.push(MarkerGroup::new(name));
        let index = self.groups.len() - 1;
        Ok(&mut self.groups[index])
    }

    /// Remove a group together with all of its markers
    pub fn delete_group(&mut self, name: &str) -> Result<MarkerGroup, StoreError> {
        let index = self
            .groups
            .iter()
            .position(|group| group.name == name)
            .ok_or_else(|| StoreError::UnknownGroup(name.to_string()))?;
        Ok(self.groups.remove(index))
    }

    pub fn rename_group(&mut self, name: &str, new_name: &str) -> Result<(), StoreError> {
        let new_name = self.validate_new_name(new_name)?;
        self.get_mut(name)?.name = new_name;
        Ok(())
    }

    /// Append a marker; display names are unique within a group
    pub fn add_marker(&mut self, group: &str, marker: MarkerDefinition) -> Result<(), StoreError> {
        let target = self.get_mut(group)?;
        if target.find_marker(&marker.name).is_some() {
            return Err(StoreError::DuplicateMarker {
                group: group.to_string(),
                marker: marker.name,
            });
        }
        target.markers.push(marker);
        Ok(())
    }

    /// Replace the named marker in place, keeping its position
    pub fn update_marker(
        &mut self,
        group: &str,
        name: &str,
        marker: MarkerDefinition,
    ) -> Result<(), StoreError> {
        let target = self.get_mut(group)?;

        if marker.name != name && target.find_marker(&marker.name).is_some() {
            return Err(StoreError::DuplicateMarker {
                group: group.to_string(),
                marker: marker.name,
            });
        }

        let slot = target
            .markers
            .iter_mut()
            .find(|existing| existing.name == name)
            .ok_or_else(|| StoreError::UnknownMarker {
                group: group.to_string(),
                marker: name.to_string(),
            })?;
        *slot = marker;
        Ok(())
    }

    pub fn remove_marker(&mut self, group: &str, name: &str) -> Result<MarkerDefinition, StoreError> {
        let target = self.get_mut(group)?;
        let index = target
            .markers
            .iter()
            .position(|marker| marker.name == name)
            .ok_or_else(|| StoreError::UnknownMarker {
                group: group.to_string(),
                marker: name.to_string(),
            })?;
        Ok(target.markers.remove(index))
    }

    /// Every marker ID across all groups, deduplicated
    pub fn required_marker_ids(&self) -> MarkerIdSet {
        self.groups
            .iter()
            .flat_map(|group| group.markers.iter())
            .map(|marker| marker.marker_id.clone())
            .collect()
    }

    /// Total number of markers across all groups
    pub fn marker_count(&self) -> usize {
        self.groups.iter().map(|group| group.markers.len()).sum()
    }
}

impl<'a> IntoIterator for &'a MarkerGroups {
    type Item = &'a MarkerGroup;
    type IntoIter = std::slice::Iter<'a, MarkerGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Path of the marker store inside a data directory
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE_NAME)
}

/// Load the marker store, creating and saving an empty one on first run
pub fn load(path: &Path) -> Result<MarkerGroups, StoreError> {
    if !path.exists() {
        info!("No marker store at {}, creating an empty one", path.display());
        let groups = MarkerGroups::new();
        save(path, &groups)?;
        return Ok(groups);
    }

    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let groups: MarkerGroups =
        bincode::deserialize_from(BufReader::new(file)).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(
        "Loaded {} groups ({} markers) from {}",
        groups.len(),
        groups.marker_count(),
        path.display()
    );
    Ok(groups)
}

/// Overwrite the marker store with a full snapshot
pub fn save(path: &Path, groups: &MarkerGroups) -> Result<(), StoreError> {
    let io_error = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_error)?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(io_error)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        bincode::serialize_into(&mut writer, groups).map_err(StoreError::Encode)?;
        writer.flush().map_err(io_error)?;
    }
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;

    debug!("Saved {} groups to {}", groups.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn marker(name: &str, marker_id: &str) -> MarkerDefinition {
        MarkerDefinition {
            name: name.to_string(),
            marker_id: marker_id.to_string(),
            twenty_three_wild: "A".to_string(),
            twenty_three_variant: "G".to_string(),
            ancestry_wild: "A".to_string(),
            ancestry_variant: "G".to_string(),
            red_note: "Risk".to_string(),
            yellow_note: "Carrier".to_string(),
            green_note: "OK".to_string(),
        }
    }

    #[test]
    fn test_first_load_creates_empty_store() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = store_path(&temp_dir.path().join("PersistentData"));

        let groups = load(&path)?;

        assert!(groups.is_empty());
        assert!(path.exists());
        assert_eq!(load(&path)?, groups);
        Ok(())
    }

    #[test]
    fn test_save_load_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = store_path(temp_dir.path());

        let mut groups = MarkerGroups::new();
        groups.create_group("Methylation")?;
        groups.create_group("Detox")?;
        groups.add_marker("Methylation", marker("MTHFR C677T", "rs1801133"))?;
        groups.add_marker("Methylation", marker("MTHFR A1298C", "rs1801131"))?;
        groups.add_marker("Detox", marker("", ""))?;

        save(&path, &groups)?;
        let loaded = load(&path)?;

        assert_eq!(loaded, groups);
        assert_eq!(
            loaded.names().collect::<Vec<_>>(),
            vec!["Methylation", "Detox"]
        );
        Ok(())
    }

    #[test]
    fn test_save_replaces_previous_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = store_path(temp_dir.path());

        let mut groups = MarkerGroups::new();
        groups.create_group("Old")?;
        save(&path, &groups)?;

        groups.delete_group("Old")?;
        groups.create_group("New")?;
        save(&path, &groups)?;

        assert_eq!(load(&path)?.names().collect::<Vec<_>>(), vec!["New"]);
        Ok(())
    }

    #[test]
    fn test_corrupt_store() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = store_path(temp_dir.path());
        fs::write(&path, [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01])?;

        assert!(matches!(load(&path), Err(StoreError::Decode { .. })));
        Ok(())
    }

    #[test]
    fn test_group_names_are_trimmed_and_unique() {
        let mut groups = MarkerGroups::new();
        groups.create_group("  Detox ").unwrap();

        assert!(groups.get("Detox").is_some());
        assert!(matches!(
            groups.create_group("Detox"),
            Err(StoreError::DuplicateGroup(_))
        ));
        assert!(matches!(
            groups.create_group("   "),
            Err(StoreError::EmptyGroupName)
        ));
    }

    #[test]
    fn test_delete_group_cascades() {
        let mut groups = MarkerGroups::new();
        groups.create_group("Detox").unwrap();
        groups.add_marker("Detox", marker("GSTP1", "rs1695")).unwrap();

        let removed = groups.delete_group("Detox").unwrap();

        assert_eq!(removed.markers.len(), 1);
        assert_eq!(groups.marker_count(), 0);
        assert!(matches!(
            groups.delete_group("Detox"),
            Err(StoreError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_rename_group() {
        let mut groups = MarkerGroups::new();
        groups.create_group("Detox").unwrap();
        groups.create_group("Methylation").unwrap();

        groups.rename_group("Detox", "Phase II").unwrap();
        assert!(groups.get("Phase II").is_some());
        assert!(matches!(
            groups.rename_group("Phase II", "Methylation"),
            Err(StoreError::DuplicateGroup(_))
        ));
    }

    #[test]
    fn test_marker_edits_keep_order() {
        let mut groups = MarkerGroups::new();
        groups.create_group("Methylation").unwrap();
        groups.add_marker("Methylation", marker("A", "rs1")).unwrap();
        groups.add_marker("Methylation", marker("B", "rs2")).unwrap();
        groups.add_marker("Methylation", marker("C", "rs3")).unwrap();

        groups
            .update_marker("Methylation", "B", marker("B2", "rs22"))
            .unwrap();
        groups.remove_marker("Methylation", "A").unwrap();

        let ids: Vec<&str> = groups
            .get("Methylation")
            .unwrap()
            .markers
            .iter()
            .map(|m| m.marker_id.as_str())
            .collect();
        assert_eq!(ids, vec!["rs22", "rs3"]);
    }

    #[test]
    fn test_marker_name_conflicts() {
        let mut groups = MarkerGroups::new();
        groups.create_group("Methylation").unwrap();
        groups.add_marker("Methylation", marker("A", "rs1")).unwrap();
        groups.add_marker("Methylation", marker("B", "rs2")).unwrap();

        assert!(matches!(
            groups.add_marker("Methylation", marker("A", "rs9")),
            Err(StoreError::DuplicateMarker { .. })
        ));
        assert!(matches!(
            groups.update_marker("Methylation", "B", marker("A", "rs2")),
            Err(StoreError::DuplicateMarker { .. })
        ));
        assert!(matches!(
            groups.remove_marker("Methylation", "Z"),
            Err(StoreError::UnknownMarker { .. })
        ));
        assert!(matches!(
            groups.add_marker("Missing", marker("A", "rs1")),
            Err(StoreError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_required_marker_ids_deduplicated() {
        let mut groups = MarkerGroups::new();
        groups.create_group("Methylation").unwrap();
        groups.create_group("Detox").unwrap();
        groups.add_marker("Methylation", marker("MTHFR", "rs1801133")).unwrap();
        groups.add_marker("Methylation", marker("COMT", "rs4680")).unwrap();
        groups.add_marker("Detox", marker("MTHFR", "rs1801133")).unwrap();

        let ids = groups.required_marker_ids();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains("rs1801133"));
        assert!(ids.contains("rs4680"));
        assert!(MarkerGroups::new().required_marker_ids().is_empty());
    }
}
