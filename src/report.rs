//! Renderer-agnostic report tables.
//!
//! Each classified group becomes a table with a fixed header row, one row per
//! marker, and the cells a renderer should colour.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::analysis::ClassifiedGroup;
use crate::types::{Classification, Highlight, VendorFormat};

pub const TABLE_HEADER: [&str; 4] = ["Gene", "RS#", "Wild/Var", "Result"];

/// Column holding the classification note
pub const RESULT_COLUMN: usize = 3;

pub const DEFAULT_TITLE: &str = "Variant Report";

/// A (column, row) cell coordinate; row 0 is the header row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub column: usize,
    pub row: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportRow {
    pub gene: String,
    pub marker_id: String,
    pub alleles: String,
    pub result: String,
    pub classification: Classification,
}

impl ReportRow {
    pub fn cells(&self) -> [&str; 4] {
        [
            self.gene.as_str(),
            self.marker_id.as_str(),
            self.alleles.as_str(),
            self.result.as_str(),
        ]
    }
}

/// One group as a table ready for rendering
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupTable {
    pub name: String,
    pub rows: Vec<ReportRow>,
    pub red: Vec<CellRef>,
    pub yellow: Vec<CellRef>,
    pub green: Vec<CellRef>,
}

impl GroupTable {
    pub fn from_classified(group: &ClassifiedGroup) -> Self {
        let mut table = GroupTable {
            name: group.name.clone(),
            ..Default::default()
        };

        for (index, marker) in group.markers.iter().enumerate() {
            let cell = CellRef {
                column: RESULT_COLUMN,
                row: index + 1,
            };

            match marker.result.classification.highlight() {
                Some(Highlight::Red) => table.red.push(cell),
                Some(Highlight::Yellow) => table.yellow.push(cell),
                Some(Highlight::Green) => table.green.push(cell),
                None => {}
            }

            table.rows.push(ReportRow {
                gene: marker.name.clone(),
                marker_id: marker.marker_id.clone(),
                alleles: marker.result.allele_pair(),
                result: marker.result.note.clone(),
                classification: marker.result.classification,
            });
        }

        table
    }

    pub fn header(&self) -> [&'static str; 4] {
        TABLE_HEADER
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highlight for a cell, if any
    pub fn highlight_at(&self, cell: CellRef) -> Option<Highlight> {
        if self.red.contains(&cell) {
            Some(Highlight::Red)
        } else if self.yellow.contains(&cell) {
            Some(Highlight::Yellow)
        } else if self.green.contains(&cell) {
            Some(Highlight::Green)
        } else {
            None
        }
    }
}

/// The whole document handed to a renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantReport {
    pub title: String,
    pub header: String,
    pub source_file: String,
    pub format: VendorFormat,
    pub generated_at: DateTime<Local>,
    pub groups: Vec<GroupTable>,
}

impl VariantReport {
    pub fn new(
        title: impl Into<String>,
        header: impl Into<String>,
        source_file: impl Into<String>,
        format: VendorFormat,
    ) -> Self {
        Self {
            title: title.into(),
            header: header.into(),
            source_file: source_file.into(),
            format,
            generated_at: Local::now(),
            groups: Vec::new(),
        }
    }

    /// Append a classified group; groups without markers are left out
    pub fn push_group(&mut self, group: &ClassifiedGroup) {
        let table = GroupTable::from_classified(group);
        if !table.is_empty() {
            self.groups.push(table);
        }
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|group| group.rows.len()).sum()
    }
}
