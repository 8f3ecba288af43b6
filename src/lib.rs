//! # Variant Report
//!
//! Manage named groups of genetic markers and check a consumer DNA export
//! against them.
//!
//! ## Features
//!
//! - Marker groups persisted as a single binary snapshot
//! - Streaming, single-pass extraction from AncestryDNA and 23andMe raw data
//!   (plain or gzip/bzip2/xz compressed)
//! - Wild / heterozygous / variant classification with per-marker notes
//! - Colour-coded reports (PDF, HTML, CSV, TSV, JSON)

pub mod activity;
pub mod analysis;
pub mod config;
pub mod output;
pub mod parsers;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod types;

// Re-export key types
pub use activity::ActivityLog;
pub use analysis::{ClassificationResult, ClassifiedGroup, GenotypeClassifier};
pub use config::Settings;
pub use output::{ReportFormat, ReportGenerator};
pub use parsers::{DnaFile, ExtractedGenotypes, MarkerExtractor, ParseError, RowSource};
pub use pipeline::{build_report, ReportHeading};
pub use report::{CellRef, GroupTable, VariantReport};
pub use store::{MarkerGroups, StoreError};
pub use types::*;
