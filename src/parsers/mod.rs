//! Streaming readers for consumer DNA exports.
//!
//! A DNA export is read in a single pass. The first physical line names the
//! vendor, every later non-comment line is one tab-separated row, and only the
//! rows for markers somebody asked for are decoded.

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use hashbrown::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use xz2::read::XzDecoder;

use crate::types::{MarkerGroup, ObservedGenotype, VendorFormat};

pub mod ancestry;
pub mod twentythree;

/// Marker ID → genotype observed in the export
pub type ExtractedGenotypes = HashMap<String, ObservedGenotype>;

/// Deduplicated set of marker IDs to pull from an export
pub type MarkerIdSet = HashSet<String>;

/// Errors that abort reading a DNA export
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to open DNA file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read line {line} of DNA file: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("File is not recognized as an AncestryDNA or 23andMe export (first line: {first_line:?})")]
    UnrecognizedFormat { first_line: String },
}

/// Reasons a requested row could not be decoded
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RowError {
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("genotype {0:?} is not a pair of single-letter alleles")]
    MalformedGenotype(String),
}

/// One non-comment line of a DNA export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnaRow {
    /// 1-based physical line number
    pub line_number: usize,
    pub fields: Vec<String>,
}

impl DnaRow {
    pub fn marker_id(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }
}

/// Anything that can hand out a fresh pass over DNA rows
pub trait RowSource {
    type Rows: Iterator<Item = Result<DnaRow, ParseError>>;

    /// Start a new pass. Each call re-opens the underlying data.
    fn rows(&self) -> Result<Self::Rows, ParseError>;
}

/// Open a file for line reading, decompressing by extension
pub fn open_file(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let reader: Box<dyn BufRead> = match extension.as_str() {
        "gz" => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        "bz2" => Box::new(BufReader::new(BzDecoder::new(file))),
        "xz" => Box::new(BufReader::new(XzDecoder::new(file))),
        _ => Box::new(BufReader::new(file)),
    };

    Ok(reader)
}

/// Identify the vendor from the first line of an export.
///
/// AncestryDNA is checked before 23andMe; a line naming neither is rejected.
pub fn detect_format(first_line: &str) -> Result<VendorFormat, ParseError> {
    [VendorFormat::AncestryDna, VendorFormat::TwentyThreeAndMe]
        .into_iter()
        .find(|format| first_line.contains(format.signature()))
        .ok_or_else(|| ParseError::UnrecognizedFormat {
            first_line: first_line.trim_end().to_string(),
        })
}

/// A DNA export on disk
#[derive(Debug, Clone)]
pub struct DnaFile {
    path: PathBuf,
}

impl DnaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Box<dyn BufRead>, ParseError> {
        open_file(&self.path).map_err(|source| ParseError::Open {
            path: self.path.clone(),
            source,
        })
    }

    /// Read only the first physical line and detect the vendor from it
    pub fn detect_format(&self) -> Result<VendorFormat, ParseError> {
        let mut reader = self.open()?;
        let mut first_line = String::new();
        reader
            .read_line(&mut first_line)
            .map_err(|source| ParseError::Read { line: 1, source })?;

        let format = detect_format(&first_line)?;
        debug!("Detected {} export: {}", format, self.path.display());
        Ok(format)
    }
}

impl RowSource for DnaFile {
    type Rows = DnaRows;

    fn rows(&self) -> Result<DnaRows, ParseError> {
        Ok(DnaRows::new(self.open()?))
    }
}

/// Lazy iterator over the rows of an export.
///
/// Holds one line at a time; the file closes when the iterator is dropped.
pub struct DnaRows {
    reader: Box<dyn BufRead>,
    line: String,
    line_number: usize,
}

impl DnaRows {
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
        }
    }
}

impl Iterator for DnaRows {
    type Item = Result<DnaRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            self.line_number += 1;

            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }

                    let fields = self
                        .line
                        .split('\t')
                        .map(|field| field.trim().to_string())
                        .collect();

                    return Some(Ok(DnaRow {
                        line_number: self.line_number,
                        fields,
                    }));
                }
                Err(source) => {
                    return Some(Err(ParseError::Read {
                        line: self.line_number,
                        source,
                    }))
                }
            }
        }
    }
}

/// Pulls the genotypes of a fixed set of markers out of an export
#[derive(Debug, Clone, Default)]
pub struct MarkerExtractor {
    required: MarkerIdSet,
}

impl MarkerExtractor {
    pub fn new(required: MarkerIdSet) -> Self {
        Self { required }
    }

    /// Collect every marker ID across the given groups
    pub fn for_groups<'a>(groups: impl IntoIterator<Item = &'a MarkerGroup>) -> Self {
        let required = groups
            .into_iter()
            .flat_map(|group| group.markers.iter())
            .map(|marker| marker.marker_id.clone())
            .collect();

        Self { required }
    }

    pub fn required(&self) -> &MarkerIdSet {
        &self.required
    }

    /// Stream the source once and keep the rows for required markers.
    ///
    /// Returns without touching the source when nothing is required. When a
    /// marker appears on several rows the last one wins. Requested rows that
    /// cannot be decoded are skipped with a warning.
    pub fn extract<S: RowSource>(
        &self,
        source: &S,
        format: VendorFormat,
    ) -> Result<ExtractedGenotypes, ParseError> {
        let mut genotypes = ExtractedGenotypes::new();

        if self.required.is_empty() {
            debug!("No markers requested, skipping DNA file pass");
            return Ok(genotypes);
        }

        let decode = row_decoder(format);

        for row in source.rows()? {
            let row = row?;

            let Some(marker_id) = row.marker_id() else {
                continue;
            };
            if !self.required.contains(marker_id) {
                continue;
            }

            match decode(&row.fields) {
                Ok(genotype) => {
                    genotypes.insert(marker_id.to_string(), genotype);
                }
                Err(e) => warn!(
                    "Skipping {} row for {} at line {}: {}",
                    format, marker_id, row.line_number, e
                ),
            }
        }

        debug!(
            "Extracted {} of {} requested markers",
            genotypes.len(),
            self.required.len()
        );

        Ok(genotypes)
    }
}

/// Row decoding function for a vendor layout
pub fn row_decoder(format: VendorFormat) -> fn(&[String]) -> Result<ObservedGenotype, RowError> {
    match format {
        VendorFormat::AncestryDna => ancestry::decode_row,
        VendorFormat::TwentyThreeAndMe => twentythree::decode_row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::Cell;
    use std::io::Write;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> MarkerIdSet {
        values.iter().map(|id| id.to_string()).collect()
    }

    fn row(line_number: usize, fields: &[&str]) -> DnaRow {
        DnaRow {
            line_number,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// In-memory rows that count how often a pass is started
    struct CountingSource {
        rows: Vec<DnaRow>,
        opens: Cell<usize>,
    }

    impl CountingSource {
        fn new(rows: Vec<DnaRow>) -> Self {
            Self {
                rows,
                opens: Cell::new(0),
            }
        }
    }

    impl RowSource for CountingSource {
        type Rows = std::vec::IntoIter<Result<DnaRow, ParseError>>;

        fn rows(&self) -> Result<Self::Rows, ParseError> {
            self.opens.set(self.opens.get() + 1);
            Ok(self
                .rows
                .iter()
                .cloned()
                .map(Ok)
                .collect::<Vec<_>>()
                .into_iter())
        }
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format("#AncestryDNA raw data download").unwrap(),
            VendorFormat::AncestryDna
        );
        assert_eq!(
            detect_format("# This data file generated by 23andMe at: Mon Jan 1").unwrap(),
            VendorFormat::TwentyThreeAndMe
        );
        assert!(matches!(
            detect_format("rsid\tchromosome\tposition"),
            Err(ParseError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn test_detect_format_is_repeatable() {
        for _ in 0..3 {
            assert_eq!(
                detect_format("AncestryDNA raw data").unwrap(),
                VendorFormat::AncestryDna
            );
            assert!(detect_format("MyHeritage").is_err());
        }
    }

    #[test]
    fn test_rows_skip_comments_and_blanks() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("genome.txt");
        let mut file = File::create(&path)?;
        writeln!(file, "# This data file generated by 23andMe")?;
        writeln!(file, "   # indented comment")?;
        writeln!(file)?;
        writeln!(file, "rs1 \t 1\t100\tAG ")?;
        writeln!(file, "rs2\t2\t200\tCC\r")?;

        let rows: Vec<DnaRow> = DnaFile::new(&path).rows()?.collect::<Result<_, _>>()?;

        assert_eq!(
            rows,
            vec![
                row(4, &["rs1", "1", "100", "AG"]),
                row(5, &["rs2", "2", "200", "CC"]),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_rows_restart_on_each_pass() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("genome.txt");
        let mut file = File::create(&path)?;
        writeln!(file, "#AncestryDNA")?;
        writeln!(file, "rs1\t1\t100\tA\tG")?;

        let dna = DnaFile::new(&path);
        assert_eq!(dna.rows()?.count(), 1);
        assert_eq!(dna.rows()?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_gzip_export() -> Result<()> {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("genome.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&path)?, Compression::default());
        writeln!(encoder, "# 23andMe")?;
        writeln!(encoder, "rs456\t2\t200\tAG")?;
        encoder.finish()?;

        let dna = DnaFile::new(&path);
        let format = dna.detect_format()?;
        let genotypes = MarkerExtractor::new(ids(&["rs456"])).extract(&dna, format)?;

        assert_eq!(genotypes["rs456"], ObservedGenotype::new("2", "200", "A", "G"));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let dna = DnaFile::new("/nonexistent/genome.txt");
        assert!(matches!(dna.detect_format(), Err(ParseError::Open { .. })));
    }

    #[test]
    fn test_ancestry_extraction() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("ancestry.txt");
        let mut file = File::create(&path)?;
        writeln!(file, "AncestryDNA raw data")?;
        writeln!(file, "rs123\t1\t100\tA\tG")?;

        let dna = DnaFile::new(&path);
        let format = dna.detect_format()?;
        assert_eq!(format, VendorFormat::AncestryDna);

        let genotypes = MarkerExtractor::new(ids(&["rs123"])).extract(&dna, format)?;

        let mut expected = ExtractedGenotypes::new();
        expected.insert(
            "rs123".to_string(),
            ObservedGenotype::new("1", "100", "A", "G"),
        );
        assert_eq!(genotypes, expected);
        Ok(())
    }

    #[test]
    fn test_twenty_three_extraction() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("genome.txt");
        let mut file = File::create(&path)?;
        writeln!(file, "23andMe")?;
        writeln!(file, "rs456\t2\t200\tAG")?;

        let dna = DnaFile::new(&path);
        let format = dna.detect_format()?;
        assert_eq!(format, VendorFormat::TwentyThreeAndMe);

        let genotypes = MarkerExtractor::new(ids(&["rs456"])).extract(&dna, format)?;

        assert_eq!(genotypes.len(), 1);
        assert_eq!(genotypes["rs456"], ObservedGenotype::new("2", "200", "A", "G"));
        Ok(())
    }

    #[test]
    fn test_empty_request_skips_io() {
        let source = CountingSource::new(vec![row(2, &["rs1", "1", "100", "A", "G"])]);

        let genotypes = MarkerExtractor::default()
            .extract(&source, VendorFormat::AncestryDna)
            .unwrap();

        assert!(genotypes.is_empty());
        assert_eq!(source.opens.get(), 0);
    }

    #[test]
    fn test_keys_subset_and_last_row_wins() {
        let source = CountingSource::new(vec![
            row(2, &["rsid", "chromosome", "position", "allele1", "allele2"]),
            row(3, &["rs1", "1", "100", "A", "A"]),
            row(4, &["rs2", "1", "200", "C", "T"]),
            row(5, &["rs9", "garbage"]),
            row(6, &["rs1", "1", "100", "G", "G"]),
        ]);

        let extractor = MarkerExtractor::new(ids(&["rs1", "rs3"]));
        let genotypes = extractor
            .extract(&source, VendorFormat::AncestryDna)
            .unwrap();

        assert_eq!(source.opens.get(), 1);
        assert!(genotypes.keys().all(|id| extractor.required().contains(id)));
        assert_eq!(genotypes.len(), 1);
        assert_eq!(genotypes["rs1"], ObservedGenotype::new("1", "100", "G", "G"));
    }

    #[test]
    fn test_unreadable_requested_row_is_skipped() {
        let source = CountingSource::new(vec![
            row(2, &["rs1", "1", "100", "AGT"]),
            row(3, &["rs2", "1", "200"]),
            row(4, &["rs3", "1", "300", "CT"]),
        ]);

        let genotypes = MarkerExtractor::new(ids(&["rs1", "rs2", "rs3"]))
            .extract(&source, VendorFormat::TwentyThreeAndMe)
            .unwrap();

        assert_eq!(genotypes.len(), 1);
        assert!(genotypes.contains_key("rs3"));
    }

    #[test]
    fn test_for_groups_collapses_duplicates() {
        let marker = |id: &str| crate::types::MarkerDefinition {
            marker_id: id.to_string(),
            ..Default::default()
        };

        let mut first = MarkerGroup::new("Methylation");
        first.markers.push(marker("rs1"));
        first.markers.push(marker("rs2"));
        let mut second = MarkerGroup::new("Detox");
        second.markers.push(marker("rs1"));

        let extractor = MarkerExtractor::for_groups([&first, &second]);
        assert_eq!(extractor.required(), &ids(&["rs1", "rs2"]));
    }
}
