//! End-to-end report generation: detect, extract, classify, assemble.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::activity::ActivityLog;
use crate::analysis::GenotypeClassifier;
use crate::parsers::{DnaFile, MarkerExtractor};
use crate::report::VariantReport;
use crate::store::MarkerGroups;

/// Progress positions reported along the way, out of 100
pub mod milestones {
    pub const FORMAT_DETECTED: u64 = 20;
    pub const MARKERS_EXTRACTED: u64 = 70;
    pub const GROUPS_CLASSIFIED: u64 = 90;
    pub const RENDERED: u64 = 100;
}

/// Text placed at the top of a generated report
#[derive(Debug, Clone, Default)]
pub struct ReportHeading {
    pub title: String,
    pub header: String,
}

/// Build a report for one DNA export against every stored group.
///
/// The export is read twice at most: once for the first line and once for
/// the row pass, which is skipped when no markers are stored. Any detection
/// or read failure aborts the run. Markers missing from the export are
/// written to the not-found log in one block per group.
pub fn build_report(
    groups: &MarkerGroups,
    dna: &DnaFile,
    heading: &ReportHeading,
    log: Option<&ActivityLog>,
    mut progress: impl FnMut(u64),
) -> Result<VariantReport> {
    let format = dna
        .detect_format()
        .with_context(|| format!("Failed to identify {}", dna.path().display()))?;
    progress(milestones::FORMAT_DETECTED);
    info!("Reading {} as a {} export", dna.path().display(), format);

    let extractor = MarkerExtractor::new(groups.required_marker_ids());
    let genotypes = extractor
        .extract(dna, format)
        .with_context(|| format!("Failed to read {}", dna.path().display()))?;
    progress(milestones::MARKERS_EXTRACTED);
    info!(
        "Found {} of {} markers in {}",
        genotypes.len(),
        extractor.required().len(),
        dna.path().display()
    );

    let classifier = GenotypeClassifier::new(format);
    let mut report = VariantReport::new(
        heading.title.as_str(),
        heading.header.as_str(),
        dna.path().to_string_lossy(),
        format,
    );

    for group in groups {
        let classified = classifier.classify_group(group, &genotypes);

        if let Some(log) = log {
            if let Err(e) = log.record_not_found(&classified.not_found) {
                warn!("Could not log missing markers for {}: {:#}", group.name, e);
            }
        }

        report.push_group(&classified);
    }
    progress(milestones::GROUPS_CLASSIFIED);

    Ok(report)
}
