use serde::{Deserialize, Serialize};

use crate::parsers::ExtractedGenotypes;
use crate::types::*;

/// Classification of one marker against an export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationResult {
    pub classification: Classification,
    pub note: String,
    pub allele1: String,
    pub allele2: String,
}

impl ClassificationResult {
    pub fn allele_pair(&self) -> String {
        format!("{}/{}", self.allele1, self.allele2)
    }
}

/// One marker's line in a group table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifiedMarker {
    pub name: String,
    pub marker_id: String,
    pub result: ClassificationResult,
}

/// All markers of a group classified in stored order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifiedGroup {
    pub name: String,
    pub markers: Vec<ClassifiedMarker>,
    /// Marker IDs with no row in the export, in group order
    pub not_found: Vec<String>,
}

/// Compares observed genotypes with each marker's reference alleles
pub struct GenotypeClassifier {
    format: VendorFormat,
}

impl GenotypeClassifier {
    pub fn new(format: VendorFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> VendorFormat {
        self.format
    }

    /// Classify a single marker.
    ///
    /// Alleles are compared case-insensitively. Both alleles matching the
    /// wild reference wins over both matching the variant, so a marker whose
    /// references are equal always reads as wild. Every other combination,
    /// including alleles matching neither reference, is heterozygous.
    pub fn classify(
        &self,
        marker: &MarkerDefinition,
        observed: Option<&ObservedGenotype>,
    ) -> ClassificationResult {
        let Some(observed) = observed else {
            return ClassificationResult {
                classification: Classification::NotFound,
                note: NOT_FOUND_NOTE.to_string(),
                allele1: MISSING_ALLELE.to_string(),
                allele2: MISSING_ALLELE.to_string(),
            };
        };

        let (wild, variant) = marker.reference_alleles(self.format);
        let both_match = |reference: &str| {
            observed.allele1.eq_ignore_ascii_case(reference)
                && observed.allele2.eq_ignore_ascii_case(reference)
        };

        let classification = if both_match(wild) {
            Classification::Wild
        } else if both_match(variant) {
            Classification::Variant
        } else {
            Classification::Heterozygous
        };

        ClassificationResult {
            classification,
            note: marker.note_for(classification).to_string(),
            allele1: observed.allele1.clone(),
            allele2: observed.allele2.clone(),
        }
    }

    /// Classify every marker of a group in stored order
    pub fn classify_group(
        &self,
        group: &MarkerGroup,
        genotypes: &ExtractedGenotypes,
    ) -> ClassifiedGroup {
        let mut not_found = Vec::new();

        let markers = group
            .markers
            .iter()
            .map(|marker| {
                let result = self.classify(marker, genotypes.get(marker.marker_id.as_str()));
                if result.classification == Classification::NotFound {
                    not_found.push(marker.marker_id.clone());
                }

                ClassifiedMarker {
                    name: marker.name.clone(),
                    marker_id: marker.marker_id.clone(),
                    result,
                }
            })
            .collect();

        ClassifiedGroup {
            name: group.name.clone(),
            markers,
            not_found,
        }
    }
}
