use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of positional fields in a persisted marker record
pub const MARKER_FIELD_COUNT: usize = 9;

/// A single tracked genetic marker with its reference alleles and notes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerDefinition {
    pub name: String,
    pub marker_id: String,
    pub twenty_three_wild: String,
    pub twenty_three_variant: String,
    pub ancestry_wild: String,
    pub ancestry_variant: String,
    pub red_note: String,
    pub yellow_note: String,
    pub green_note: String,
}

impl MarkerDefinition {
    /// Build a marker from its persisted positional layout:
    /// name, marker ID, 23andMe wild/variant, AncestryDNA wild/variant,
    /// red, yellow and green notes.
    pub fn from_fields(fields: [String; MARKER_FIELD_COUNT]) -> Self {
        let [name, marker_id, twenty_three_wild, twenty_three_variant, ancestry_wild, ancestry_variant, red_note, yellow_note, green_note] =
            fields;

        Self {
            name,
            marker_id,
            twenty_three_wild,
            twenty_three_variant,
            ancestry_wild,
            ancestry_variant,
            red_note,
            yellow_note,
            green_note,
        }
    }

    pub fn to_fields(&self) -> [String; MARKER_FIELD_COUNT] {
        [
            self.name.clone(),
            self.marker_id.clone(),
            self.twenty_three_wild.clone(),
            self.twenty_three_variant.clone(),
            self.ancestry_wild.clone(),
            self.ancestry_variant.clone(),
            self.red_note.clone(),
            self.yellow_note.clone(),
            self.green_note.clone(),
        ]
    }

    /// Reference (wild, variant) alleles for the given vendor layout
    pub fn reference_alleles(&self, format: VendorFormat) -> (&str, &str) {
        match format {
            VendorFormat::TwentyThreeAndMe => (&self.twenty_three_wild, &self.twenty_three_variant),
            VendorFormat::AncestryDna => (&self.ancestry_wild, &self.ancestry_variant),
        }
    }

    /// Note text shown for a classification outcome
    pub fn note_for(&self, classification: Classification) -> &str {
        match classification {
            Classification::Wild => &self.green_note,
            Classification::Variant => &self.red_note,
            Classification::Heterozygous => &self.yellow_note,
            Classification::NotFound => NOT_FOUND_NOTE,
        }
    }

    /// True when every one of the nine fields holds non-whitespace text
    pub fn is_complete(&self) -> bool {
        self.to_fields().iter().all(|field| !field.trim().is_empty())
    }
}

impl fmt::Display for MarkerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.marker_id)
    }
}

/// A named, ordered list of markers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerGroup {
    pub name: String,
    pub markers: Vec<MarkerDefinition>,
}

impl MarkerGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: Vec::new(),
        }
    }

    pub fn find_marker(&self, name: &str) -> Option<&MarkerDefinition> {
        self.markers.iter().find(|marker| marker.name == name)
    }
}

/// Consumer DNA export layouts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VendorFormat {
    /// Tab-separated rsid, chromosome, position, allele1, allele2
    AncestryDna,
    /// Tab-separated rsid, chromosome, position, two-letter genotype
    TwentyThreeAndMe,
}

impl VendorFormat {
    /// Substring identifying the vendor on the first line of an export
    pub fn signature(&self) -> &'static str {
        match self {
            VendorFormat::AncestryDna => "AncestryDNA",
            VendorFormat::TwentyThreeAndMe => "23andMe",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            VendorFormat::AncestryDna => "AncestryDNA",
            VendorFormat::TwentyThreeAndMe => "23andMe",
        }
    }
}

impl fmt::Display for VendorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Genotype observed for one marker in a DNA export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObservedGenotype {
    pub chromosome: String,
    pub position: String,
    pub allele1: String,
    pub allele2: String,
}

impl ObservedGenotype {
    pub fn new(
        chromosome: impl Into<String>,
        position: impl Into<String>,
        allele1: impl Into<String>,
        allele2: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position: position.into(),
            allele1: allele1.into(),
            allele2: allele2.into(),
        }
    }

    /// "allele1/allele2" as shown in the report
    pub fn allele_pair(&self) -> String {
        format!("{}/{}", self.allele1, self.allele2)
    }
}

pub const NOT_FOUND_NOTE: &str = "Not found";

/// Placeholder allele shown for markers missing from the export
pub const MISSING_ALLELE: &str = "X";

/// Outcome of comparing an observed genotype with a marker's references
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Classification {
    NotFound,
    Wild,
    Variant,
    Heterozygous,
}

impl Classification {
    pub fn highlight(&self) -> Option<Highlight> {
        match self {
            Classification::NotFound => None,
            Classification::Wild => Some(Highlight::Green),
            Classification::Variant => Some(Highlight::Red),
            Classification::Heterozygous => Some(Highlight::Yellow),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::NotFound => "not found",
            Classification::Wild => "wild",
            Classification::Variant => "variant",
            Classification::Heterozygous => "heterozygous",
        }
    }
}

/// Cell highlight colours used by the renderers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Highlight {
    Red,
    Yellow,
    Green,
}

impl Highlight {
    pub fn rgb(&self) -> (f32, f32, f32) {
        match self {
            Highlight::Red => (1.0, 0.0, 0.0),
            Highlight::Yellow => (1.0, 1.0, 0.0),
            Highlight::Green => (0.0, 0.5, 0.0),
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Highlight::Red => "result-red",
            Highlight::Yellow => "result-yellow",
            Highlight::Green => "result-green",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_marker() -> MarkerDefinition {
        MarkerDefinition::from_fields([
            "MTHFR".to_string(),
            "rs1801133".to_string(),
            "G".to_string(),
            "A".to_string(),
            "C".to_string(),
            "T".to_string(),
            "Risk".to_string(),
            "Carrier".to_string(),
            "OK".to_string(),
        ])
    }

    #[test]
    fn test_positional_layout() {
        let marker = sample_marker();
        assert_eq!(marker.marker_id, "rs1801133");
        assert_eq!(marker.ancestry_wild, "C");
        assert_eq!(marker.green_note, "OK");
        assert_eq!(MarkerDefinition::from_fields(marker.to_fields()), marker);
    }

    #[test]
    fn test_reference_alleles_follow_vendor() {
        let marker = sample_marker();
        assert_eq!(marker.reference_alleles(VendorFormat::TwentyThreeAndMe), ("G", "A"));
        assert_eq!(marker.reference_alleles(VendorFormat::AncestryDna), ("C", "T"));
    }

    #[test]
    fn test_incomplete_marker() {
        let mut marker = sample_marker();
        assert!(marker.is_complete());
        marker.yellow_note = "  ".to_string();
        assert!(!marker.is_complete());
    }
}
