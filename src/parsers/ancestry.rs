use crate::parsers::RowError;
use crate::types::ObservedGenotype;

/// Decode an AncestryDNA row.
///
/// Layout: rsid, chromosome, position, allele1, allele2. The alleles already
/// sit in their own columns; anything past the fifth column is ignored.
pub fn decode_row(fields: &[String]) -> Result<ObservedGenotype, RowError> {
    match fields {
        [_, chromosome, position, allele1, allele2, ..] => Ok(ObservedGenotype::new(
            chromosome.as_str(),
            position.as_str(),
            allele1.as_str(),
            allele2.as_str(),
        )),
        _ => Err(RowError::TooFewFields {
            expected: 5,
            found: fields.len(),
        }),
    }
}
