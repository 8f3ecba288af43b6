use crate::parsers::RowError;
use crate::types::ObservedGenotype;

/// Decode a 23andMe row.
///
/// Layout: rsid, chromosome, position, genotype, where the genotype packs
/// both alleles into one two-letter token ("AG", "--").
pub fn decode_row(fields: &[String]) -> Result<ObservedGenotype, RowError> {
    let [_, chromosome, position, genotype, ..] = fields else {
        return Err(RowError::TooFewFields {
            expected: 4,
            found: fields.len(),
        });
    };

    let (allele1, allele2) = split_genotype(genotype)?;

    Ok(ObservedGenotype::new(
        chromosome.as_str(),
        position.as_str(),
        allele1,
        allele2,
    ))
}

/// Split a packed two-letter genotype into its alleles
fn split_genotype(genotype: &str) -> Result<(String, String), RowError> {
    let mut alleles = genotype.chars();

    match (alleles.next(), alleles.next(), alleles.next()) {
        (Some(first), Some(second), None) => Ok((first.to_string(), second.to_string())),
        _ => Err(RowError::MalformedGenotype(genotype.to_string())),
    }
}
