use anyhow::Result;
use std::fs::{self, File};
use std::io::Write;
use tempfile::TempDir;

use variant_report::store::{self, MarkerGroups};
use variant_report::{
    build_report, ActivityLog, Classification, DnaFile, MarkerDefinition, ReportFormat,
    ReportGenerator, ReportHeading, Settings,
};

fn marker(name: &str, marker_id: &str, ancestry: (&str, &str)) -> MarkerDefinition {
    MarkerDefinition {
        name: name.to_string(),
        marker_id: marker_id.to_string(),
        twenty_three_wild: "C".to_string(),
        twenty_three_variant: "T".to_string(),
        ancestry_wild: ancestry.0.to_string(),
        ancestry_variant: ancestry.1.to_string(),
        red_note: "Reduced enzyme activity".to_string(),
        yellow_note: "One copy of the variant".to_string(),
        green_note: "Typical activity".to_string(),
    }
}

fn write_ancestry_export(dir: &TempDir) -> Result<std::path::PathBuf> {
    let path = dir.path().join("AncestryDNA.txt");
    let mut file = File::create(&path)?;
    writeln!(file, "#AncestryDNA raw data download")?;
    writeln!(file, "#This file was generated by AncestryDNA at: 01/01/2022")?;
    writeln!(file, "rsid\tchromosome\tposition\tallele1\tallele2")?;
    writeln!(file, "rs1801133\t1\t11856378\tG\tG")?;
    writeln!(file, "rs1801131\t1\t11854476\tT\tG")?;
    writeln!(file, "rs4680\t22\t19951271\tA\tA")?;
    Ok(path)
}

#[test]
fn test_store_to_report_workflow() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data_dir = temp_dir.path().join("PersistentData");
    let store_path = store::store_path(&data_dir);

    // First run creates an empty store
    let mut groups = store::load(&store_path)?;
    assert!(groups.is_empty());
    assert!(store_path.exists());

    groups.create_group("Methylation")?;
    groups.create_group("Unused")?;
    groups.add_marker("Methylation", marker("MTHFR C677T", "rs1801133", ("G", "A")))?;
    groups.add_marker("Methylation", marker("MTHFR A1298C", "rs1801131", ("T", "G")))?;
    groups.add_marker("Methylation", marker("COMT V158M", "rs4680", ("G", "A")))?;
    groups.add_marker("Methylation", marker("MTRR A66G", "rs1801394", ("A", "G")))?;
    store::save(&store_path, &groups)?;

    let reloaded: MarkerGroups = store::load(&store_path)?;
    assert_eq!(reloaded, groups);

    let dna_path = write_ancestry_export(&temp_dir)?;
    let log = ActivityLog::new(&data_dir);
    let report = build_report(
        &reloaded,
        &DnaFile::new(&dna_path),
        &ReportHeading {
            title: "Variant Report".to_string(),
            header: "Prepared for testing".to_string(),
        },
        Some(&log),
        |_| {},
    )?;

    // The empty group is left out of the report
    assert_eq!(report.groups.len(), 1);
    let table = &report.groups[0];
    let results: Vec<(&str, Classification)> = table
        .rows
        .iter()
        .map(|row| (row.alleles.as_str(), row.classification))
        .collect();
    assert_eq!(
        results,
        vec![
            ("G/G", Classification::Wild),
            ("T/G", Classification::Heterozygous),
            ("A/A", Classification::Variant),
            ("X/X", Classification::NotFound),
        ]
    );

    let not_found = fs::read_to_string(log.not_found_path())?;
    assert!(not_found.lines().any(|line| line == "rs1801394"));

    let output_dir = temp_dir.path().join("reports");
    let written =
        ReportGenerator::new(&output_dir)?.generate(&report, ReportFormat::All, "report")?;
    assert_eq!(written.len(), 5);
    for path in &written {
        assert!(path.exists(), "missing {}", path.display());
        assert!(fs::metadata(path)?.len() > 0);
    }

    let csv = fs::read_to_string(output_dir.join("report.csv"))?;
    assert!(csv.contains("Methylation,COMT V158M,rs4680,A/A,variant,Reduced enzyme activity"));
    assert!(csv.contains("Methylation,MTRR A66G,rs1801394,X/X,not found,Not found"));

    let html = fs::read_to_string(output_dir.join("report.html"))?;
    assert!(html.contains("Prepared for testing"));
    assert!(html.contains("result-green"));
    assert!(html.contains("result-yellow"));
    assert!(html.contains("result-red"));

    Ok(())
}

#[test]
fn test_empty_store_reports_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dna_path = write_ancestry_export(&temp_dir)?;

    let report = build_report(
        &MarkerGroups::new(),
        &DnaFile::new(&dna_path),
        &ReportHeading::default(),
        None,
        |_| {},
    )?;

    assert!(report.groups.is_empty());
    assert_eq!(report.row_count(), 0);
    Ok(())
}

#[test]
fn test_settings_default_format() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let mut settings = Settings::load(temp_dir.path())?;
    assert_eq!(settings.report_format, ReportFormat::Pdf);

    settings.report_format = ReportFormat::Json;
    settings.save(temp_dir.path())?;

    assert_eq!(Settings::load(temp_dir.path())?.report_format, ReportFormat::Json);
    Ok(())
}
