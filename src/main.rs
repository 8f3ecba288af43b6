use anyhow::{bail, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use variant_report::config::DEFAULT_DATA_DIR;
use variant_report::pipeline::milestones;
use variant_report::store::{self, MarkerGroups};
use variant_report::{
    build_report, ActivityLog, DnaFile, MarkerDefinition, ParseError, ReportFormat,
    ReportGenerator, ReportHeading, Settings, VendorFormat,
};

/// Marker group manager and variant report generator
#[derive(Parser, Debug)]
#[command(
    name = "variant-report",
    version,
    about = "Check AncestryDNA and 23andMe raw data against your own marker groups",
    long_about = r#"
Keeps named groups of SNP markers, each with reference wild and variant
alleles per vendor and a note for every outcome, and turns a raw DNA export
into a colour-coded report:

- green: both alleles match the wild reference
- red: both alleles match the variant reference
- yellow: anything else

Supports AncestryDNA and 23andMe raw data, optionally gzip/bzip2/xz compressed.
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Directory holding the marker store, settings and logs
    #[arg(
        long,
        global = true,
        env = "VARIANT_REPORT_DATA_DIR",
        default_value = DEFAULT_DATA_DIR,
        value_hint = ValueHint::DirPath
    )]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, list and delete marker groups
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Add, edit and remove markers inside a group
    Marker {
        #[command(subcommand)]
        action: MarkerCommand,
    },
    /// Generate a report from a raw DNA export
    Generate(GenerateArgs),
    /// Show or change saved defaults
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Generate shell completions
    Completions { shell: Shell },
    /// List supported DNA export formats
    Formats,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// List groups and their marker counts
    List,
    /// Show the markers of a group
    Show { name: String },
    /// Create an empty group
    Create { name: String },
    /// Rename a group
    Rename { name: String, new_name: String },
    /// Delete a group and all of its markers
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum MarkerCommand {
    /// Add a marker; missing fields are prompted for
    Add {
        group: String,
        #[command(flatten)]
        fields: MarkerFields,
    },
    /// Edit a marker; fields not given are prompted for with the current value
    Edit {
        group: String,
        name: String,
        #[command(flatten)]
        fields: MarkerFields,
    },
    /// Remove a marker from a group
    Remove {
        group: String,
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
struct MarkerFields {
    /// Display name, e.g. "MTHFR C677T"
    #[arg(long)]
    name: Option<String>,
    /// Marker ID, e.g. rs1801133
    #[arg(long)]
    rs_id: Option<String>,
    /// 23andMe wild allele
    #[arg(long)]
    twenty_three_wild: Option<String>,
    /// 23andMe variant allele
    #[arg(long)]
    twenty_three_variant: Option<String>,
    /// AncestryDNA wild allele
    #[arg(long)]
    ancestry_wild: Option<String>,
    /// AncestryDNA variant allele
    #[arg(long)]
    ancestry_variant: Option<String>,
    /// Note shown for a variant (red) result
    #[arg(long)]
    red: Option<String>,
    /// Note shown for a heterozygous (yellow) result
    #[arg(long)]
    yellow: Option<String>,
    /// Note shown for a wild (green) result
    #[arg(long)]
    green: Option<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Raw DNA export (AncestryDNA or 23andMe)
    #[arg(value_name = "DNA_FILE", value_hint = ValueHint::FilePath)]
    dna_file: PathBuf,

    /// Output directory for the report
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Report file name without extension
    #[arg(short, long)]
    filename: Option<String>,

    /// Paragraph printed under the title
    #[arg(long, default_value = "")]
    header: String,

    /// Report title
    #[arg(long)]
    title: Option<String>,

    /// Output format
    #[arg(short = 'F', long, value_enum)]
    format: Option<ReportFormat>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the saved settings
    Show,
    /// Directory searched for DNA exports given by bare file name
    SetDnaDir { dir: PathBuf },
    /// Default output directory
    SetOutputDir { dir: PathBuf },
    /// Default report format
    SetFormat {
        #[arg(value_enum)]
        format: ReportFormat,
    },
    /// Default report title
    SetTitle { title: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Completions { shell }) => generate_completions(shell),
        Some(Commands::Formats) => list_formats(),
        Some(Commands::Group { action }) => run_group_command(&cli.data_dir, action)?,
        Some(Commands::Marker { action }) => run_marker_command(&cli.data_dir, action)?,
        Some(Commands::Generate(args)) => run_generate(&cli.data_dir, args)?,
        Some(Commands::Config { action }) => run_config_command(&cli.data_dir, action)?,
        None => {}
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn list_formats() {
    println!("{}", style("Supported DNA Export Formats:").bold().cyan());
    println!();

    let formats = [
        (
            VendorFormat::AncestryDna,
            "rsid, chromosome, position, allele1, allele2",
        ),
        (
            VendorFormat::TwentyThreeAndMe,
            "rsid, chromosome, position, genotype (two letters)",
        ),
    ];

    for (format, columns) in formats {
        println!(
            "  {} - first line contains {}",
            style(format).green().bold(),
            style(format!("\"{}\"", format.signature())).yellow()
        );
        println!("         {}", style(columns).dim());
    }
    println!();
    println!(
        "  {}",
        style("Tab-separated; '#' lines are comments; .gz, .bz2 and .xz are read directly").dim()
    );
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("variant_report={}", level))
        .with_writer(io::stderr)
        .init();
}

/// Marker store loaded for one command, written back after each change
struct Workspace {
    store_path: PathBuf,
    groups: MarkerGroups,
    log: ActivityLog,
}

impl Workspace {
    fn open(data_dir: &Path) -> Result<Self> {
        let store_path = store::store_path(data_dir);
        let groups = store::load(&store_path)
            .with_context(|| format!("Failed to load marker groups from {}", data_dir.display()))?;

        Ok(Self {
            store_path,
            groups,
            log: ActivityLog::new(data_dir),
        })
    }

    /// Persist the current groups and record what changed
    fn commit(&self, message: &str) -> Result<()> {
        store::save(&self.store_path, &self.groups)?;
        self.record(message);
        println!("{} {}", style("✓").green().bold(), message);
        Ok(())
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.log.record(message) {
            warn!("Could not write activity log: {:#}", e);
        }
    }
}

fn confirm(prompt: &str, skip: bool) -> Result<bool> {
    if skip {
        return Ok(true);
    }

    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn run_group_command(data_dir: &Path, action: GroupCommand) -> Result<()> {
    let mut workspace = Workspace::open(data_dir)?;

    match action {
        GroupCommand::List => {
            if workspace.groups.is_empty() {
                println!("{}", style("No groups yet.").dim());
            }
            for group in &workspace.groups {
                println!(
                    "  {} {}",
                    style(&group.name).green().bold(),
                    style(format!("({} markers)", group.markers.len())).dim()
                );
            }
        }
        GroupCommand::Show { name } => {
            let group = workspace
                .groups
                .get(&name)
                .with_context(|| format!("No group named {}", name))?;

            println!("{}", style(&group.name).bold().cyan());
            for marker in &group.markers {
                println!(
                    "  {} {}  23andMe {}/{}  AncestryDNA {}/{}",
                    style(&marker.name).green(),
                    style(&marker.marker_id).yellow(),
                    marker.twenty_three_wild,
                    marker.twenty_three_variant,
                    marker.ancestry_wild,
                    marker.ancestry_variant
                );
                println!("      {} {}", style("red:").red(), marker.red_note);
                println!("      {} {}", style("yellow:").yellow(), marker.yellow_note);
                println!("      {} {}", style("green:").green(), marker.green_note);
            }
        }
        GroupCommand::Create { name } => {
            let created = workspace.groups.create_group(&name)?.name.clone();
            workspace.commit(&format!("Group {} created.", created))?;
        }
        GroupCommand::Rename { name, new_name } => {
            workspace.groups.rename_group(&name, &new_name)?;
            workspace.commit(&format!("Group {} renamed to {}.", name, new_name.trim()))?;
        }
        GroupCommand::Delete { name, yes } => {
            if workspace.groups.get(&name).is_none() {
                bail!("No group named {}", name);
            }
            if !confirm(&format!("Delete group {} and all its markers?", name), yes)? {
                return Ok(());
            }
            workspace.groups.delete_group(&name)?;
            workspace.commit(&format!("Group {} deleted.", name))?;
        }
    }

    Ok(())
}

/// Fill a marker from flags, prompting for anything missing.
///
/// Every field has to be non-empty before a marker is saved.
fn complete_marker(fields: MarkerFields, current: Option<&MarkerDefinition>) -> Result<MarkerDefinition> {
    let base = current.cloned().unwrap_or_default();
    let theme = ColorfulTheme::default();

    let ask = |given: Option<String>, prompt: &str, initial: &str| -> Result<String> {
        if let Some(value) = given {
            return Ok(value);
        }

        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt(prompt)
            .validate_with(|value: &String| {
                if value.trim().is_empty() {
                    Err("Field cannot be empty")
                } else {
                    Ok(())
                }
            });
        if !initial.is_empty() {
            input = input.with_initial_text(initial);
        }
        Ok(input.interact_text()?)
    };

    let marker = MarkerDefinition {
        name: ask(fields.name, "Gene name", &base.name)?,
        marker_id: ask(fields.rs_id, "RS#", &base.marker_id)?,
        twenty_three_wild: ask(fields.twenty_three_wild, "23andMe wild", &base.twenty_three_wild)?,
        twenty_three_variant: ask(
            fields.twenty_three_variant,
            "23andMe variant",
            &base.twenty_three_variant,
        )?,
        ancestry_wild: ask(fields.ancestry_wild, "AncestryDNA wild", &base.ancestry_wild)?,
        ancestry_variant: ask(
            fields.ancestry_variant,
            "AncestryDNA variant",
            &base.ancestry_variant,
        )?,
        red_note: ask(fields.red, "Red notes", &base.red_note)?,
        yellow_note: ask(fields.yellow, "Yellow notes", &base.yellow_note)?,
        green_note: ask(fields.green, "Green notes", &base.green_note)?,
    };

    if !marker.is_complete() {
        bail!("Empty entry fields! Marker not saved.");
    }
    Ok(marker)
}

fn run_marker_command(data_dir: &Path, action: MarkerCommand) -> Result<()> {
    let mut workspace = Workspace::open(data_dir)?;

    match action {
        MarkerCommand::Add { group, fields } => {
            if workspace.groups.get(&group).is_none() {
                bail!("No group named {}", group);
            }
            let marker = complete_marker(fields, None)?;
            let message = format!("Gene {} saved.", marker.name);
            workspace.groups.add_marker(&group, marker)?;
            workspace.commit(&message)?;
        }
        MarkerCommand::Edit {
            group,
            name,
            fields,
        } => {
            let current = workspace
                .groups
                .get(&group)
                .with_context(|| format!("No group named {}", group))?
                .find_marker(&name)
                .cloned()
                .with_context(|| format!("Group {} has no marker named {}", group, name))?;
            let marker = complete_marker(fields, Some(&current))?;
            workspace.groups.update_marker(&group, &name, marker)?;
            workspace.commit(&format!("Gene {} updated.", name))?;
        }
        MarkerCommand::Remove { group, name, yes } => {
            if !confirm(&format!("Remove {} from {}?", name, group), yes)? {
                return Ok(());
            }
            workspace.groups.remove_marker(&group, &name)?;
            workspace.commit(&format!("Gene {} deleted.", name))?;
        }
    }

    Ok(())
}

/// Resolve a DNA export given on the command line, trying the saved DNA directory
fn resolve_dna_path(given: &Path, settings: &Settings) -> PathBuf {
    if given.exists() || given.is_absolute() {
        return given.to_path_buf();
    }

    match &settings.dna_dir {
        Some(dir) if dir.join(given).exists() => dir.join(given),
        _ => given.to_path_buf(),
    }
}

fn run_generate(data_dir: &Path, args: GenerateArgs) -> Result<()> {
    let workspace = Workspace::open(data_dir)?;
    let settings = Settings::load(data_dir)?;

    let dna_path = resolve_dna_path(&args.dna_file, &settings);
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| settings.output_dir_or_default());
    let format = args.format.unwrap_or(settings.report_format);
    let filename = args.filename.clone().unwrap_or_else(|| {
        format!(
            "report_{}",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
        )
    });
    let heading = ReportHeading {
        title: args.title.clone().unwrap_or(settings.report_title.clone()),
        header: args.header.clone(),
    };

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Reading DNA file...");

    let report = match build_report(
        &workspace.groups,
        &DnaFile::new(&dna_path),
        &heading,
        Some(&workspace.log),
        |position| pb.set_position(position),
    ) {
        Ok(report) => report,
        Err(e) => {
            pb.abandon();
            workspace.record(&format!("{:#}", e));
            if let Some(ParseError::UnrecognizedFormat { .. }) = e.downcast_ref::<ParseError>() {
                eprintln!(
                    "{} File is not recognized as AncestryDNA or 23andMe file!",
                    style("✗").red().bold()
                );
            }
            return Err(e);
        }
    };

    pb.set_message("Rendering report...");
    let generator = ReportGenerator::new(&output_dir)?;
    let written = generator.generate(&report, format, &filename)?;
    pb.set_position(milestones::RENDERED);
    pb.finish_with_message("Report complete!");

    info!(
        "Report covers {} markers in {} groups",
        report.row_count(),
        report.groups.len()
    );
    workspace.record(&format!(
        "Report '{}' created in {} from {}.",
        filename,
        output_dir.display(),
        dna_path.display()
    ));

    for path in written {
        println!(
            "{} Report saved to: {}",
            style("✓").green().bold(),
            style(path.display()).cyan()
        );
    }

    Ok(())
}

fn run_config_command(data_dir: &Path, action: ConfigCommand) -> Result<()> {
    let mut settings = Settings::load(data_dir)?;

    match action {
        ConfigCommand::Show => {
            println!(
                "{}",
                style(Settings::path(data_dir).display()).bold().cyan()
            );
            print!("{}", toml::to_string_pretty(&settings)?);
            return Ok(());
        }
        ConfigCommand::SetDnaDir { dir } => settings.dna_dir = Some(dir),
        ConfigCommand::SetOutputDir { dir } => settings.output_dir = Some(dir),
        ConfigCommand::SetFormat { format } => settings.report_format = format,
        ConfigCommand::SetTitle { title } => settings.report_title = title,
    }

    settings.save(data_dir)?;
    println!("{} Settings saved", style("✓").green().bold());
    Ok(())
}
