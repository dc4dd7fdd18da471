use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use taper_core::*;

#[derive(Parser)]
#[command(name = "taper")]
#[command(about = "Medication taper plan generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a taper plan from a request file
    Plan {
        /// Plan request (JSON)
        request: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Override the plan start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Also write the plan as CSV to this file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// List catalogue classes, medicines and strengths
    Catalogue {
        /// Only show this class (e.g. opioid, benzodiazepine)
        #[arg(long)]
        class: Option<String>,
    },

    /// Write a config file with default settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn main() -> Result<()> {
    taper_core::logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            request,
            format,
            start,
            csv,
        } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_plan(&request, format, start, csv.as_deref(), &config)
        }
        Commands::Catalogue { class } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_catalogue(class.as_deref(), &config)
        }
        Commands::InitConfig { force } => cmd_init_config(cli.config.as_deref(), force),
    }
}

fn load_config(path: Option<&Path>) -> Result<TaperConfig> {
    match path {
        Some(path) => TaperConfig::load_from(path),
        None => TaperConfig::load(),
    }
}

fn load_catalogue(config: &TaperConfig) -> Result<Catalogue> {
    let catalogue = match &config.catalogue.path {
        Some(path) => Catalogue::load_from(path)?,
        None => get_default_catalogue().clone(),
    };

    let errors = catalogue.validate();
    if !errors.is_empty() {
        eprintln!("Catalogue validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalogue".into()));
    }
    Ok(catalogue)
}

fn cmd_plan(
    request_path: &Path,
    format: OutputFormat,
    start: Option<NaiveDate>,
    csv_path: Option<&Path>,
    config: &TaperConfig,
) -> Result<()> {
    let catalogue = load_catalogue(config)?;
    let mut request = load_request(request_path)?;
    if let Some(start) = start {
        tracing::debug!("Start date overridden: {} -> {}", request.start_date, start);
        request.start_date = start;
    }

    let plan = generate_plan(&request, &catalogue, config)?;

    let mut stdout = io::stdout().lock();
    match format {
        OutputFormat::Table => write!(stdout, "{}", export::render_table(&plan))?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, &plan)?;
            writeln!(stdout)?;
        }
        OutputFormat::Csv => export::write_csv(&plan, &mut stdout)?,
    }

    if let Some(path) = csv_path {
        export::write_csv_file(&plan, path)?;
        eprintln!("✓ Plan written to {}", path.display());
    }
    Ok(())
}

fn cmd_catalogue(class: Option<&str>, config: &TaperConfig) -> Result<()> {
    let catalogue = load_catalogue(config)?;

    let filter = class
        .map(|c| {
            serde_json::from_value::<MedicineClass>(serde_json::Value::String(c.to_lowercase()))
                .map_err(|_| Error::UnknownMedicine(format!("unknown class '{}'", c)))
        })
        .transpose()?;

    for entry in &catalogue.classes {
        if filter.is_some_and(|f| f != entry.class) {
            continue;
        }
        println!("{} [{}]", entry.label, entry.class);
        for medicine in &entry.medicines {
            for formulation in &medicine.formulations {
                let strengths: Vec<String> =
                    formulation.strengths.iter().map(ToString::to_string).collect();
                let unit = if formulation.form == DoseForm::Patch {
                    "mcg/hr"
                } else {
                    "mg"
                };
                println!(
                    "  {} ({}, {}): {} {}",
                    medicine.key,
                    medicine.name,
                    formulation.form,
                    strengths.join(", "),
                    unit
                );
            }
        }
    }
    Ok(())
}

fn cmd_init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => TaperConfig::default_config_path()?,
    };

    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite)", path.display());
        return Ok(());
    }

    TaperConfig::default().save_to(&path)?;
    println!("✓ Wrote default config to {}", path.display());
    Ok(())
}
