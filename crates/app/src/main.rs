use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use scrip::{recognizer_from_config, ReceiptService};
use scrip_core::{Analysis, Category, Config, DocumentType};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "scrip", version, about = "Receipt and invoice scanner")]
struct Cli {
    /// Root for images, the record table and the ledger.
    #[arg(long, env = "SCRIP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// TOML config file; missing keys fall back to defaults under the data dir.
    #[arg(long, env = "SCRIP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store, analyze and record one or more images.
    Ingest {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Print the analysis of an image without storing it.
    Extract { image: PathBuf },
    /// Print every record whose image still exists.
    List,
    /// Correct the fields of a stored record.
    Update {
        file: String,
        #[arg(long = "type")]
        doc_type: DocumentType,
        #[arg(long)]
        date: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        category: Category,
    },
    /// Remove a record and its image.
    Delete { file: String },
    /// Re-analyze every stored image and rebuild the table.
    Reprocess,
    /// Write the table out as CSV or an Excel workbook.
    Export {
        #[arg(value_enum)]
        format: ExportFormat,
        dest: PathBuf,
    },
    /// Count records and total their amounts.
    Summary,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Xlsx,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => directories::ProjectDirs::from("com", "scrip", "Scrip")
            .context("Failed to get app directory")?
            .data_dir()
            .to_path_buf(),
    };
    match &cli.config {
        Some(path) => Config::load(path, &data_dir)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::for_data_dir(&data_dir)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let recognizer =
        recognizer_from_config(&config.ocr).context("Failed to set up OCR engine")?;
    let service = ReceiptService::new(&config, recognizer);

    match cli.command {
        Command::Ingest { images } => {
            let mut failures = 0;
            for image in &images {
                match service.ingest_path(image).await {
                    Ok(record) => print_json(&record)?,
                    Err(e) => {
                        failures += 1;
                        tracing::error!("Failed to ingest {}: {}", image.display(), e);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {} images failed", images.len());
            }
        }
        Command::Extract { image } => {
            let analysis = service
                .extract(&image)
                .await
                .with_context(|| format!("Failed to analyze {}", image.display()))?;
            print_json(&analysis)?;
        }
        Command::List => print_json(&service.list().context("Failed to read records")?)?,
        Command::Update {
            file,
            doc_type,
            date,
            amount,
            category,
        } => {
            let analysis = Analysis {
                doc_type,
                date,
                amount,
                category,
            };
            let record = service
                .update(&file, analysis)
                .with_context(|| format!("Failed to update {file}"))?;
            print_json(&record)?;
        }
        Command::Delete { file } => {
            let outcome = service
                .delete(&file)
                .with_context(|| format!("Failed to delete {file}"))?;
            print_json(&outcome)?;
        }
        Command::Reprocess => {
            let report = service
                .reprocess_all()
                .await
                .context("Failed to reprocess images")?;
            print_json(&report)?;
        }
        Command::Export { format, dest } => {
            match format {
                ExportFormat::Csv => {
                    service.export_csv(&dest).context("Failed to export CSV")?;
                }
                ExportFormat::Xlsx => {
                    service.export_xlsx(&dest).context("Failed to export workbook")?;
                }
            }
            tracing::info!("Exported to {}", dest.display());
        }
        Command::Summary => print_json(&service.summary().context("Failed to read records")?)?,
    }

    Ok(())
}
