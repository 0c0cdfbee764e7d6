use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use find_your_place::export::{export_filename, write_csv};
use find_your_place::{init_tracing, AppConfig, PlaceFinder, PlaceRecord};

/// Find schools, colleges, hospitals and hotels from OpenStreetMap.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search around a named location
    Search {
        /// Free-form place name, e.g. "Sacramento, CA"
        location: String,
        /// Search radius in kilometres
        #[arg(long, default_value_t = 5.0)]
        radius_km: f64,
        /// Category to include; repeat for several (default: all)
        #[arg(long = "category", value_parser = ["school", "college", "hospital", "hotel"])]
        categories: Vec<String>,
        /// Crawl place websites for missing emails
        #[arg(long)]
        with_email: bool,
        /// Write CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export every category across the configured region
    Region {
        /// Crawl place websites for missing emails
        #[arg(long)]
        with_email: bool,
        /// Output file (default: findyourplace_<region>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = AppConfig::from_env();
    info!(config = ?config.public_profile(), "loaded configuration");
    let finder = PlaceFinder::new(config).context("failed to build HTTP clients")?;

    match cli.command {
        Command::Search {
            location,
            radius_km,
            categories,
            with_email,
            output,
        } => {
            let response = finder
                .search_location(&location, radius_km, Some(&categories), with_email)
                .await
                .with_context(|| format!("search around {location:?} failed"))?;
            info!(
                label = %response.location_label,
                results = response.results.len(),
                source = ?response.source,
                "search finished"
            );
            emit(output, &response.results)?;
        }
        Command::Region { with_email, output } => {
            let region = finder.config().region_name.clone();
            let records = finder
                .search_region(with_email)
                .await
                .with_context(|| format!("region export for {region} failed"))?;
            let path = output
                .unwrap_or_else(|| PathBuf::from(export_filename(&region.to_lowercase())));
            emit(Some(path), &records)?;
        }
    }

    Ok(())
}

fn emit(output: Option<PathBuf>, records: &[PlaceRecord]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_csv(BufWriter::new(file), records)?;
            info!(path = %path.display(), count = records.len(), "wrote CSV");
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_csv(&mut handle, records)?;
            handle.flush()?;
        }
    }
    Ok(())
}
