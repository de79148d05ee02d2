#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the voucher locator tools.
//!
//! `build` runs the full pipeline from a TOML config, `candidates` exports
//! the landlord watch-list matches for review, and `search` filters an
//! existing locator database.

mod search;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use voucher_map_cli_utils::IndicatifProgress;
use voucher_map_pipeline::{Pipeline, PipelineConfig, PipelineSummary};

#[derive(Parser)]
#[command(name = "voucher_map", about = "Housing choice voucher unit locator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the locator database from the configured inputs
    Build {
        /// Pipeline config file (e.g., `configs/chicago.toml`)
        #[arg(long)]
        config: PathBuf,
        /// Write output here instead of the configured directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Export stage-one landlord candidates for manual verification
    Candidates {
        /// Pipeline config file
        #[arg(long)]
        config: PathBuf,
        /// Write output here instead of the configured directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Filter units in a built locator database
    Search(search::SearchArgs),
    /// List the neighborhoods present in a locator database
    Neighborhoods {
        /// Locator database CSV
        #[arg(long)]
        database: PathBuf,
    },
}

fn load_config(
    path: &std::path::Path,
    output_dir: Option<PathBuf>,
) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::load(path)?;
    if let Some(dir) = output_dir {
        config.output.directory = dir;
    }
    Ok(config)
}

fn print_summary(summary: &PipelineSummary) {
    let geocode = &summary.geocode;
    println!("Listings read:            {}", summary.listings);
    println!("  excluded:               {}", geocode.excluded.len());
    println!("  corrected:              {}", geocode.corrected.len());
    println!("  missing coordinates:    {}", geocode.missing_coordinates.len());
    println!("  outside block groups:   {}", geocode.block_group_misses);
    println!("  placed by override:     {}", geocode.overridden.len());
    println!("  dropped:                {}", geocode.dropped.len());
    println!("Transit exclusions:       {}", summary.transit_excluded);
    println!("Landlord exclusions:      {}", summary.landlord_excluded);
    println!("Landlord candidates:      {}", summary.landlord_candidates);
    println!("Flagged units:            {}", summary.flagged);
    println!("Rows written:             {}", summary.rows);
    if let Some(path) = &summary.output {
        println!("Output:                   {}", path.display());
    }
    if let Some(path) = &summary.rent_index_output {
        println!("Rent index:               {}", path.display());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = voucher_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { config, output_dir } => {
            let start = Instant::now();
            let config = load_config(&config, output_dir)?;
            let progress = IndicatifProgress::distance_bar(&multi, "Distance matrix");
            let summary = Pipeline::new(config).with_progress(progress).run()?;
            print_summary(&summary);
            log::info!("Build finished in {:.1}s", start.elapsed().as_secs_f64());
        }
        Commands::Candidates { config, output_dir } => {
            let config = load_config(&config, output_dir)?;
            let path = config.output.landlord_candidates_path();
            let progress = IndicatifProgress::distance_bar(&multi, "Landlord matching");
            let count = Pipeline::new(config).with_progress(progress).export_candidates()?;
            println!("Wrote {count} candidate pairs to {}", path.display());
        }
        Commands::Search(args) => search::run(&args)?,
        Commands::Neighborhoods { database } => {
            let dataset = voucher_map_search::LocatorDataset::load(&database)?;
            for name in dataset.neighborhoods() {
                println!("{name}");
            }
        }
    }

    Ok(())
}
