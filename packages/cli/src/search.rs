//! The `search` subcommand.

use std::path::PathBuf;

use clap::Args;
use voucher_map_housing_models::PropertyType;
use voucher_map_search::{LocatorDataset, SearchCriteria, StopRadius, write_results};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Locator database CSV
    #[arg(long)]
    pub database: PathBuf,
    /// Exact street address
    #[arg(long)]
    pub address: Option<String>,
    /// Monthly rent range in dollars, inclusive
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub rent: Option<Vec<u32>>,
    /// Accepted property type (repeatable: Apt, House, Duplex, TriPlex, 4-Plex, Townhouse)
    #[arg(long = "property-type")]
    pub property_types: Vec<PropertyType>,
    /// Bathroom range, inclusive
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub baths: Option<Vec<f64>>,
    /// Bedroom range, inclusive
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub beds: Option<Vec<f64>>,
    /// Only units available now
    #[arg(long)]
    pub available_now: bool,
    /// Accepted neighborhood (repeatable)
    #[arg(long = "neighborhood")]
    pub neighborhoods: Vec<String>,
    /// Require a transit stop within this many miles (0.25, 0.5, 0.75 or 1)
    #[arg(long)]
    pub transit: Option<StopRadius>,
    /// Write matches here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl SearchArgs {
    /// Converts the flags into criteria. Unset flags filter nothing.
    #[must_use]
    pub fn criteria(&self) -> SearchCriteria {
        let mut criteria = SearchCriteria::new();
        if let Some(address) = &self.address {
            criteria = criteria.address(address.clone());
        }
        if let Some([min, max]) = self.rent.as_deref() {
            criteria = criteria.monthly_rent(*min, *max);
        }
        if !self.property_types.is_empty() {
            criteria = criteria.property_types(self.property_types.clone());
        }
        if let Some([min, max]) = self.baths.as_deref() {
            criteria = criteria.bathrooms(*min, *max);
        }
        if let Some([min, max]) = self.beds.as_deref() {
            criteria = criteria.bedrooms(*min, *max);
        }
        if self.available_now {
            criteria = criteria.available_now();
        }
        if !self.neighborhoods.is_empty() {
            criteria = criteria.neighborhoods(self.neighborhoods.clone());
        }
        if let Some(radius) = self.transit {
            criteria = criteria.transit(radius);
        }
        criteria
    }
}

pub fn run(args: &SearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = LocatorDataset::load(&args.database)?;
    let matches = dataset.search(&args.criteria())?;
    log::info!("{} of {} units matched", matches.len(), dataset.len());

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_results(matches, file)?;
            println!("Wrote matches to {}", path.display());
        }
        None => write_results(matches, std::io::stdout().lock())?,
    }
    Ok(())
}
