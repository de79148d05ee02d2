#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Builds the locator database.
//!
//! Stages, in order:
//!
//! 1. Load and index the block group and neighborhood layers.
//! 2. Read listings and assign regions (corrections, exclusions and
//!    overrides from the config).
//! 3. Count transit stations within each radius band.
//! 4. Match units to the landlord watch list and merge verification
//!    decisions.
//! 5. Join eviction and rent-index data.
//! 6. Write one row per retained unit, ordered by unit id.
//!
//! Any stage error aborts the run before the output file is touched.

pub mod config;
pub mod output;
pub mod records;
pub mod run;

use std::path::PathBuf;

use thiserror::Error;
use voucher_map_geocoder::GeocodeError;
use voucher_map_geography::GeometryLoadError;
use voucher_map_ingest::IngestError;
use voucher_map_landlord::LandlordError;
use voucher_map_proximity::ProximityError;
use voucher_map_spatial::SpatialError;

pub use config::{ConfigError, PipelineConfig};
pub use run::{BuiltDatabase, Pipeline, PipelineSummary};

/// Errors that can abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration failed to load or validate.
    #[error("Config: {0}")]
    Config(#[from] ConfigError),

    /// A boundary layer failed to load.
    #[error("Boundary loading: {0}")]
    Geometry(#[from] GeometryLoadError),

    /// A boundary layer failed to index.
    #[error("Spatial index: {0}")]
    Spatial(#[from] SpatialError),

    /// An input table failed to read.
    #[error("Ingest: {0}")]
    Ingest(#[from] IngestError),

    /// Region assignment failed.
    #[error("Geocoding: {0}")]
    Geocode(#[from] GeocodeError),

    /// Transit scoring failed.
    #[error("Transit proximity: {0}")]
    Proximity(#[from] ProximityError),

    /// Landlord matching or candidate export failed.
    #[error("Landlord matching: {0}")]
    Landlord(#[from] LandlordError),

    /// The output file could not be written.
    #[error("Failed to write {path}: {message}")]
    Output {
        /// Output file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}
