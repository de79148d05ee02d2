#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Block group and neighborhood boundary loading.
//!
//! Reads `GeoJSON` `FeatureCollection` files into [`PolygonRegion`]
//! collections and validates that every layer is in WGS84. Layers in any
//! other reference system are rejected: joining mismatched geometries
//! silently produces wrong assignments, so the load fails instead.

pub mod loader;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::{load_boundaries, parse_boundaries};
pub use voucher_map_geography_models::{
    BoundaryFieldMapping, Crs, PolygonRegion, RegionKind,
};

/// Errors that can occur while loading a boundary layer.
///
/// All variants are fatal for a pipeline run; there is no partial-geometry
/// fallback.
#[derive(Debug, Error)]
pub enum GeometryLoadError {
    /// The boundary file could not be read.
    #[error("Failed to read boundary file {path}: {source}")]
    Io {
        /// File that failed to open or read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a valid `GeoJSON` `FeatureCollection`.
    #[error("Failed to parse boundary file {path}: {message}")]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// A feature lacks the configured identifier property.
    #[error("Feature {feature_index} in {path} is missing required field '{field}'")]
    MissingField {
        /// Offending file.
        path: PathBuf,
        /// Zero-based position of the feature in the collection.
        feature_index: usize,
        /// Name of the missing property.
        field: String,
    },

    /// A feature's geometry is not a polygon or multipolygon.
    #[error("Feature {feature_index} in {path} has unsupported geometry type {geometry_type}")]
    UnsupportedGeometry {
        /// Offending file.
        path: PathBuf,
        /// Zero-based position of the feature in the collection.
        feature_index: usize,
        /// The geometry type that was found.
        geometry_type: String,
    },

    /// The layer is not in WGS84.
    #[error("Boundary file {path} is not in {expected}: {found}")]
    CrsMismatch {
        /// Offending file.
        path: PathBuf,
        /// The reference system the pipeline requires.
        expected: Crs,
        /// What was found instead (CRS name or offending coordinate).
        found: String,
    },

    /// The collection contains no usable features.
    #[error("Boundary file {path} contains no polygon features")]
    Empty {
        /// Offending file.
        path: PathBuf,
    },
}
