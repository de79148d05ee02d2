#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region assignment for rental units.
//!
//! Joins each unit's location against the block group and neighborhood
//! layers:
//!
//! 1. Units on the exclusion list are removed outright.
//! 2. Known coordinate corrections replace the raw location.
//! 3. The (corrected) point is matched against block groups. No match
//!    leaves the GEOID empty.
//! 4. The point is matched against neighborhoods. No match drops the unit
//!    unless a hand-verified override exists for it.
//!
//! Every returned unit has a neighborhood. Output is ordered by unit id.

pub mod assign;
pub mod rules;

use thiserror::Error;
use voucher_map_geography_models::RegionKind;

pub use assign::{GeocodeReport, GeocodedUnit, GeocodedUnits, NeighborhoodSource, assign_regions};
pub use rules::{GeocodeRules, NeighborhoodOverride};

/// Errors that can occur during region assignment.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// An index for the wrong layer was supplied.
    #[error("Expected a {expected} index, got a {found} index")]
    WrongLayer {
        /// Layer the argument should cover.
        expected: RegionKind,
        /// Layer the supplied index covers.
        found: RegionKind,
    },
}
