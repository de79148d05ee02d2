#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Proximity scoring between subject and reference point sets.
//!
//! Computes the full subject-by-reference great-circle distance matrix and
//! reduces each subject's row to either cumulative radius-band counts
//! ([`ProximityEngine::nearest_within`], used for transit access) or a list
//! of references under a distance threshold
//! ([`ProximityEngine::flag_within`], used for landlord matching).
//!
//! The matrix is materialized one subject chunk at a time. Every reduction
//! is per-subject, so chunk size affects memory only, never results.

pub mod distance;
pub mod engine;
pub mod progress;

use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use voucher_map_housing_models::{Coordinates, LandlordRecord, RentalUnit, TransitStation};

pub use distance::{DistanceFn, Haversine, ReferenceBatch, haversine_miles};
pub use engine::{
    Candidate, DEFAULT_CHUNK_SIZE, DEFAULT_LANDLORD_THRESHOLD_MI, PerSubjectCounts,
    PerSubjectFlags, ProximityEngine, SubjectCounts, TRANSIT_RADII_MI, flag_within,
    nearest_within,
};

/// A record that can take part in a proximity computation.
pub trait Located {
    /// Identifier reported in results (unit id, stop id, landlord address).
    fn key(&self) -> &str;

    /// Location, or `None` if the record has no usable coordinates.
    fn coordinates(&self) -> Option<Coordinates>;
}

impl Located for RentalUnit {
    fn key(&self) -> &str {
        &self.id
    }

    fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }
}

impl Located for TransitStation {
    fn key(&self) -> &str {
        &self.stop_id
    }

    fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }
}

impl Located for LandlordRecord {
    fn key(&self) -> &str {
        &self.address
    }

    fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }
}

/// Which input set a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PointSide {
    /// The set being scored (rental units).
    Subject,
    /// The set being counted or matched against (stations, landlords).
    Reference,
}

/// A record excluded from a proximity computation because it lacks a
/// usable latitude/longitude.
///
/// Exclusion is per record; the rest of the batch is still scored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{side} {id} has no usable latitude/longitude")]
pub struct MissingCoordinateError {
    /// Input set the record belongs to.
    pub side: PointSide,
    /// The record's key.
    pub id: String,
}

/// Invalid engine parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProximityError {
    /// Radii must be non-empty, finite, positive and strictly increasing.
    #[error("Invalid radius bands {radii:?}: expected finite, positive, strictly increasing values")]
    InvalidRadii {
        /// The rejected radii.
        radii: Vec<f64>,
    },

    /// Threshold must be finite and non-negative.
    #[error("Invalid distance threshold {threshold}")]
    InvalidThreshold {
        /// The rejected threshold.
        threshold: f64,
    },
}
