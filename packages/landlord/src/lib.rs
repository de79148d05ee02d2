#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Landlord watch-list matching.
//!
//! Matching runs in two stages. Stage one lists every rental unit within a
//! tight distance of a watch-listed building (see [`export`] for the review
//! file). Stage two merges a human verification table: a unit is flagged
//! only if a reviewer confirmed it and it actually has a candidate. Units
//! with no verification entry are never flagged.

pub mod export;

use std::collections::BTreeMap;

use thiserror::Error;
use voucher_map_housing_models::{LandlordRecord, RentalUnit};
use voucher_map_proximity::{
    Candidate, DistanceFn, Haversine, PerSubjectFlags, ProximityEngine, ProximityError,
};

pub use export::{CandidateRow, export_candidates, write_candidates};

/// Errors that can occur while flagging or exporting.
#[derive(Debug, Error)]
pub enum LandlordError {
    /// The proximity engine rejected its parameters.
    #[error(transparent)]
    Proximity(#[from] ProximityError),

    /// Writing the candidate file failed.
    #[error("Failed to write {path}: {source}")]
    Csv {
        /// File being written.
        path: String,
        /// Underlying error.
        source: csv::Error,
    },

    /// Moving the finished candidate file into place failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// File being written.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Reviewer decisions keyed by unit id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationTable {
    confirmed: BTreeMap<String, bool>,
}

impl VerificationTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision, replacing any earlier one for the same unit.
    pub fn insert(&mut self, unit_id: impl Into<String>, confirmed: bool) {
        self.confirmed.insert(unit_id.into(), confirmed);
    }

    /// Whether a reviewer confirmed the unit. Absent units are unconfirmed.
    #[must_use]
    pub fn is_confirmed(&self, unit_id: &str) -> bool {
        self.confirmed.get(unit_id).copied().unwrap_or(false)
    }

    /// Number of decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }

    /// Unit ids confirmed `true`.
    pub fn confirmed_ids(&self) -> impl Iterator<Item = &str> {
        self.confirmed
            .iter()
            .filter(|(_, confirmed)| **confirmed)
            .map(|(id, _)| id.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for VerificationTable {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self {
            confirmed: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Final landlord flag for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandlordFlag {
    /// Unit id.
    pub unit_id: String,
    /// Confirmed match against the watch list.
    pub potential_bad_landlord: bool,
    /// Watch-listed address, present only when flagged.
    pub bad_landlord_address: Option<String>,
}

/// Output of [`flag_potential_bad_landlord`].
#[derive(Debug, Clone, PartialEq)]
pub struct LandlordFlags {
    /// One row per input unit, ordered by unit id.
    pub rows: Vec<LandlordFlag>,
    /// Stage-one candidates.
    pub candidates: PerSubjectFlags,
}

impl LandlordFlags {
    /// The flag for `unit_id`.
    #[must_use]
    pub fn get(&self, unit_id: &str) -> Option<&LandlordFlag> {
        self.rows
            .binary_search_by(|row| row.unit_id.as_str().cmp(unit_id))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Number of flagged units.
    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.rows.iter().filter(|r| r.potential_bad_landlord).count()
    }
}

/// Runs both stages with the default haversine engine.
///
/// # Errors
///
/// Returns [`LandlordError::Proximity`] if `threshold_mi` is invalid.
pub fn flag_potential_bad_landlord(
    units: &[RentalUnit],
    landlords: &[LandlordRecord],
    threshold_mi: f64,
    verification: Option<&VerificationTable>,
) -> Result<LandlordFlags, LandlordError> {
    flag_potential_bad_landlord_with(
        &ProximityEngine::new(Haversine),
        units,
        landlords,
        threshold_mi,
        verification,
    )
}

/// Runs both stages with a caller-supplied engine.
///
/// # Errors
///
/// Returns [`LandlordError::Proximity`] if `threshold_mi` is invalid.
pub fn flag_potential_bad_landlord_with<D: DistanceFn>(
    engine: &ProximityEngine<D>,
    units: &[RentalUnit],
    landlords: &[LandlordRecord],
    threshold_mi: f64,
    verification: Option<&VerificationTable>,
) -> Result<LandlordFlags, LandlordError> {
    let candidates = engine.flag_within(units, landlords, threshold_mi)?;

    log::info!(
        "Stage 1: {} candidate pairs within {threshold_mi} mi of {} watch-listed buildings",
        candidates.candidates.len(),
        landlords.len()
    );

    let empty = VerificationTable::new();
    let verification = verification.unwrap_or_else(|| {
        log::info!("No landlord verification table supplied; no unit will be flagged");
        &empty
    });

    let by_unit = candidates.by_subject();
    for unit_id in verification.confirmed_ids() {
        if !by_unit.contains_key(unit_id) {
            log::warn!("Unit {unit_id} is confirmed but has no candidate within {threshold_mi} mi");
        }
    }

    let mut rows: Vec<LandlordFlag> = units
        .iter()
        .map(|unit| {
            let address = if verification.is_confirmed(&unit.id) {
                by_unit
                    .get(unit.id.as_str())
                    .and_then(|group| nearest(group.iter().copied()))
                    .map(|c| c.reference_id.clone())
            } else {
                None
            };
            LandlordFlag {
                unit_id: unit.id.clone(),
                potential_bad_landlord: address.is_some(),
                bad_landlord_address: address,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
    rows.dedup_by(|a, b| a.unit_id == b.unit_id);

    drop(by_unit);
    let flags = LandlordFlags { rows, candidates };
    log::info!("Stage 2: flagged {} units", flags.flagged_count());

    Ok(flags)
}

/// Closest candidate; equal distances resolve to the smaller address.
fn nearest<'a>(candidates: impl Iterator<Item = &'a Candidate>) -> Option<&'a Candidate> {
    candidates.min_by(|a, b| {
        a.distance_mi
            .total_cmp(&b.distance_mi)
            .then_with(|| a.reference_id.cmp(&b.reference_id))
    })
}
