#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood context for geocoded units.
//!
//! Joins block-group eviction rates and demographics by GEOID and
//! neighborhood rent-index changes and place names by region id, then ranks
//! the eviction columns across the unit table. Units with no matching row
//! get empty values (place names fall back to configured defaults); nothing
//! here drops a unit.

pub mod percentile;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use voucher_map_geocoder::GeocodedUnit;
use voucher_map_housing_models::{BlockGroupEvictions, BlockGroupProfile, NeighborhoodRentIndex};

pub use percentile::percentile_ranks;

/// A span of January rent-index values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentPeriod {
    /// Base year.
    pub from: u16,
    /// End year.
    pub to: u16,
}

/// Which published rows the joins use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichSettings {
    /// Eviction Lab reporting year.
    pub eviction_year: String,
    /// Eviction Lab `parent-location` the block groups must belong to.
    pub eviction_county: String,
    /// First rent-change column.
    pub early_rent_period: RentPeriod,
    /// Second rent-change column.
    pub late_rent_period: RentPeriod,
    /// State used when a unit's region has no rent-index row or the row
    /// leaves it blank.
    pub default_state: String,
    pub default_county: String,
    pub default_city: String,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            eviction_year: "2016".to_string(),
            eviction_county: "Cook County, Illinois".to_string(),
            early_rent_period: RentPeriod { from: 2011, to: 2015 },
            late_rent_period: RentPeriod { from: 2015, to: 2019 },
            default_state: "IL".to_string(),
            default_county: "Cook".to_string(),
            default_city: "Chicago".to_string(),
        }
    }
}

/// Enrichment values for one unit.
///
/// The eviction fields are empty when the unit's block group has no row for
/// the configured year and county; the rent fields are empty when its
/// region has no rent-index row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitEnrichment {
    /// Evictions per 100 renter households in the unit's block group.
    pub eviction_rate: Option<f64>,
    /// Rank of `eviction_rate` among all enriched units, in `(0, 1]`.
    pub eviction_rate_percentile: Option<f64>,
    /// Eviction filings per 100 renter households.
    pub eviction_filing_rate: Option<f64>,
    /// Rank of `eviction_filing_rate` among all enriched units.
    pub eviction_filing_rate_percentile: Option<f64>,
    /// Eviction Lab county of the joined block group row.
    pub parent_location: Option<String>,
    /// Block group demographics from the same row.
    pub profile: BlockGroupProfile,
    /// Fractional January rent-index change over the early period.
    pub rent_change_early: Option<f64>,
    /// Fractional change over the late period.
    pub rent_change_late: Option<f64>,
    /// State of the unit's region.
    pub state: String,
    /// County of the unit's region.
    pub county: String,
    /// City of the unit's region.
    pub city: String,
}

/// Computes [`UnitEnrichment`] for every unit, in the same order as
/// `units`.
#[must_use]
pub fn enrich(
    units: &[GeocodedUnit],
    evictions: &[BlockGroupEvictions],
    rent_index: &[NeighborhoodRentIndex],
    settings: &EnrichSettings,
) -> Vec<UnitEnrichment> {
    let evictions = eviction_lookup(evictions, settings);
    let rents = rent_lookup(rent_index);

    let mut rows: Vec<UnitEnrichment> = units
        .iter()
        .map(|unit| {
            let eviction = unit.geoid.as_deref().and_then(|geoid| evictions.get(geoid));
            let rent = rents.get(unit.region_id.as_str());
            let place = |field: fn(&NeighborhoodRentIndex) -> Option<&String>, default: &String| {
                rent.copied().and_then(field).unwrap_or(default).clone()
            };
            UnitEnrichment {
                eviction_rate: eviction.and_then(|e| e.eviction_rate),
                eviction_filing_rate: eviction.and_then(|e| e.eviction_filing_rate),
                parent_location: eviction.map(|e| e.parent_location.clone()),
                profile: eviction.map(|e| e.profile).unwrap_or_default(),
                rent_change_early: rent.and_then(|r| {
                    r.change(settings.early_rent_period.from, settings.early_rent_period.to)
                }),
                rent_change_late: rent.and_then(|r| {
                    r.change(settings.late_rent_period.from, settings.late_rent_period.to)
                }),
                state: place(|r| r.state.as_ref(), &settings.default_state),
                county: place(|r| r.county.as_ref(), &settings.default_county),
                city: place(|r| r.city.as_ref(), &settings.default_city),
                ..UnitEnrichment::default()
            }
        })
        .collect();

    let rate_ranks = percentile_ranks(&rows.iter().map(|r| r.eviction_rate).collect::<Vec<_>>());
    let filing_ranks =
        percentile_ranks(&rows.iter().map(|r| r.eviction_filing_rate).collect::<Vec<_>>());
    for ((row, rate), filing) in rows.iter_mut().zip(rate_ranks).zip(filing_ranks) {
        row.eviction_rate_percentile = rate;
        row.eviction_filing_rate_percentile = filing;
    }

    log::info!(
        "Enriched {} units: {} with eviction rates, {} with rent changes",
        rows.len(),
        rows.iter().filter(|r| r.eviction_rate.is_some()).count(),
        rows.iter()
            .filter(|r| r.rent_change_early.is_some() || r.rent_change_late.is_some())
            .count()
    );

    rows
}

/// Block-group rows for the configured year and county, keyed by GEOID.
/// A GEOID listed twice keeps its first row.
fn eviction_lookup<'a>(
    evictions: &'a [BlockGroupEvictions],
    settings: &EnrichSettings,
) -> BTreeMap<&'a str, &'a BlockGroupEvictions> {
    let mut lookup = BTreeMap::new();
    for row in evictions
        .iter()
        .filter(|r| r.year == settings.eviction_year && r.parent_location == settings.eviction_county)
    {
        if lookup.contains_key(row.geoid.as_str()) {
            log::warn!("Duplicate eviction row for block group {}", row.geoid);
            continue;
        }
        lookup.insert(row.geoid.as_str(), row);
    }
    log::debug!(
        "{} block groups have {} eviction data for {}",
        lookup.len(),
        settings.eviction_year,
        settings.eviction_county
    );
    lookup
}

fn rent_lookup(rent_index: &[NeighborhoodRentIndex]) -> BTreeMap<&str, &NeighborhoodRentIndex> {
    let mut lookup = BTreeMap::new();
    for row in rent_index {
        if lookup.contains_key(row.region_id.as_str()) {
            log::warn!("Duplicate rent index row for region {}", row.region_id);
            continue;
        }
        lookup.insert(row.region_id.as_str(), row);
    }
    lookup
}
