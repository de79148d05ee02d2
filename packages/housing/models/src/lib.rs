#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Housing locator types shared across the voucher-map pipeline.
//!
//! Defines the rental unit listing, the reference point sets it is scored
//! against (transit stations and watch-listed landlord buildings), and the
//! [`LocatorRecord`] row that the pipeline writes as its single output
//! table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Availability string used by listings that can be leased immediately.
pub const AVAILABLE_NOW: &str = "Available Now";

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees (negative in the Western hemisphere).
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair. Returns `None` if either value is
    /// non-finite, out of range, or exactly zero (the usual placeholder
    /// for a failed geocode in scraped data).
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        if latitude == 0.0 || longitude == 0.0 {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }

    /// Builds coordinates from optional raw parts.
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Self::new(latitude?, longitude?)
    }
}

/// Listing property type as published by the housing locator.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum PropertyType {
    /// Four-unit building.
    #[serde(rename = "4-Plex")]
    #[strum(serialize = "4-Plex")]
    FourPlex,
    /// Apartment.
    #[serde(rename = "Apt")]
    #[strum(serialize = "Apt")]
    Apartment,
    /// Two-unit building.
    Duplex,
    /// Single-family house.
    House,
    /// Townhouse.
    Townhouse,
    /// Three-unit building.
    #[serde(rename = "TriPlex")]
    #[strum(serialize = "TriPlex")]
    TriPlex,
}

impl PropertyType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::FourPlex,
            Self::Apartment,
            Self::Duplex,
            Self::House,
            Self::Townhouse,
            Self::TriPlex,
        ]
    }
}

/// A voucher-eligible rental listing.
///
/// Created once from a raw listing snapshot. The pipeline never mutates a
/// unit after geocoding; derived values live in [`LocatorRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalUnit {
    /// Stable listing identifier from the housing locator.
    pub id: String,
    /// Street address as listed.
    pub address: String,
    /// Monthly rent in whole dollars.
    pub monthly_rent: u32,
    /// Bedroom count (0 for an efficiency).
    pub bedrooms: f64,
    /// Bathroom count (half baths allowed).
    pub bathrooms: f64,
    /// Property type.
    pub property_type: PropertyType,
    /// `"Available Now"` or the date the unit becomes available.
    pub availability: String,
    /// Landlord or agent contact.
    pub contact: Option<String>,
    /// Listing URL.
    pub url: Option<String>,
    /// Location, if the listing carried usable coordinates.
    pub coordinates: Option<Coordinates>,
}

impl RentalUnit {
    /// Whether the listing can be leased immediately.
    #[must_use]
    pub fn is_available_now(&self) -> bool {
        self.availability == AVAILABLE_NOW
    }
}

/// A rapid-transit ("L") station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitStation {
    /// Transit agency stop identifier.
    pub stop_id: String,
    /// Station location, `None` if the source text could not be parsed.
    pub coordinates: Option<Coordinates>,
}

/// A building on the problem-landlord watch list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandlordRecord {
    /// Building address as published on the watch list.
    pub address: String,
    /// Building location, if published.
    pub coordinates: Option<Coordinates>,
}

/// Eviction Lab figures for one block group and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockGroupEvictions {
    /// Census block group GEOID.
    pub geoid: String,
    /// Reporting year, as published (`"2016"`).
    pub year: String,
    /// Enclosing county, e.g. `"Cook County, Illinois"`.
    pub parent_location: String,
    /// Evictions per 100 renter households.
    pub eviction_rate: Option<f64>,
    /// Eviction filings per 100 renter households.
    pub eviction_filing_rate: Option<f64>,
    /// Demographic and housing-cost context published with the rates.
    pub profile: BlockGroupProfile,
}

/// Census-derived block group attributes from the Eviction Lab table.
///
/// Percentages are on a 0 to 100 scale, as published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockGroupProfile {
    pub population: Option<f64>,
    pub renter_occupied_households: Option<f64>,
    pub median_gross_rent: Option<f64>,
    pub median_household_income: Option<f64>,
    pub median_property_value: Option<f64>,
    pub pct_white: Option<f64>,
    pub pct_af_am: Option<f64>,
    pub pct_hispanic: Option<f64>,
    pub pct_am_ind: Option<f64>,
    pub pct_asian: Option<f64>,
    /// Eviction filings in the reporting year.
    pub eviction_filings: Option<f64>,
    /// Evictions in the reporting year.
    pub evictions: Option<f64>,
}

/// January rent index values for one neighborhood.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborhoodRentIndex {
    /// Neighborhood region id.
    pub region_id: String,
    /// Neighborhood name as published with the index.
    pub region_name: Option<String>,
    pub city: Option<String>,
    /// Two-letter state code.
    pub state: Option<String>,
    pub metro: Option<String>,
    /// County name as published (`"Cook County"`).
    pub county: Option<String>,
    /// Year to January index value. Years with no published value are
    /// absent.
    pub january: BTreeMap<u16, f64>,
}

impl NeighborhoodRentIndex {
    /// Fractional change in the January index from `from` to `to`, e.g.
    /// `0.12` for a 12% increase. `None` if either year is missing or the
    /// base value is zero.
    #[must_use]
    pub fn change(&self, from: u16, to: u16) -> Option<f64> {
        let base = *self.january.get(&from)?;
        let end = *self.january.get(&to)?;
        if base == 0.0 {
            return None;
        }
        Some((end - base) / base)
    }
}

/// One row of the merged locator table.
///
/// Column names follow the published locator database so downstream
/// reporting keeps working against the same headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorRecord {
    /// Listing identifier.
    #[serde(rename = "index")]
    pub unit_id: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Monthly Rent")]
    pub monthly_rent: u32,
    #[serde(rename = "Property Type")]
    pub property_type: PropertyType,
    #[serde(rename = "Bath")]
    pub bathrooms: f64,
    #[serde(rename = "Bed")]
    pub bedrooms: f64,
    #[serde(rename = "Availability")]
    pub availability: String,
    #[serde(rename = "Contact")]
    pub contact: Option<String>,
    #[serde(rename = "URL")]
    pub url: Option<String>,
    /// Latitude after corrections; empty only for units placed by a
    /// neighborhood override without a usable location.
    #[serde(rename = "Lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "Long")]
    pub longitude: Option<f64>,
    /// Census block group, `None` when the unit fell outside every block group.
    #[serde(rename = "GEOID")]
    pub geoid: Option<String>,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "County")]
    pub county: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Neighborhood")]
    pub neighborhood: String,
    #[serde(rename = "RegionID")]
    pub region_id: String,
    /// Eviction Lab county of the block group; empty without eviction data.
    #[serde(rename = "parent-location")]
    pub parent_location: Option<String>,
    pub population: Option<f64>,
    #[serde(rename = "renter-occupied-households")]
    pub renter_occupied_households: Option<f64>,
    #[serde(rename = "median-gross-rent")]
    pub median_gross_rent: Option<f64>,
    #[serde(rename = "median-household-income")]
    pub median_household_income: Option<f64>,
    #[serde(rename = "median-property-value")]
    pub median_property_value: Option<f64>,
    #[serde(rename = "pct-white")]
    pub pct_white: Option<f64>,
    #[serde(rename = "pct-af-am")]
    pub pct_af_am: Option<f64>,
    #[serde(rename = "pct-hispanic")]
    pub pct_hispanic: Option<f64>,
    #[serde(rename = "pct-am-ind")]
    pub pct_am_ind: Option<f64>,
    #[serde(rename = "pct-asian")]
    pub pct_asian: Option<f64>,
    #[serde(rename = "eviction-filings")]
    pub eviction_filings: Option<f64>,
    pub evictions: Option<f64>,
    #[serde(rename = "2016_evict_rate")]
    pub eviction_rate: Option<f64>,
    /// Percentile rank of `eviction_rate` across all units with a rate.
    #[serde(rename = "er_percentile")]
    pub eviction_rate_percentile: Option<f64>,
    #[serde(rename = "2016_evict_filing_rate")]
    pub eviction_filing_rate: Option<f64>,
    #[serde(rename = "efr_percentile")]
    pub eviction_filing_rate_percentile: Option<f64>,
    #[serde(rename = "2011-2015_rent_perc_change")]
    pub rent_change_2011_2015: Option<f64>,
    #[serde(rename = "2015-2019_rent_perc_change")]
    pub rent_change_2015_2019: Option<f64>,
    pub potential_bad_landlord: bool,
    pub bad_landlord_address: Option<String>,
    #[serde(rename = "num_stops_quart_mi")]
    pub stops_within_quarter_mile: u32,
    #[serde(rename = "num_stops_half_mi")]
    pub stops_within_half_mile: u32,
    #[serde(rename = "num_stops_3quart_mi")]
    pub stops_within_three_quarter_mile: u32,
    #[serde(rename = "num_stops_1_mi")]
    pub stops_within_one_mile: u32,
}

impl LocatorRecord {
    /// Whether the listing can be leased immediately.
    #[must_use]
    pub fn is_available_now(&self) -> bool {
        self.availability == AVAILABLE_NOW
    }
}
