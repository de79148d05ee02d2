//! Hand-maintained geocoding rules.
//!
//! Scraped listings occasionally carry coordinates that are plainly wrong
//! or that fall in gaps between neighborhood polygons. These rules record
//! the manual fixes that were verified against the listing addresses.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use voucher_map_housing_models::Coordinates;

/// A hand-verified neighborhood for a unit whose point matched no
/// neighborhood polygon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodOverride {
    /// Neighborhood name.
    pub neighborhood: String,
    /// Neighborhood region id.
    pub region_id: String,
}

/// Corrections, exclusions and overrides applied by
/// [`assign_regions`](crate::assign_regions).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeRules {
    /// Unit id to corrected location. Applied before any spatial join.
    pub corrections: BTreeMap<String, Coordinates>,
    /// Unit ids to drop regardless of any override (scrape artifacts with
    /// false addresses).
    pub exclusions: BTreeSet<String>,
    /// Unit id to fallback neighborhood, used only when the spatial join
    /// finds no neighborhood.
    pub overrides: BTreeMap<String, NeighborhoodOverride>,
}

impl GeocodeRules {
    /// Rules that change nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a coordinate correction.
    #[must_use]
    pub fn with_correction(mut self, unit_id: &str, coordinates: Coordinates) -> Self {
        self.corrections.insert(unit_id.to_string(), coordinates);
        self
    }

    /// Adds an exclusion.
    #[must_use]
    pub fn with_exclusion(mut self, unit_id: &str) -> Self {
        self.exclusions.insert(unit_id.to_string());
        self
    }

    /// Adds a neighborhood override.
    #[must_use]
    pub fn with_override(mut self, unit_id: &str, neighborhood: &str, region_id: &str) -> Self {
        self.overrides.insert(
            unit_id.to_string(),
            NeighborhoodOverride {
                neighborhood: neighborhood.to_string(),
                region_id: region_id.to_string(),
            },
        );
        self
    }
}
