#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Block group and neighborhood boundary types.
//!
//! Every geometry-bearing type carries an explicit [`Crs`]. Spatial joins
//! are only meaningful between layers that share a reference system, so
//! the reference system travels with the polygon instead of being assumed
//! by convention.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Coordinate reference system of a geometry layer.
///
/// Only WGS84 geographic coordinates are supported. Layers in any other
/// system are rejected at load time rather than reprojected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Crs {
    /// WGS84 longitude/latitude (EPSG:4326, OGC CRS84 axis order).
    #[strum(serialize = "EPSG:4326")]
    Wgs84,
}

impl Crs {
    /// EPSG code of this reference system.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
        }
    }

    /// Resolves a CRS name as written in a legacy `GeoJSON` `crs` member
    /// (`"EPSG:4326"`, `"urn:ogc:def:crs:OGC:1.3:CRS84"`, ...).
    ///
    /// Returns `None` for any system other than WGS84.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase();
        let matches = normalized == "EPSG:4326"
            || normalized == "WGS84"
            || normalized == "CRS84"
            || normalized.ends_with(":CRS84")
            || normalized.ends_with("EPSG::4326")
            || normalized.ends_with("EPSG:4326");
        matches.then_some(Self::Wgs84)
    }
}

/// The two polygon layers a rental unit is joined against.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegionKind {
    /// Census block group (eviction data join key).
    BlockGroup,
    /// Market neighborhood polygon (rent index join key).
    Neighborhood,
}

impl RegionKind {
    /// Default property mapping for this layer.
    ///
    /// Block groups use the Census `GEOID`; neighborhoods use the real
    /// estate boundary set's `RegionID` and `Name`.
    #[must_use]
    pub fn default_fields(self) -> BoundaryFieldMapping {
        match self {
            Self::BlockGroup => BoundaryFieldMapping {
                id: "GEOID".to_string(),
                name: None,
            },
            Self::Neighborhood => BoundaryFieldMapping {
                id: "RegionID".to_string(),
                name: Some("Name".to_string()),
            },
        }
    }
}

/// Which feature properties hold a region's identifier and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryFieldMapping {
    /// Property holding the unique region identifier (required on every
    /// feature).
    pub id: String,
    /// Property holding the human-readable region name, if any.
    #[serde(default)]
    pub name: Option<String>,
}

/// A loaded boundary polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRegion {
    /// Which layer this region belongs to.
    pub kind: RegionKind,
    /// GEOID for block groups, `RegionID` for neighborhoods.
    pub id: String,
    /// Display name (neighborhood name); `None` for block groups.
    pub name: Option<String>,
    /// Reference system of `boundary`.
    pub crs: Crs,
    /// Region boundary. Single polygons are stored as one-member
    /// multipolygons.
    pub boundary: MultiPolygon<f64>,
}
