//! Search criteria.

use std::fmt;

use strum_macros::{AsRefStr, Display, EnumString};
use voucher_map_housing_models::{LocatorRecord, PropertyType};

use crate::SearchError;

/// An inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<T> {
    /// Lowest accepted value.
    pub min: T,
    /// Highest accepted value.
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// Creates a range. Not validated until [`SearchCriteria::validate`].
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the range, endpoints included.
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

impl<T: fmt::Display> fmt::Display for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Transit radius a unit must have at least one station within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum StopRadius {
    #[strum(serialize = "0.25")]
    QuarterMile,
    #[strum(serialize = "0.5")]
    HalfMile,
    #[strum(serialize = "0.75")]
    ThreeQuarterMile,
    #[strum(serialize = "1", serialize = "1.0")]
    OneMile,
}

impl StopRadius {
    /// Radius in miles.
    #[must_use]
    pub const fn miles(self) -> f64 {
        match self {
            Self::QuarterMile => 0.25,
            Self::HalfMile => 0.5,
            Self::ThreeQuarterMile => 0.75,
            Self::OneMile => 1.0,
        }
    }

    /// The record's station count for this radius.
    #[must_use]
    pub const fn stop_count(self, record: &LocatorRecord) -> u32 {
        match self {
            Self::QuarterMile => record.stops_within_quarter_mile,
            Self::HalfMile => record.stops_within_half_mile,
            Self::ThreeQuarterMile => record.stops_within_three_quarter_mile,
            Self::OneMile => record.stops_within_one_mile,
        }
    }
}

/// Filters applied by [`LocatorDataset::search`](crate::LocatorDataset::search).
///
/// Every `None` field matches everything. Set fields are combined with
/// AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    /// Exact listing address.
    pub address: Option<String>,
    /// Monthly rent range in dollars.
    pub monthly_rent: Option<Bounds<u32>>,
    /// Accepted property types.
    pub property_types: Option<Vec<PropertyType>>,
    /// Bathroom count range.
    pub bathrooms: Option<Bounds<f64>>,
    /// Bedroom count range.
    pub bedrooms: Option<Bounds<f64>>,
    /// Only units available now.
    pub available_now: bool,
    /// Accepted neighborhood names.
    pub neighborhoods: Option<Vec<String>>,
    /// At least one station within this radius.
    pub transit: Option<StopRadius>,
}

impl SearchCriteria {
    /// Criteria that match every unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub const fn monthly_rent(mut self, min: u32, max: u32) -> Self {
        self.monthly_rent = Some(Bounds::new(min, max));
        self
    }

    #[must_use]
    pub fn property_types(mut self, types: Vec<PropertyType>) -> Self {
        self.property_types = Some(types);
        self
    }

    #[must_use]
    pub const fn bathrooms(mut self, min: f64, max: f64) -> Self {
        self.bathrooms = Some(Bounds::new(min, max));
        self
    }

    #[must_use]
    pub const fn bedrooms(mut self, min: f64, max: f64) -> Self {
        self.bedrooms = Some(Bounds::new(min, max));
        self
    }

    #[must_use]
    pub const fn available_now(mut self) -> Self {
        self.available_now = true;
        self
    }

    #[must_use]
    pub fn neighborhoods(mut self, names: Vec<String>) -> Self {
        self.neighborhoods = Some(names);
        self
    }

    #[must_use]
    pub const fn transit(mut self, radius: StopRadius) -> Self {
        self.transit = Some(radius);
        self
    }

    /// Checks that ranges are ordered and lists are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), SearchError> {
        if let Some(rent) = &self.monthly_rent
            && !rent.is_ordered()
        {
            return Err(SearchError::InvalidRange {
                field: "monthly_rent",
                range: rent.to_string(),
            });
        }
        for (field, bounds) in [("bathrooms", &self.bathrooms), ("bedrooms", &self.bedrooms)] {
            if let Some(bounds) = bounds
                && !(bounds.min.is_finite() && bounds.max.is_finite() && bounds.is_ordered())
            {
                return Err(SearchError::InvalidRange {
                    field,
                    range: bounds.to_string(),
                });
            }
        }
        if self.property_types.as_ref().is_some_and(Vec::is_empty) {
            return Err(SearchError::EmptyList {
                field: "property_types",
            });
        }
        if self.neighborhoods.as_ref().is_some_and(Vec::is_empty) {
            return Err(SearchError::EmptyList {
                field: "neighborhoods",
            });
        }
        Ok(())
    }

    /// Whether `record` satisfies every set filter. Assumes the criteria
    /// are valid.
    #[must_use]
    pub fn matches(&self, record: &LocatorRecord) -> bool {
        self.address.as_ref().is_none_or(|a| *a == record.address)
            && self.monthly_rent.is_none_or(|r| r.contains(record.monthly_rent))
            && self
                .property_types
                .as_ref()
                .is_none_or(|types| types.contains(&record.property_type))
            && self.bathrooms.is_none_or(|b| b.contains(record.bathrooms))
            && self.bedrooms.is_none_or(|b| b.contains(record.bedrooms))
            && (!self.available_now || record.is_available_now())
            && self
                .neighborhoods
                .as_ref()
                .is_none_or(|names| names.contains(&record.neighborhood))
            && self.transit.is_none_or(|radius| radius.stop_count(record) > 0)
    }
}
