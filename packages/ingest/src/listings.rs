//! Scraped listing snapshot.
//!
//! The snapshot is a JSON object keyed by listing id:
//!
//! ```json
//! { "4545145": { "Address": "...", "Monthly Rent": 1100, "Lat": 41.77, "Long": 87.66, ... } }
//! ```
//!
//! The listing site publishes longitudes without a sign, so every
//! longitude is moved into the Western hemisphere here.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr as _;

use serde::Deserialize;
use voucher_map_housing_models::{Coordinates, PropertyType, RentalUnit};

use crate::{IngestError, read_to_string};

#[derive(Debug, Deserialize)]
struct RawListing {
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Monthly Rent")]
    monthly_rent: u32,
    #[serde(rename = "Property Type")]
    property_type: String,
    #[serde(rename = "Bath")]
    bathrooms: f64,
    #[serde(rename = "Bed")]
    bedrooms: f64,
    #[serde(rename = "Availability")]
    availability: String,
    #[serde(rename = "Contact", default)]
    contact: Option<String>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
    #[serde(rename = "Lat", default)]
    latitude: Option<f64>,
    #[serde(rename = "Long", default)]
    longitude: Option<f64>,
}

/// Reads a listing snapshot. Units are returned ordered by id.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read, is not a listing
/// object, or a listing has an unknown property type or impossible counts.
pub fn read_listings(path: &Path) -> Result<Vec<RentalUnit>, IngestError> {
    let contents = read_to_string(path)?;
    let units = parse_listings(&path.display().to_string(), &contents)?;
    log::info!("Read {} listings from {}", units.len(), path.display());
    Ok(units)
}

/// Parses listing snapshot contents. `path` is used in error messages.
///
/// # Errors
///
/// See [`read_listings`].
pub fn parse_listings(path: &str, contents: &str) -> Result<Vec<RentalUnit>, IngestError> {
    let raw: BTreeMap<String, RawListing> =
        serde_json::from_str(contents).map_err(|source| IngestError::Json {
            path: path.to_string(),
            source,
        })?;

    raw.into_iter()
        .map(|(id, listing)| to_unit(path, id, listing))
        .collect()
}

fn to_unit(path: &str, id: String, raw: RawListing) -> Result<RentalUnit, IngestError> {
    let invalid = |message: String| IngestError::InvalidRecord {
        path: path.to_string(),
        record: id.clone(),
        message,
    };

    let property_type = PropertyType::from_str(&raw.property_type)
        .map_err(|_| invalid(format!("unknown property type {:?}", raw.property_type)))?;

    if raw.monthly_rent == 0 {
        return Err(invalid("monthly rent must be positive".to_string()));
    }
    let counts_valid = raw.bedrooms >= 0.0 && raw.bathrooms >= 0.0;
    if !counts_valid {
        return Err(invalid(format!(
            "bed/bath counts must be non-negative, got {}/{}",
            raw.bedrooms, raw.bathrooms
        )));
    }

    let coordinates = Coordinates::from_parts(raw.latitude, raw.longitude.map(western));
    if coordinates.is_none() {
        log::warn!("Listing {id} has no usable coordinates");
    }

    Ok(RentalUnit {
        id,
        address: raw.address,
        monthly_rent: raw.monthly_rent,
        bedrooms: raw.bedrooms,
        bathrooms: raw.bathrooms,
        property_type,
        availability: raw.availability,
        contact: raw.contact.filter(|c| !c.is_empty()),
        url: raw.url.filter(|u| !u.is_empty()),
        coordinates,
    })
}

/// Moves a longitude into the Western hemisphere. Already-negative values
/// are kept.
fn western(longitude: f64) -> f64 {
    -longitude.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "4600001": {
            "Address": "6200 S Ellis Ave",
            "Monthly Rent": 1100,
            "Property Type": "Apt",
            "Bath": 1.0,
            "Bed": 2.0,
            "Voucher Necessary": "Yes",
            "Availability": "Available Now",
            "Contact": "(773) 555-0100",
            "URL": "https://example.org/listing/4600001",
            "Lat": 41.781,
            "Long": 87.601
        },
        "4545145": {
            "Address": "1 W 79th St",
            "Monthly Rent": 950,
            "Property Type": "4-Plex",
            "Bath": 1.5,
            "Bed": 0,
            "Availability": "06/01/2019",
            "Contact": null,
            "URL": "https://example.org/listing/4545145",
            "Lat": 41.75,
            "Long": -87.64
        }
    }"#;

    #[test]
    fn parses_and_orders_by_id() {
        let units = parse_listings("listings.json", SNAPSHOT).unwrap();
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["4545145", "4600001"]);

        let unit = &units[1];
        assert_eq!(unit.monthly_rent, 1100);
        assert_eq!(unit.property_type, PropertyType::Apartment);
        assert!(unit.is_available_now());
        assert_eq!(unit.contact.as_deref(), Some("(773) 555-0100"));
    }

    #[test]
    fn longitude_is_moved_west() {
        let units = parse_listings("listings.json", SNAPSHOT).unwrap();
        let positive = units[1].coordinates.unwrap();
        let negative = units[0].coordinates.unwrap();
        assert!((positive.longitude - -87.601).abs() < f64::EPSILON);
        assert!((negative.longitude - -87.64).abs() < f64::EPSILON);
    }

    #[test]
    fn efficiency_and_null_contact() {
        let units = parse_listings("listings.json", SNAPSHOT).unwrap();
        let unit = &units[0];
        assert!(unit.bedrooms.abs() < f64::EPSILON);
        assert!(unit.contact.is_none());
        assert_eq!(unit.property_type, PropertyType::FourPlex);
    }

    #[test]
    fn missing_coordinates_are_kept_as_none() {
        let json = r#"{"1": {"Address": "a", "Monthly Rent": 900, "Property Type": "House",
            "Bath": 1, "Bed": 3, "Availability": "Available Now"}}"#;
        let units = parse_listings("listings.json", json).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].coordinates.is_none());
    }

    #[test]
    fn unknown_property_type_names_the_listing() {
        let json = r#"{"77": {"Address": "a", "Monthly Rent": 900, "Property Type": "Condo",
            "Bath": 1, "Bed": 1, "Availability": "Available Now", "Lat": 41.8, "Long": 87.6}}"#;
        match parse_listings("listings.json", json) {
            Err(IngestError::InvalidRecord { record, message, .. }) => {
                assert_eq!(record, "77");
                assert!(message.contains("Condo"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_rent_is_rejected() {
        let json = r#"{"1": {"Address": "a", "Monthly Rent": 0, "Property Type": "House",
            "Bath": 1, "Bed": 3, "Availability": "Available Now"}}"#;
        assert!(matches!(
            parse_listings("listings.json", json),
            Err(IngestError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn not_an_object_is_a_json_error() {
        assert!(matches!(
            parse_listings("listings.json", "[1, 2]"),
            Err(IngestError::Json { .. })
        ));
    }

    #[test]
    fn reads_from_disk() {
        let dir = std::env::temp_dir().join("voucher_map_ingest_listings_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("listings.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let units = read_listings(&path).unwrap();
        assert_eq!(units.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
