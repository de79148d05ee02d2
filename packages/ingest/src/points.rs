//! Reference point sets: rapid-transit stations and watch-listed landlord
//! buildings.

use std::path::Path;

use voucher_map_housing_models::{Coordinates, LandlordRecord, TransitStation};

use crate::{CsvTable, IngestError, parse_optional_f64, read_to_string};

/// Parses a station location of the form `"(41.875478, -87.626498)"`.
///
/// Returns `None` if the text is not two comma-separated numbers or the
/// numbers are not a usable location.
#[must_use]
pub fn parse_location(text: &str) -> Option<Coordinates> {
    let inner = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let (lat, lon) = inner.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    Coordinates::new(lat, lon)
}

/// Reads the station list (`STOP_ID`, `Location`).
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or lacks either
/// column.
pub fn read_stations(path: &Path) -> Result<Vec<TransitStation>, IngestError> {
    let contents = read_to_string(path)?;
    let stations = parse_stations(&path.display().to_string(), &contents)?;
    log::info!("Read {} transit stations from {}", stations.len(), path.display());
    Ok(stations)
}

/// Parses station list contents. `path` is used in error messages.
///
/// # Errors
///
/// See [`read_stations`].
pub fn parse_stations(path: &str, contents: &str) -> Result<Vec<TransitStation>, IngestError> {
    let table = CsvTable::parse(path, contents)?;
    let stop_id = table.column("STOP_ID")?;
    let location = table.column("Location")?;

    Ok(table
        .records
        .iter()
        .map(|record| {
            let id = record.get(stop_id).unwrap_or_default().to_string();
            let text = record.get(location).unwrap_or_default();
            let coordinates = parse_location(text);
            if coordinates.is_none() {
                log::warn!("Station {id} has an unreadable location {text:?}");
            }
            TransitStation {
                stop_id: id,
                coordinates,
            }
        })
        .collect())
}

/// Reads the landlord watch list (`ADDRESS`, `LATITUDE`, `LONGITUDE`).
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or lacks a required
/// column.
pub fn read_landlords(path: &Path) -> Result<Vec<LandlordRecord>, IngestError> {
    let contents = read_to_string(path)?;
    let landlords = parse_landlords(&path.display().to_string(), &contents)?;
    log::info!("Read {} watch-listed buildings from {}", landlords.len(), path.display());
    Ok(landlords)
}

/// Parses watch list contents. `path` is used in error messages.
///
/// # Errors
///
/// See [`read_landlords`].
pub fn parse_landlords(path: &str, contents: &str) -> Result<Vec<LandlordRecord>, IngestError> {
    let table = CsvTable::parse(path, contents)?;
    let address = table.column("ADDRESS")?;
    let latitude = table.column("LATITUDE")?;
    let longitude = table.column("LONGITUDE")?;

    Ok(table
        .records
        .iter()
        .map(|record| {
            let address = record.get(address).unwrap_or_default().to_string();
            let number = |idx: usize| {
                parse_optional_f64(record.get(idx).unwrap_or_default()).unwrap_or_else(|e| {
                    log::warn!("Watch-listed building {address:?}: {e}");
                    None
                })
            };
            let coordinates = Coordinates::from_parts(number(latitude), number(longitude));
            LandlordRecord {
                address,
                coordinates,
            }
        })
        .collect())
}
