//! Hand-reviewed inputs: neighborhood overrides and landlord verification
//! decisions.

use std::collections::BTreeMap;
use std::path::Path;

use voucher_map_geocoder::NeighborhoodOverride;
use voucher_map_landlord::VerificationTable;

use crate::{CsvTable, IngestError, read_to_string};

/// Reads neighborhood overrides (`unit_id`, `neighborhood`, `region_id`).
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read, lacks a column,
/// has an empty value, or lists a unit twice.
pub fn read_overrides(path: &Path) -> Result<BTreeMap<String, NeighborhoodOverride>, IngestError> {
    let contents = read_to_string(path)?;
    let overrides = parse_overrides(&path.display().to_string(), &contents)?;
    log::info!("Read {} neighborhood overrides from {}", overrides.len(), path.display());
    Ok(overrides)
}

/// Parses override contents. `path` is used in error messages.
///
/// # Errors
///
/// See [`read_overrides`].
pub fn parse_overrides(
    path: &str,
    contents: &str,
) -> Result<BTreeMap<String, NeighborhoodOverride>, IngestError> {
    let table = CsvTable::parse(path, contents)?;
    let unit_id = table.column("unit_id")?;
    let neighborhood = table.column("neighborhood")?;
    let region_id = table.column("region_id")?;

    let mut overrides = BTreeMap::new();
    for record in &table.records {
        let field = |idx: usize, name: &str| match record.get(idx) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(table.invalid(record, format!("empty {name}"))),
        };

        let id = field(unit_id, "unit_id")?;
        let fallback = NeighborhoodOverride {
            neighborhood: field(neighborhood, "neighborhood")?,
            region_id: field(region_id, "region_id")?,
        };

        if overrides.insert(id.clone(), fallback).is_some() {
            return Err(table.invalid(record, format!("unit {id} is listed twice")));
        }
    }

    Ok(overrides)
}

/// Reads landlord verification decisions (`unit_id`, `confirmed`).
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read, lacks a column, or a
/// decision is not a recognizable boolean.
pub fn read_verification(path: &Path) -> Result<VerificationTable, IngestError> {
    let contents = read_to_string(path)?;
    let table = parse_verification(&path.display().to_string(), &contents)?;
    log::info!(
        "Read {} landlord verification decisions ({} confirmed) from {}",
        table.len(),
        table.confirmed_ids().count(),
        path.display()
    );
    Ok(table)
}

/// Parses verification contents. `path` is used in error messages.
///
/// # Errors
///
/// See [`read_verification`].
pub fn parse_verification(path: &str, contents: &str) -> Result<VerificationTable, IngestError> {
    let table = CsvTable::parse(path, contents)?;
    let unit_id = table.column("unit_id")?;
    let confirmed = table.column("confirmed")?;

    let mut decisions = VerificationTable::new();
    for record in &table.records {
        let id = record.get(unit_id).unwrap_or_default();
        if id.is_empty() {
            return Err(table.invalid(record, "empty unit_id".to_string()));
        }
        let value = record.get(confirmed).unwrap_or_default();
        let decision = parse_bool(value)
            .ok_or_else(|| table.invalid(record, format!("{value:?} is not true/false")))?;
        decisions.insert(id, decision);
    }

    Ok(decisions)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}
