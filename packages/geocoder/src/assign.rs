//! Spatial join of rental units against the block group and neighborhood
//! layers.

use voucher_map_geography_models::RegionKind;
use voucher_map_housing_models::RentalUnit;
use voucher_map_spatial::RegionIndex;

use crate::{GeocodeError, GeocodeRules};

/// How a unit's neighborhood was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborhoodSource {
    /// The unit's point intersects the neighborhood polygon.
    Matched,
    /// The spatial join failed and a manual override supplied the values.
    Override,
}

/// A unit with its region assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedUnit {
    /// The unit, with any coordinate correction already applied.
    pub unit: RentalUnit,
    /// Block group GEOID; `None` if no block group intersects the point.
    pub geoid: Option<String>,
    /// Neighborhood name.
    pub neighborhood: String,
    /// Neighborhood region id.
    pub region_id: String,
    /// Whether the neighborhood came from the join or an override.
    pub neighborhood_source: NeighborhoodSource,
}

/// Data-quality counts from a geocoding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeocodeReport {
    /// Units received.
    pub input: usize,
    /// Units removed by the exclusion list.
    pub excluded: Vec<String>,
    /// Units whose coordinates were corrected before the join.
    pub corrected: Vec<String>,
    /// Units with no usable coordinates after corrections.
    pub missing_coordinates: Vec<String>,
    /// Retained units that fell outside every block group.
    pub block_group_misses: usize,
    /// Units assigned a neighborhood by an override.
    pub overridden: Vec<String>,
    /// Units dropped because no neighborhood matched and no override
    /// existed.
    pub dropped: Vec<String>,
}

/// Output of [`assign_regions`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedUnits {
    /// Retained units, ordered by unit id.
    pub units: Vec<GeocodedUnit>,
    /// What happened to the rest.
    pub report: GeocodeReport,
}

/// Assigns each unit a block group and a neighborhood.
///
/// # Errors
///
/// Returns [`GeocodeError::WrongLayer`] if the two indexes are swapped or
/// cover the wrong layer.
pub fn assign_regions(
    units: Vec<RentalUnit>,
    block_groups: &RegionIndex,
    neighborhoods: &RegionIndex,
    rules: &GeocodeRules,
) -> Result<GeocodedUnits, GeocodeError> {
    expect_layer(block_groups, RegionKind::BlockGroup)?;
    expect_layer(neighborhoods, RegionKind::Neighborhood)?;

    let mut report = GeocodeReport {
        input: units.len(),
        ..GeocodeReport::default()
    };

    let mut units = units;
    units.sort_by(|a, b| a.id.cmp(&b.id));

    let mut geocoded = Vec::with_capacity(units.len());

    for mut unit in units {
        if rules.exclusions.contains(&unit.id) {
            log::debug!("Excluding unit {} (known bad geocode)", unit.id);
            report.excluded.push(unit.id);
            continue;
        }

        if let Some(corrected) = rules.corrections.get(&unit.id) {
            log::debug!(
                "Correcting unit {} location to ({}, {})",
                unit.id,
                corrected.latitude,
                corrected.longitude
            );
            unit.coordinates = Some(*corrected);
            report.corrected.push(unit.id.clone());
        }

        let (geoid, neighborhood) = match unit.coordinates {
            Some(coords) => (
                block_groups
                    .lookup(coords.longitude, coords.latitude)
                    .map(|m| m.id.to_string()),
                neighborhoods
                    .lookup(coords.longitude, coords.latitude)
                    .map(|m| (m.name.unwrap_or(m.id).to_string(), m.id.to_string())),
            ),
            None => {
                report.missing_coordinates.push(unit.id.clone());
                (None, None)
            }
        };

        let (neighborhood, region_id, neighborhood_source) = match neighborhood {
            Some((name, region_id)) => (name, region_id, NeighborhoodSource::Matched),
            None => {
                let Some(fallback) = rules.overrides.get(&unit.id) else {
                    report.dropped.push(unit.id);
                    continue;
                };
                report.overridden.push(unit.id.clone());
                (
                    fallback.neighborhood.clone(),
                    fallback.region_id.clone(),
                    NeighborhoodSource::Override,
                )
            }
        };

        if geoid.is_none() {
            report.block_group_misses += 1;
        }

        geocoded.push(GeocodedUnit {
            unit,
            geoid,
            neighborhood,
            region_id,
            neighborhood_source,
        });
    }

    warn_unused_rules(rules, &report, &geocoded);

    log::info!(
        "Geocoded {} of {} units ({} excluded, {} corrected, {} overridden, {} dropped, {} outside block groups)",
        geocoded.len(),
        report.input,
        report.excluded.len(),
        report.corrected.len(),
        report.overridden.len(),
        report.dropped.len(),
        report.block_group_misses
    );
    if !report.dropped.is_empty() {
        log::warn!(
            "Dropped units with no neighborhood match: {}",
            report.dropped.join(", ")
        );
    }

    Ok(GeocodedUnits {
        units: geocoded,
        report,
    })
}

fn expect_layer(index: &RegionIndex, expected: RegionKind) -> Result<(), GeocodeError> {
    if index.kind() == expected {
        Ok(())
    } else {
        Err(GeocodeError::WrongLayer {
            expected,
            found: index.kind(),
        })
    }
}

/// Logs rules that name units absent from the input, which usually means
/// the rules were written for a different listing snapshot.
fn warn_unused_rules(rules: &GeocodeRules, report: &GeocodeReport, geocoded: &[GeocodedUnit]) {
    let seen = |id: &String| {
        report.excluded.contains(id)
            || report.dropped.contains(id)
            || geocoded.iter().any(|g| &g.unit.id == id)
    };

    for id in rules.corrections.keys().filter(|id| !seen(id)) {
        log::warn!("Coordinate correction for unknown unit {id}");
    }
    for id in rules.exclusions.iter().filter(|id| !seen(id)) {
        log::warn!("Exclusion for unknown unit {id}");
    }
}
