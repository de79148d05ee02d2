//! `GeoJSON` boundary layer parsing.
//!
//! Features are kept in file order. The geocoder's first-match-wins rule
//! for overlapping polygons depends on this order, so it must never be
//! changed by the loader.

use std::path::Path;

use geo::{CoordsIter as _, MultiPolygon};
use geojson::{FeatureCollection, GeoJson, JsonObject};
use voucher_map_geography_models::{BoundaryFieldMapping, Crs, PolygonRegion, RegionKind};

use crate::GeometryLoadError;

/// Reads and parses a boundary layer from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`GeometryLoadError`] if the file cannot be read, is not a
/// `FeatureCollection`, declares or implies a non-WGS84 reference system,
/// or has a feature without the configured identifier.
pub fn load_boundaries(
    path: &Path,
    kind: RegionKind,
    fields: &BoundaryFieldMapping,
) -> Result<Vec<PolygonRegion>, GeometryLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| GeometryLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let regions = parse_boundaries(path, &contents, kind, fields)?;
    log::info!(
        "Loaded {} {kind} polygons from {}",
        regions.len(),
        path.display()
    );
    Ok(regions)
}

/// Parses a boundary layer from `GeoJSON` text. `path` is only used for
/// error reporting.
///
/// # Errors
///
/// See [`load_boundaries`].
pub fn parse_boundaries(
    path: &Path,
    contents: &str,
    kind: RegionKind,
    fields: &BoundaryFieldMapping,
) -> Result<Vec<PolygonRegion>, GeometryLoadError> {
    let geojson: GeoJson = contents.parse().map_err(|e| GeometryLoadError::Parse {
        path: path.to_path_buf(),
        message: format!("{e}"),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeometryLoadError::Parse {
            path: path.to_path_buf(),
            message: "expected a FeatureCollection".to_string(),
        });
    };

    let crs = declared_crs(path, &collection)?;

    let mut regions = Vec::with_capacity(collection.features.len());
    for (feature_index, feature) in collection.features.into_iter().enumerate() {
        let props = feature.properties.as_ref();

        let id = props
            .and_then(|p| property_string(p, &fields.id))
            .ok_or_else(|| GeometryLoadError::MissingField {
                path: path.to_path_buf(),
                feature_index,
                field: fields.id.clone(),
            })?;

        let name = fields
            .name
            .as_ref()
            .and_then(|field| props.and_then(|p| property_string(p, field)));

        let Some(geometry) = feature.geometry else {
            log::warn!(
                "Skipping {kind} {id} in {}: feature has no geometry",
                path.display()
            );
            continue;
        };

        let geometry_type = value_name(&geometry.value);
        if !matches!(
            geometry.value,
            geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_)
        ) {
            return Err(unsupported(path, feature_index, geometry_type));
        }

        let geom: geo::Geometry<f64> =
            geometry
                .try_into()
                .map_err(|e: geojson::Error| GeometryLoadError::Parse {
                    path: path.to_path_buf(),
                    message: format!("feature {feature_index} ({id}): {e}"),
                })?;
        let boundary = match geom {
            geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
            geo::Geometry::MultiPolygon(mp) => mp,
            _ => return Err(unsupported(path, feature_index, geometry_type)),
        };

        ensure_geographic(path, &id, &boundary)?;

        regions.push(PolygonRegion {
            kind,
            id,
            name,
            crs,
            boundary,
        });
    }

    if regions.is_empty() {
        return Err(GeometryLoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(regions)
}

/// Resolves the layer's reference system from the legacy `crs` member.
///
/// RFC 7946 files carry no `crs` member and are WGS84 by definition.
fn declared_crs(path: &Path, collection: &FeatureCollection) -> Result<Crs, GeometryLoadError> {
    let Some(crs) = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
    else {
        return Ok(Crs::Wgs84);
    };

    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(serde_json::Value::as_str);

    match name {
        Some(name) => Crs::from_name(name).ok_or_else(|| GeometryLoadError::CrsMismatch {
            path: path.to_path_buf(),
            expected: Crs::Wgs84,
            found: name.to_string(),
        }),
        None => Err(GeometryLoadError::CrsMismatch {
            path: path.to_path_buf(),
            expected: Crs::Wgs84,
            found: crs.to_string(),
        }),
    }
}

/// Rejects layers whose vertices cannot be longitude/latitude. This catches
/// projected layers (state plane feet, UTM meters) exported without a
/// `crs` member.
fn ensure_geographic(
    path: &Path,
    id: &str,
    boundary: &MultiPolygon<f64>,
) -> Result<(), GeometryLoadError> {
    if let Some(coord) = boundary
        .coords_iter()
        .find(|c| !(-180.0..=180.0).contains(&c.x) || !(-90.0..=90.0).contains(&c.y))
    {
        return Err(GeometryLoadError::CrsMismatch {
            path: path.to_path_buf(),
            expected: Crs::Wgs84,
            found: format!("region {id} has vertex ({}, {})", coord.x, coord.y),
        });
    }
    Ok(())
}

/// Reads a property as a string. Numeric identifiers (common in shapefile
/// conversions) are rendered without a trailing `.0`.
#[allow(clippy::cast_possible_truncation)]
fn property_string(props: &JsonObject, field: &str) -> Option<String> {
    match props.get(field)? {
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

fn unsupported(path: &Path, feature_index: usize, geometry_type: &str) -> GeometryLoadError {
    GeometryLoadError::UnsupportedGeometry {
        path: path.to_path_buf(),
        feature_index,
        geometry_type: geometry_type.to_string(),
    }
}

const fn value_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
