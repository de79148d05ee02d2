#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for region attribution.
//!
//! Builds an R-tree over a boundary layer and answers point-in-polygon
//! queries. Matching uses *intersects* rather than *contains* so that a
//! point lying exactly on a shared boundary still matches. When several
//! polygons intersect a point the one that appeared first in the source
//! file wins, which keeps lookups deterministic regardless of R-tree
//! traversal order.

use geo::{BoundingRect as _, Intersects as _, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;
use voucher_map_geography_models::{Crs, PolygonRegion, RegionKind};

/// Errors raised while building a [`RegionIndex`].
#[derive(Debug, Error)]
pub enum SpatialError {
    /// A region's reference system differs from the rest of the layer or
    /// from the point data it will be joined with.
    #[error("{kind} region {region_id} is in {found}, expected {expected}")]
    CrsMismatch {
        /// Layer being indexed.
        kind: RegionKind,
        /// Offending region identifier.
        region_id: String,
        /// Reference system the index requires.
        expected: Crs,
        /// Reference system found on the region.
        found: Crs,
    },

    /// A region from a different layer was passed in.
    #[error("Region {region_id} belongs to the {found} layer, not {expected}")]
    WrongLayer {
        /// Offending region identifier.
        region_id: String,
        /// Layer being indexed.
        expected: RegionKind,
        /// Layer the region belongs to.
        found: RegionKind,
    },
}

/// A boundary polygon stored in the R-tree with its metadata.
struct RegionEntry {
    /// Position in the source file; lower wins on overlap.
    order: usize,
    id: String,
    name: Option<String>,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The region a point was attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionMatch<'a> {
    /// Region identifier (GEOID or `RegionID`).
    pub id: &'a str,
    /// Region display name, if the layer has one.
    pub name: Option<&'a str>,
}

/// Pre-built R-tree over one boundary layer.
pub struct RegionIndex {
    kind: RegionKind,
    crs: Crs,
    tree: RTree<RegionEntry>,
}

impl RegionIndex {
    /// Builds an index over `regions`, preserving their order for
    /// overlap tie-breaking.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if any region is not in WGS84 or belongs to
    /// a different layer than `kind`.
    pub fn build(kind: RegionKind, regions: Vec<PolygonRegion>) -> Result<Self, SpatialError> {
        let crs = Crs::Wgs84;
        let mut entries = Vec::with_capacity(regions.len());

        for (order, region) in regions.into_iter().enumerate() {
            if region.kind != kind {
                return Err(SpatialError::WrongLayer {
                    region_id: region.id,
                    expected: kind,
                    found: region.kind,
                });
            }
            if region.crs != crs {
                return Err(SpatialError::CrsMismatch {
                    kind,
                    region_id: region.id,
                    expected: crs,
                    found: region.crs,
                });
            }

            let envelope = compute_envelope(&region.boundary);
            entries.push(RegionEntry {
                order,
                id: region.id,
                name: region.name,
                envelope,
                polygon: region.boundary,
            });
        }

        let tree = RTree::bulk_load(entries);
        log::debug!("Indexed {} {kind} regions", tree.size());

        Ok(Self { kind, crs, tree })
    }

    /// Layer this index covers.
    #[must_use]
    pub const fn kind(&self) -> RegionKind {
        self.kind
    }

    /// Reference system of every indexed polygon.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of indexed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Looks up the region intersecting a WGS84 point.
    ///
    /// Overlapping polygons resolve to the one loaded first.
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64) -> Option<RegionMatch<'_>> {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&point))
            .min_by_key(|entry| entry.order)
            .map(|entry| RegionMatch {
                id: &entry.id,
                name: entry.name.as_deref(),
            })
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use geo::{Polygon, polygon};

    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]
    }

    fn region(kind: RegionKind, id: &str, poly: Polygon<f64>) -> PolygonRegion {
        PolygonRegion {
            kind,
            id: id.to_string(),
            name: Some(format!("{id} name")),
            crs: Crs::Wgs84,
            boundary: MultiPolygon(vec![poly]),
        }
    }

    #[test]
    fn finds_containing_region() {
        let index = RegionIndex::build(
            RegionKind::BlockGroup,
            vec![
                region(RegionKind::BlockGroup, "a", square(-87.70, 41.90, 0.01)),
                region(RegionKind::BlockGroup, "b", square(-87.69, 41.90, 0.01)),
            ],
        )
        .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(-87.695, 41.905).unwrap().id, "a");
        assert_eq!(index.lookup(-87.685, 41.905).unwrap().id, "b");
        assert!(index.lookup(-87.5, 41.905).is_none());
    }

    #[test]
    fn boundary_point_matches() {
        let index = RegionIndex::build(
            RegionKind::Neighborhood,
            vec![region(
                RegionKind::Neighborhood,
                "edge",
                square(-87.70, 41.90, 0.01),
            )],
        )
        .unwrap();

        let hit = index.lookup(-87.70, 41.905).unwrap();
        assert_eq!(hit.id, "edge");
        assert_eq!(hit.name, Some("edge name"));
        assert!(index.lookup(-87.70, 41.90).is_some());
    }

    #[test]
    fn overlap_resolves_to_first_loaded() {
        let regions = vec![
            region(RegionKind::Neighborhood, "second_id_first", square(-87.70, 41.90, 0.02)),
            region(RegionKind::Neighborhood, "aaa", square(-87.695, 41.905, 0.02)),
        ];
        let index = RegionIndex::build(RegionKind::Neighborhood, regions).unwrap();
        assert_eq!(index.lookup(-87.69, 41.91).unwrap().id, "second_id_first");
    }

    #[test]
    fn shared_edge_resolves_to_first_loaded() {
        let regions = vec![
            region(RegionKind::BlockGroup, "west", rect(-87.70, 41.90, -87.69, 41.91)),
            region(RegionKind::BlockGroup, "east", rect(-87.69, 41.90, -87.68, 41.91)),
        ];
        let index = RegionIndex::build(RegionKind::BlockGroup, regions).unwrap();
        assert_eq!(index.lookup(-87.69, 41.905).unwrap().id, "west");
    }

    #[test]
    fn rejects_region_from_other_layer() {
        let result = RegionIndex::build(
            RegionKind::BlockGroup,
            vec![region(RegionKind::Neighborhood, "x", square(-87.7, 41.9, 0.01))],
        );
        assert!(matches!(result, Err(SpatialError::WrongLayer { .. })));
    }

    #[test]
    fn empty_index_never_matches() {
        let index = RegionIndex::build(RegionKind::BlockGroup, Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.lookup(-87.6, 41.9).is_none());
    }
}
