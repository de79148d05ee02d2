//! Chunked all-pairs distance reductions.

use std::collections::BTreeMap;
use std::sync::Arc;

use voucher_map_housing_models::Coordinates;

use crate::distance::{DistanceFn, Haversine, ReferenceBatch};
use crate::progress::{ProgressCallback, null_progress};
use crate::{Located, MissingCoordinateError, PointSide, ProximityError};

/// Transit radius bands in miles. Counts are cumulative: a station inside
/// the smallest band counts toward every band.
pub const TRANSIT_RADII_MI: [f64; 4] = [0.25, 0.5, 0.75, 1.0];

/// Default landlord match threshold in miles (about 24 meters).
///
/// Tight enough to separate adjacent buildings on a typical Chicago block.
pub const DEFAULT_LANDLORD_THRESHOLD_MI: f64 = 0.015;

/// Default number of subjects per distance-matrix chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Radius-band counts for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectCounts {
    /// Subject key.
    pub subject_id: String,
    /// Number of references within each radius, parallel to
    /// [`PerSubjectCounts::radii`].
    pub counts: Vec<u32>,
}

/// Output of [`ProximityEngine::nearest_within`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerSubjectCounts {
    /// Radii in miles, ascending.
    pub radii: Vec<f64>,
    /// One row per scored subject, in input order. Subjects with no
    /// reference in range have all-zero counts.
    pub rows: Vec<SubjectCounts>,
    /// Records that could not be scored.
    pub excluded: Vec<MissingCoordinateError>,
}

impl PerSubjectCounts {
    /// Counts keyed by subject id.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, Vec<u32>> {
        self.rows
            .into_iter()
            .map(|row| (row.subject_id, row.counts))
            .collect()
    }
}

/// A subject/reference pair within the match threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Subject key (unit id).
    pub subject_id: String,
    /// Reference key (landlord address).
    pub reference_id: String,
    /// Great-circle distance in miles.
    pub distance_mi: f64,
}

/// Output of [`ProximityEngine::flag_within`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerSubjectFlags {
    /// Threshold in miles that produced the candidates.
    pub threshold_mi: f64,
    /// Every scored subject, in input order.
    pub subjects: Vec<String>,
    /// Candidate pairs, ordered by subject input order then reference
    /// input order. A subject may appear zero, one or many times.
    pub candidates: Vec<Candidate>,
    /// Records that could not be scored.
    pub excluded: Vec<MissingCoordinateError>,
}

impl PerSubjectFlags {
    /// Whether `subject_id` has at least one candidate.
    #[must_use]
    pub fn is_flagged(&self, subject_id: &str) -> bool {
        self.candidates.iter().any(|c| c.subject_id == subject_id)
    }

    /// Candidates for one subject.
    pub fn candidates_for<'a>(&'a self, subject_id: &'a str) -> impl Iterator<Item = &'a Candidate> {
        self.candidates
            .iter()
            .filter(move |c| c.subject_id == subject_id)
    }

    /// Candidates grouped by subject id, each group in reference input
    /// order. Subjects without candidates are absent.
    #[must_use]
    pub fn by_subject(&self) -> BTreeMap<&str, Vec<&Candidate>> {
        let mut groups: BTreeMap<&str, Vec<&Candidate>> = BTreeMap::new();
        for candidate in &self.candidates {
            groups
                .entry(candidate.subject_id.as_str())
                .or_default()
                .push(candidate);
        }
        groups
    }
}

/// Scores subjects against reference points with a pluggable distance
/// function.
pub struct ProximityEngine<D = Haversine> {
    distance_fn: D,
    chunk_size: usize,
    progress: Arc<dyn ProgressCallback>,
}

impl Default for ProximityEngine<Haversine> {
    fn default() -> Self {
        Self::new(Haversine)
    }
}

impl<D: DistanceFn> ProximityEngine<D> {
    /// Creates an engine with the default chunk size and no progress
    /// reporting.
    #[must_use]
    pub fn new(distance_fn: D) -> Self {
        Self {
            distance_fn,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: null_progress(),
        }
    }

    /// Sets the number of subjects whose distance rows are materialized at
    /// once. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Reports per-chunk progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Counts, for every subject, the references within each radius
    /// (inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`ProximityError::InvalidRadii`] if `radii` is empty, not
    /// strictly increasing, or contains a non-finite or non-positive value.
    pub fn nearest_within<S: Located, R: Located>(
        &self,
        subjects: &[S],
        references: &[R],
        radii: &[f64],
    ) -> Result<PerSubjectCounts, ProximityError> {
        validate_radii(radii)?;

        let (subject_points, mut excluded) = partition(subjects, PointSide::Subject);
        let (reference_points, reference_excluded) = partition(references, PointSide::Reference);
        excluded.extend(reference_excluded);

        let batch = ReferenceBatch::new(reference_points.iter().map(|(_, c)| *c).collect());

        let mut rows = Vec::with_capacity(subject_points.len());
        let label = format!("Counting references within {} mi", radii[radii.len() - 1]);
        self.for_each_row(&subject_points, &batch, label, |subject_id, distances| {
            let mut counts = vec![0u32; radii.len()];
            for &d in distances {
                // Radii ascend, so the first band containing `d` and every
                // larger band get the station.
                if let Some(first) = radii.iter().position(|&r| d <= r) {
                    for count in &mut counts[first..] {
                        *count += 1;
                    }
                }
            }
            rows.push(SubjectCounts {
                subject_id: subject_id.to_string(),
                counts,
            });
        });

        log::debug!(
            "Scored {} subjects against {} references ({} excluded)",
            rows.len(),
            batch.len(),
            excluded.len()
        );

        Ok(PerSubjectCounts {
            radii: radii.to_vec(),
            rows,
            excluded,
        })
    }

    /// Lists every subject/reference pair at or under `threshold_mi`.
    ///
    /// # Errors
    ///
    /// Returns [`ProximityError::InvalidThreshold`] if `threshold_mi` is
    /// negative or not finite.
    pub fn flag_within<S: Located, R: Located>(
        &self,
        subjects: &[S],
        references: &[R],
        threshold_mi: f64,
    ) -> Result<PerSubjectFlags, ProximityError> {
        if !threshold_mi.is_finite() || threshold_mi < 0.0 {
            return Err(ProximityError::InvalidThreshold {
                threshold: threshold_mi,
            });
        }

        let (subject_points, mut excluded) = partition(subjects, PointSide::Subject);
        let (reference_points, reference_excluded) = partition(references, PointSide::Reference);
        excluded.extend(reference_excluded);

        let batch = ReferenceBatch::new(reference_points.iter().map(|(_, c)| *c).collect());

        let mut candidates = Vec::new();
        let label = format!("Matching references within {threshold_mi} mi");
        self.for_each_row(&subject_points, &batch, label, |subject_id, distances| {
            for (&(reference_id, _), &distance_mi) in reference_points.iter().zip(distances) {
                if distance_mi <= threshold_mi {
                    candidates.push(Candidate {
                        subject_id: subject_id.to_string(),
                        reference_id: reference_id.to_string(),
                        distance_mi,
                    });
                }
            }
        });

        log::debug!(
            "Found {} candidate pairs within {threshold_mi} mi",
            candidates.len()
        );

        Ok(PerSubjectFlags {
            threshold_mi,
            subjects: subject_points
                .iter()
                .map(|(id, _)| (*id).to_string())
                .collect(),
            candidates,
            excluded,
        })
    }

    /// Materializes the distance matrix one chunk of subjects at a time and
    /// hands each subject's row to `reduce` in subject order. `label` names
    /// the stage on the progress indicator.
    fn for_each_row(
        &self,
        subjects: &[(&str, Coordinates)],
        batch: &ReferenceBatch,
        label: String,
        mut reduce: impl FnMut(&str, &[f64]),
    ) {
        self.progress.set_total(subjects.len() as u64);
        self.progress.set_message(label);

        let width = batch.len();
        if width == 0 {
            for (subject_id, _) in subjects {
                reduce(subject_id, &[]);
            }
            self.progress.inc(subjects.len() as u64);
            self.progress.finish(format!("Scored {} subjects", subjects.len()));
            return;
        }

        let mut matrix = vec![0.0; self.chunk_size.min(subjects.len()) * width];

        for chunk in subjects.chunks(self.chunk_size) {
            let block = &mut matrix[..chunk.len() * width];

            for ((_, coords), row) in chunk.iter().zip(block.chunks_mut(width)) {
                self.distance_fn.distances_to(*coords, batch, row);
            }
            for ((subject_id, _), row) in chunk.iter().zip(block.chunks(width)) {
                reduce(subject_id, row);
            }

            self.progress.inc(chunk.len() as u64);
        }

        self.progress.finish(format!("Scored {} subjects", subjects.len()));
    }
}

/// [`ProximityEngine::nearest_within`] with default engine settings.
///
/// # Errors
///
/// See [`ProximityEngine::nearest_within`].
pub fn nearest_within<S: Located, R: Located, D: DistanceFn>(
    subjects: &[S],
    references: &[R],
    radii: &[f64],
    distance_fn: D,
) -> Result<PerSubjectCounts, ProximityError> {
    ProximityEngine::new(distance_fn).nearest_within(subjects, references, radii)
}

/// [`ProximityEngine::flag_within`] with default engine settings.
///
/// # Errors
///
/// See [`ProximityEngine::flag_within`].
pub fn flag_within<S: Located, R: Located, D: DistanceFn>(
    subjects: &[S],
    references: &[R],
    threshold_mi: f64,
    distance_fn: D,
) -> Result<PerSubjectFlags, ProximityError> {
    ProximityEngine::new(distance_fn).flag_within(subjects, references, threshold_mi)
}

fn validate_radii(radii: &[f64]) -> Result<(), ProximityError> {
    let valid = !radii.is_empty()
        && radii.iter().all(|r| r.is_finite() && *r > 0.0)
        && radii.windows(2).all(|w| w[0] < w[1]);
    if valid {
        Ok(())
    } else {
        Err(ProximityError::InvalidRadii {
            radii: radii.to_vec(),
        })
    }
}

/// Splits records into scorable points and coordinate-less exclusions.
fn partition<T: Located>(
    items: &[T],
    side: PointSide,
) -> (Vec<(&str, Coordinates)>, Vec<MissingCoordinateError>) {
    let mut points = Vec::with_capacity(items.len());
    let mut excluded = Vec::new();

    for item in items {
        match item.coordinates() {
            Some(coords) => points.push((item.key(), coords)),
            None => {
                log::debug!("Excluding {side} {} with no coordinates", item.key());
                excluded.push(MissingCoordinateError {
                    side,
                    id: item.key().to_string(),
                });
            }
        }
    }

    if !excluded.is_empty() {
        log::warn!(
            "Excluded {} {side} records with missing coordinates",
            excluded.len()
        );
    }

    (points, excluded)
}

#[cfg(test)]
mod tests {
    use voucher_map_housing_models::{LandlordRecord, PropertyType, RentalUnit, TransitStation};

    use super::*;

    fn unit(id: &str, lat: f64, lon: f64) -> RentalUnit {
        RentalUnit {
            id: id.to_string(),
            address: format!("{id} Main St"),
            monthly_rent: 1000,
            bedrooms: 2.0,
            bathrooms: 1.0,
            property_type: PropertyType::Apartment,
            availability: "Available Now".to_string(),
            contact: None,
            url: None,
            coordinates: Coordinates::new(lat, lon),
        }
    }

    fn station(id: &str, lat: f64, lon: f64) -> TransitStation {
        TransitStation {
            stop_id: id.to_string(),
            coordinates: Coordinates::new(lat, lon),
        }
    }

    fn landlord(address: &str, lat: f64, lon: f64) -> LandlordRecord {
        LandlordRecord {
            address: address.to_string(),
            coordinates: Coordinates::new(lat, lon),
        }
    }

    /// Returns a scripted distance per reference, selected by encoding the
    /// reference index in its longitude as `-(index + 1)`.
    struct Scripted(Vec<f64>);

    impl DistanceFn for Scripted {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        fn distance(&self, _a: Coordinates, b: Coordinates) -> f64 {
            let index = (-b.longitude - 1.0).round() as usize;
            self.0[index]
        }
    }

    /// Deterministic pseudo-random sequence in `[0, 1)`.
    fn lcg(seed: &mut u64) -> f64 {
        *seed = seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        #[allow(clippy::cast_precision_loss)]
        let value = (*seed >> 11) as f64 / (1u64 << 53) as f64;
        value
    }

    fn scattered_units(n: usize, seed: &mut u64) -> Vec<RentalUnit> {
        (0..n)
            .map(|i| {
                unit(
                    &format!("u{i:04}"),
                    41.75 + lcg(seed) * 0.2,
                    -87.75 + lcg(seed) * 0.15,
                )
            })
            .collect()
    }

    fn scattered_stations(n: usize, seed: &mut u64) -> Vec<TransitStation> {
        (0..n)
            .map(|i| {
                station(
                    &format!("s{i:03}"),
                    41.75 + lcg(seed) * 0.2,
                    -87.75 + lcg(seed) * 0.15,
                )
            })
            .collect()
    }

    #[test]
    fn station_a_third_mile_away_skips_quarter_band() {
        let units = vec![unit("U1", 41.9, -87.6)];
        let stations = vec![station("S1", 41.905, -87.6)];

        let result = nearest_within(&units, &stations, &TRANSIT_RADII_MI, Haversine).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].subject_id, "U1");
        assert_eq!(result.rows[0].counts, vec![0, 1, 1, 1]);
    }

    #[test]
    fn radius_counts_are_monotonic() {
        let mut seed = 7;
        let units = scattered_units(200, &mut seed);
        let stations = scattered_stations(60, &mut seed);

        let result = nearest_within(&units, &stations, &TRANSIT_RADII_MI, Haversine).unwrap();

        assert_eq!(result.rows.len(), units.len());
        for row in &result.rows {
            assert!(
                row.counts.windows(2).all(|w| w[0] <= w[1]),
                "{} has non-monotonic counts {:?}",
                row.subject_id,
                row.counts
            );
        }
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let units = vec![unit("U1", 41.9, -87.6)];
        let stations = vec![
            station("on_quarter", 41.9, -1.0),
            station("just_past_quarter", 41.9, -2.0),
            station("on_mile", 41.9, -3.0),
            station("past_mile", 41.9, -4.0),
        ];
        let distances = Scripted(vec![0.25, 0.25 + 1e-9, 1.0, 1.0 + 1e-9]);

        let result = nearest_within(&units, &stations, &TRANSIT_RADII_MI, &distances).unwrap();

        assert_eq!(result.rows[0].counts, vec![1, 2, 2, 3]);
    }

    #[test]
    fn chunking_does_not_change_results() {
        let mut seed = 42;
        let units = scattered_units(97, &mut seed);
        let stations = scattered_stations(31, &mut seed);

        let whole = ProximityEngine::new(Haversine)
            .nearest_within(&units, &stations, &TRANSIT_RADII_MI)
            .unwrap();

        for chunk_size in [1, 3, 10, 96, 97, 1000] {
            let chunked = ProximityEngine::new(Haversine)
                .with_chunk_size(chunk_size)
                .nearest_within(&units, &stations, &TRANSIT_RADII_MI)
                .unwrap();
            assert_eq!(chunked, whole, "chunk size {chunk_size}");
        }

        let landlords: Vec<LandlordRecord> = units
            .iter()
            .step_by(5)
            .filter_map(|u| u.coordinates)
            .enumerate()
            .map(|(i, c)| landlord(&format!("{i} Watch St"), c.latitude, c.longitude))
            .collect();
        let whole = ProximityEngine::new(Haversine)
            .flag_within(&units, &landlords, 0.5)
            .unwrap();
        let chunked = ProximityEngine::new(Haversine)
            .with_chunk_size(4)
            .flag_within(&units, &landlords, 0.5)
            .unwrap();
        assert_eq!(chunked, whole);
    }

    #[test]
    fn empty_reference_set_gives_zero_counts() {
        let units = vec![unit("U1", 41.9, -87.6), unit("U2", 41.8, -87.7)];
        let stations: Vec<TransitStation> = Vec::new();

        let result = nearest_within(&units, &stations, &TRANSIT_RADII_MI, Haversine).unwrap();

        assert_eq!(result.rows.len(), 2);
        assert!(result.rows.iter().all(|r| r.counts == vec![0, 0, 0, 0]));
        assert!(result.excluded.is_empty());
    }

    #[test]
    fn far_subject_still_gets_a_row() {
        let units = vec![unit("far", 42.5, -88.5)];
        let stations = vec![station("S1", 41.9, -87.6)];

        let result = nearest_within(&units, &stations, &TRANSIT_RADII_MI, Haversine).unwrap();

        assert_eq!(result.rows[0].counts, vec![0, 0, 0, 0]);
    }

    #[test]
    fn missing_coordinates_are_excluded_and_reported() {
        let mut no_coords = unit("U2", 41.9, -87.6);
        no_coords.coordinates = None;
        let units = vec![unit("U1", 41.9, -87.6), no_coords];
        let stations = vec![
            station("S1", 41.905, -87.6),
            TransitStation {
                stop_id: "S_bad".to_string(),
                coordinates: None,
            },
        ];

        let result = nearest_within(&units, &stations, &TRANSIT_RADII_MI, Haversine).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].subject_id, "U1");
        assert_eq!(
            result.excluded,
            vec![
                MissingCoordinateError {
                    side: PointSide::Subject,
                    id: "U2".to_string()
                },
                MissingCoordinateError {
                    side: PointSide::Reference,
                    id: "S_bad".to_string()
                },
            ]
        );
    }

    #[test]
    fn rejects_unsorted_radii() {
        let units = vec![unit("U1", 41.9, -87.6)];
        let stations = vec![station("S1", 41.905, -87.6)];
        for radii in [&[0.5, 0.25][..], &[][..], &[0.0, 1.0][..], &[f64::NAN][..]] {
            assert!(matches!(
                nearest_within(&units, &stations, radii, Haversine),
                Err(ProximityError::InvalidRadii { .. })
            ));
        }
    }

    #[test]
    fn colocated_landlord_is_a_candidate() {
        let units = vec![unit("U2", 41.85, -87.65), unit("U3", 41.95, -87.65)];
        let landlords = vec![landlord("123 W Example St", 41.85, -87.65)];

        let flags = flag_within(&units, &landlords, DEFAULT_LANDLORD_THRESHOLD_MI, Haversine)
            .unwrap();

        assert!(flags.is_flagged("U2"));
        assert!(!flags.is_flagged("U3"));
        assert_eq!(flags.subjects, vec!["U2".to_string(), "U3".to_string()]);
        let matched: Vec<&Candidate> = flags.candidates_for("U2").collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].reference_id, "123 W Example St");
        assert!(matched[0].distance_mi.abs() < f64::EPSILON);
    }

    #[test]
    fn subject_can_match_several_landlords() {
        let units = vec![unit("U1", 41.9, -87.6)];
        let landlords = vec![
            landlord("A", 41.9, -1.0),
            landlord("B", 41.9, -2.0),
            landlord("C", 41.9, -3.0),
        ];
        let distances = Scripted(vec![0.01, 0.015, 0.016]);

        let flags = flag_within(&units, &landlords, DEFAULT_LANDLORD_THRESHOLD_MI, &distances)
            .unwrap();

        let matched: Vec<&str> = flags
            .candidates_for("U1")
            .map(|c| c.reference_id.as_str())
            .collect();
        assert_eq!(matched, vec!["A", "B"]);
    }

    #[test]
    fn empty_landlord_list_flags_nothing() {
        let units = vec![unit("U1", 41.9, -87.6)];
        let landlords: Vec<LandlordRecord> = Vec::new();

        let flags = flag_within(&units, &landlords, DEFAULT_LANDLORD_THRESHOLD_MI, Haversine)
            .unwrap();

        assert!(flags.candidates.is_empty());
        assert_eq!(flags.subjects.len(), 1);
    }

    #[derive(Default)]
    struct Recorder {
        events: std::sync::Mutex<Vec<String>>,
    }

    impl ProgressCallback for Recorder {
        fn set_total(&self, total: u64) {
            self.events.lock().unwrap().push(format!("total {total}"));
        }
        fn inc(&self, delta: u64) {
            self.events.lock().unwrap().push(format!("inc {delta}"));
        }
        fn set_message(&self, msg: String) {
            self.events.lock().unwrap().push(format!("message {msg}"));
        }
        fn finish(&self, msg: String) {
            self.events.lock().unwrap().push(format!("finish {msg}"));
        }
    }

    #[test]
    fn progress_names_each_stage() {
        let recorder = Arc::new(Recorder::default());
        let engine = ProximityEngine::new(Haversine)
            .with_chunk_size(2)
            .with_progress(recorder.clone());
        let units = vec![
            unit("U1", 41.9, -87.6),
            unit("U2", 41.91, -87.6),
            unit("U3", 41.92, -87.6),
        ];

        engine
            .nearest_within(&units, &[station("S", 41.9, -87.6)], &TRANSIT_RADII_MI)
            .unwrap();
        engine
            .flag_within(&units, &[landlord("A", 41.9, -87.6)], 0.015)
            .unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            [
                "total 3",
                "message Counting references within 1 mi",
                "inc 2",
                "inc 1",
                "finish Scored 3 subjects",
                "total 3",
                "message Matching references within 0.015 mi",
                "inc 2",
                "inc 1",
                "finish Scored 3 subjects",
            ]
        );
    }

    #[test]
    fn candidates_group_by_subject() {
        let units = vec![unit("U1", 41.9, -87.6), unit("U2", 41.9, -87.6), unit("U3", 42.5, -87.6)];
        let landlords = vec![landlord("B", 41.9, -87.6), landlord("A", 41.9, -87.6)];

        let flags = flag_within(&units, &landlords, DEFAULT_LANDLORD_THRESHOLD_MI, Haversine)
            .unwrap();
        let groups = flags.by_subject();

        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["U1", "U2"]);
        let u1: Vec<&str> = groups["U1"].iter().map(|c| c.reference_id.as_str()).collect();
        assert_eq!(u1, vec!["B", "A"]);
        assert!(!groups.contains_key("U3"));
    }

    #[test]
    fn rejects_negative_threshold() {
        let units = vec![unit("U1", 41.9, -87.6)];
        let landlords = vec![landlord("A", 41.9, -87.6)];
        assert!(matches!(
            flag_within(&units, &landlords, -0.1, Haversine),
            Err(ProximityError::InvalidThreshold { .. })
        ));
    }
}
