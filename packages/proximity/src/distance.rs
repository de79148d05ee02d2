//! Great-circle distance functions.
//!
//! [`DistanceFn::distances_to`] computes one subject against a whole
//! [`ReferenceBatch`] at once. The batch stores references as parallel
//! arrays of precomputed radians and cosines so the inner loop is a
//! straight-line numeric kernel over contiguous memory.

use voucher_map_housing_models::Coordinates;

/// Earth radius used by the locator's distance formula, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6367.0;

/// Kilometers to statute miles.
pub const KM_TO_MILES: f64 = 0.621_371;

/// Great-circle distance in statute miles between two points given as
/// decimal degrees.
#[must_use]
pub fn haversine_miles(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );
    haversine_kernel(lat1, lat1.cos(), lat2, lat2.cos(), lon2 - lon1)
}

#[inline]
fn haversine_kernel(lat1: f64, cos_lat1: f64, lat2: f64, cos_lat2: f64, dlon: f64) -> f64 {
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + cos_lat1 * cos_lat2 * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    KM_TO_MILES * (EARTH_RADIUS_KM * c)
}

/// A reference point set prepared for batched distance computation.
#[derive(Debug, Clone, Default)]
pub struct ReferenceBatch {
    coordinates: Vec<Coordinates>,
    lon_rad: Vec<f64>,
    lat_rad: Vec<f64>,
    cos_lat: Vec<f64>,
}

impl ReferenceBatch {
    /// Prepares a batch from validated reference coordinates.
    #[must_use]
    pub fn new(coordinates: Vec<Coordinates>) -> Self {
        let lon_rad: Vec<f64> = coordinates.iter().map(|c| c.longitude.to_radians()).collect();
        let lat_rad: Vec<f64> = coordinates.iter().map(|c| c.latitude.to_radians()).collect();
        let cos_lat = lat_rad.iter().map(|lat| lat.cos()).collect();
        Self {
            coordinates,
            lon_rad,
            lat_rad,
            cos_lat,
        }
    }

    /// Number of reference points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// The reference coordinates in batch order.
    #[must_use]
    pub fn coordinates(&self) -> &[Coordinates] {
        &self.coordinates
    }
}

/// A distance metric between two WGS84 points, in miles.
pub trait DistanceFn {
    /// Distance between two points.
    fn distance(&self, a: Coordinates, b: Coordinates) -> f64;

    /// Distances from `subject` to every point in `batch`, written to
    /// `out` in batch order. `out.len()` must equal `batch.len()`.
    fn distances_to(&self, subject: Coordinates, batch: &ReferenceBatch, out: &mut [f64]) {
        for (slot, reference) in out.iter_mut().zip(batch.coordinates()) {
            *slot = self.distance(subject, *reference);
        }
    }
}

impl<T: DistanceFn + ?Sized> DistanceFn for &T {
    fn distance(&self, a: Coordinates, b: Coordinates) -> f64 {
        (**self).distance(a, b)
    }

    fn distances_to(&self, subject: Coordinates, batch: &ReferenceBatch, out: &mut [f64]) {
        (**self).distances_to(subject, batch, out);
    }
}

/// Haversine distance on a sphere of radius [`EARTH_RADIUS_KM`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceFn for Haversine {
    fn distance(&self, a: Coordinates, b: Coordinates) -> f64 {
        haversine_miles(a.longitude, a.latitude, b.longitude, b.latitude)
    }

    fn distances_to(&self, subject: Coordinates, batch: &ReferenceBatch, out: &mut [f64]) {
        let lon1 = subject.longitude.to_radians();
        let lat1 = subject.latitude.to_radians();
        let cos_lat1 = lat1.cos();

        for (((slot, lon2), lat2), cos_lat2) in out
            .iter_mut()
            .zip(&batch.lon_rad)
            .zip(&batch.lat_rad)
            .zip(&batch.cos_lat)
        {
            *slot = haversine_kernel(lat1, cos_lat1, *lat2, *cos_lat2, lon2 - lon1);
        }
    }
}
