#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward region boundary and coordinate types.
//!
//! A [`Region`] is one named geographic subdivision (a municipal ward) with
//! a fixed boundary. Regions are immutable once loaded; the only derived
//! value, the centroid, is computed on first access and cached.

use std::sync::OnceLock;

use geo::{Coord, MultiPolygon};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns `true` if both components are finite and within the valid
    /// latitude/longitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Normalizes a ward code for lookups and comparisons.
///
/// The prediction backend upper-cases codes (`"h/e"` and `"H/E"` name the
/// same ward), so every code entering the system goes through here.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A geographic region (ward) with its boundary.
#[derive(Debug, Clone)]
pub struct Region {
    code: String,
    name: String,
    geometry: MultiPolygon<f64>,
    centroid: OnceLock<LatLon>,
}

impl Region {
    /// Creates a region. The code is normalized with [`normalize_code`].
    #[must_use]
    pub fn new(code: &str, name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            code: normalize_code(code),
            name: name.into(),
            geometry,
            centroid: OnceLock::new(),
        }
    }

    /// Stable ward code (e.g. `"H/E"`).
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human-readable ward name (e.g. `"Bandra East"`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Boundary geometry (x = longitude, y = latitude).
    #[must_use]
    pub const fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Arithmetic mean of the outer ring's distinct vertices.
    ///
    /// This is not the area-weighted polygon centroid. The closing vertex
    /// of the ring (equal to the first) is counted once. Computed on first
    /// call and cached.
    pub fn centroid(&self) -> LatLon {
        *self
            .centroid
            .get_or_init(|| ring_vertex_mean(outer_ring(&self.geometry)))
    }
}

/// Returns the coordinates of the first polygon's exterior ring.
fn outer_ring(geometry: &MultiPolygon<f64>) -> &[Coord<f64>] {
    match geometry.0.first() {
        Some(polygon) => &polygon.exterior().0,
        None => &[],
    }
}

#[allow(clippy::cast_precision_loss)]
fn ring_vertex_mean(ring: &[Coord<f64>]) -> LatLon {
    let vertices = match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    };

    if vertices.is_empty() {
        return LatLon::new(0.0, 0.0);
    }

    let (sum_x, sum_y) = vertices
        .iter()
        .fold((0.0, 0.0), |(x, y), c| (x + c.x, y + c.y));
    let n = vertices.len() as f64;

    LatLon::new(sum_y / n, sum_x / n)
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon};

    use super::*;

    fn square() -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (72.0, 19.0),
                (73.0, 19.0),
                (73.0, 20.0),
                (72.0, 20.0),
                (72.0, 19.0),
            ]),
            vec![],
        )])
    }

    #[test]
    fn centroid_is_mean_of_distinct_outer_vertices() {
        let region = Region::new("h/e", "Bandra East", square());
        let c = region.centroid();
        assert!((c.lat - 19.5).abs() < f64::EPSILON);
        assert!((c.lon - 72.5).abs() < f64::EPSILON);
    }

    #[test]
    fn centroid_is_cached() {
        let region = Region::new("A", "Colaba", square());
        assert_eq!(region.centroid(), region.centroid());
    }

    #[test]
    fn empty_geometry_centroid_is_origin() {
        let region = Region::new("X", "Nowhere", MultiPolygon(vec![]));
        assert_eq!(region.centroid(), LatLon::new(0.0, 0.0));
    }

    #[test]
    fn codes_are_normalized() {
        let region = Region::new("  k/w ", "Andheri West", square());
        assert_eq!(region.code(), "K/W");
        assert_eq!(normalize_code("r/c"), "R/C");
    }

    #[test]
    fn lat_lon_validity() {
        assert!(LatLon::new(19.07, 72.87).is_valid());
        assert!(!LatLon::new(91.0, 0.0).is_valid());
        assert!(!LatLon::new(0.0, f64::NAN).is_valid());
    }
}
