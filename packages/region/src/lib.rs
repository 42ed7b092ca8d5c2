#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward boundary store.
//!
//! Loads the ward boundary `GeoJSON` document once at startup and holds the
//! resulting [`Region`]s for the lifetime of the session. Each feature must
//! carry a ward code and name property; features without a code or with a
//! non-polygon geometry are skipped with a warning.
//!
//! A failed load is reported as [`RegionError`]. Callers are expected to
//! fall back to [`RegionStore::empty`] so the map can still render without
//! boundaries.

use std::collections::BTreeMap;
use std::path::Path;

use flood_map_region_models::{LatLon, Region, normalize_code};
use geo::{Contains, MultiPolygon};
use geojson::{Feature, GeoJson};
use thiserror::Error;

/// Errors that can occur while loading the boundary document.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The boundary document could not be read.
    #[error("Boundary document {path} could not be read: {source}")]
    Missing {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The boundary document is not a usable `GeoJSON` `FeatureCollection`.
    #[error("Boundary document is malformed: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },
}

/// Property names used to pull the code and name out of each feature.
///
/// Each list is tried in order; the first non-empty string wins.
#[derive(Debug, Clone)]
pub struct BoundaryProperties {
    /// Candidate property names for the ward code.
    pub code: Vec<String>,
    /// Candidate property names for the ward name.
    pub name: Vec<String>,
}

impl Default for BoundaryProperties {
    fn default() -> Self {
        Self {
            code: ["ward_code", "code", "Ward", "ward"]
                .map(String::from)
                .to_vec(),
            name: ["name", "ward_name", "Ward_Name"].map(String::from).to_vec(),
        }
    }
}

/// Immutable set of ward regions, keyed by normalized code.
#[derive(Debug, Default)]
pub struct RegionStore {
    regions: Vec<Region>,
    index: BTreeMap<String, usize>,
}

impl RegionStore {
    /// A store with no regions (degraded, boundary-less mode).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads and parses the boundary document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Missing`] if the file cannot be read and
    /// [`RegionError::Malformed`] if it cannot be parsed or contains no
    /// usable features.
    pub fn load(path: &Path, properties: &BoundaryProperties) -> Result<Self, RegionError> {
        log::info!("Loading ward boundaries from {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| RegionError::Missing {
            path: path.display().to_string(),
            source,
        })?;

        let store = Self::from_geojson_str(&contents, properties)?;
        log::info!("Loaded {} ward boundaries", store.len());

        Ok(store)
    }

    /// Parses a boundary document from a string.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Malformed`] if the document is not a
    /// `FeatureCollection` or none of its features are usable.
    pub fn from_geojson_str(
        contents: &str,
        properties: &BoundaryProperties,
    ) -> Result<Self, RegionError> {
        let geojson: GeoJson = contents.parse().map_err(|e| RegionError::Malformed {
            message: format!("invalid GeoJSON: {e}"),
        })?;

        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(RegionError::Malformed {
                message: "expected a FeatureCollection".to_string(),
            });
        };

        let mut store = Self::default();

        for (i, feature) in collection.features.iter().enumerate() {
            let Some(region) = feature_to_region(feature, properties) else {
                log::warn!("Skipping boundary feature #{i}: missing code or polygon geometry");
                continue;
            };

            if store.index.contains_key(region.code()) {
                log::warn!("Skipping duplicate boundary for ward {}", region.code());
                continue;
            }

            store
                .index
                .insert(region.code().to_string(), store.regions.len());
            store.regions.push(region);
        }

        if store.regions.is_empty() {
            return Err(RegionError::Malformed {
                message: "no usable ward features".to_string(),
            });
        }

        Ok(store)
    }

    /// All regions, in document order.
    #[must_use]
    pub fn list_regions(&self) -> &[Region] {
        &self.regions
    }

    /// Looks up a region by code (case-insensitive).
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Region> {
        self.index
            .get(&normalize_code(code))
            .map(|&i| &self.regions[i])
    }

    /// Centroid of the region with the given code.
    #[must_use]
    pub fn centroid_of(&self, code: &str) -> Option<LatLon> {
        self.get(code).map(Region::centroid)
    }

    /// Finds the region whose boundary contains `point`.
    #[must_use]
    pub fn region_containing(&self, point: LatLon) -> Option<&Region> {
        let point = geo::Point::new(point.lon, point.lat);
        self.regions
            .iter()
            .find(|region| region.geometry().contains(&point))
    }

    /// Number of loaded regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the store holds no regions (degraded mode).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn feature_to_region(feature: &Feature, properties: &BoundaryProperties) -> Option<Region> {
    let code = first_string_property(feature, &properties.code)?;
    let name = first_string_property(feature, &properties.name).unwrap_or_else(|| code.clone());

    let geometry = feature.geometry.clone()?;
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    let polygons = match geometry {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => return None,
    };

    if polygons.0.is_empty() {
        return None;
    }

    Some(Region::new(&code, name, polygons))
}

fn first_string_property(feature: &Feature, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|key| {
        feature
            .property(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WARDS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "ward_code": "H/E", "name": "Bandra East" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[72.85, 19.05], [72.88, 19.05], [72.88, 19.07], [72.85, 19.07], [72.85, 19.05]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "Ward": "h/w", "Ward_Name": "Bandra West" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[72.82, 19.05], [72.84, 19.05], [72.84, 19.07], [72.82, 19.07], [72.82, 19.05]]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "No Code" },
                "geometry": { "type": "Point", "coordinates": [72.8, 19.0] }
            }
        ]
    }"#;

    #[test]
    fn loads_polygon_and_multipolygon_features() {
        let store = RegionStore::from_geojson_str(WARDS, &BoundaryProperties::default()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.list_regions()[0].code(), "H/E");
        assert_eq!(store.get("h/w").unwrap().name(), "Bandra West");
    }

    #[test]
    fn centroid_of_known_and_unknown_codes() {
        let store = RegionStore::from_geojson_str(WARDS, &BoundaryProperties::default()).unwrap();
        let c = store.centroid_of("H/E").unwrap();
        assert!((c.lat - 19.06).abs() < 1e-9);
        assert!((c.lon - 72.865).abs() < 1e-9);
        assert!(store.centroid_of("Z/Z").is_none());
    }

    #[test]
    fn finds_region_containing_point() {
        let store = RegionStore::from_geojson_str(WARDS, &BoundaryProperties::default()).unwrap();
        let hit = store.region_containing(LatLon::new(19.06, 72.83)).unwrap();
        assert_eq!(hit.code(), "H/W");
        assert!(store.region_containing(LatLon::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn rejects_non_collection() {
        let err = RegionStore::from_geojson_str(
            r#"{"type": "Point", "coordinates": [0, 0]}"#,
            &BoundaryProperties::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RegionError::Malformed { .. }));
    }

    #[test]
    fn rejects_garbage() {
        let err =
            RegionStore::from_geojson_str("not json", &BoundaryProperties::default()).unwrap_err();
        assert!(matches!(err, RegionError::Malformed { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = RegionStore::load(
            Path::new("/nonexistent/wards.geojson"),
            &BoundaryProperties::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RegionError::Missing { .. }));
    }

    #[test]
    fn empty_store_is_degraded() {
        let store = RegionStore::empty();
        assert!(store.is_empty());
        assert!(store.list_regions().is_empty());
    }

    #[test]
    fn bundled_ward_document_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/mumbai_wards.geojson");
        let store = RegionStore::load(&path, &BoundaryProperties::default()).unwrap();

        assert_eq!(store.len(), 24);
        assert_eq!(store.get("h/e").map(Region::name), Some("Bandra East"));

        let centroid = store.centroid_of("H/E").unwrap();
        assert!((centroid.lat - 19.0596).abs() < 1e-9);
        assert!((centroid.lon - 72.8656).abs() < 1e-9);
        assert_eq!(
            store
                .region_containing(LatLon::new(19.0596, 72.8656))
                .map(Region::code),
            Some("H/E")
        );
    }
}
