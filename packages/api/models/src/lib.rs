#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and response types for the flood prediction backend.
//!
//! The backend is loosely typed: numeric fields occasionally arrive as
//! strings and any field may be missing. Response types here therefore
//! default every field and coerce numeric strings instead of failing the
//! whole decode. Prediction payloads are not decoded here at all; they are
//! carried as [`RawPrediction`] and handled by the risk normalizer.

use std::collections::BTreeMap;

use flood_map_region_models::LatLon;
use flood_map_risk_models::RawPrediction;
use serde::{Deserialize, Deserializer, Serialize};

/// Number of values the probabilistic network expects in a feature series.
pub const BAYESIAN_FEATURE_COUNT: usize = 15;

/// Backend health as reported by `GET /health`.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    /// Whether the prediction models are loaded and usable.
    pub models_loaded: bool,
    /// Whether the live weather service is available.
    pub weather_service: bool,
    /// Free-form status string (e.g. `"healthy"`).
    pub api_status: String,
}

impl HealthStatus {
    /// Interprets a health payload.
    ///
    /// Accepts `modelsLoaded`, `models_loaded`, or the nested
    /// `models.flood_system` flag; anything else counts as not loaded.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        let models_loaded = value
            .get("modelsLoaded")
            .or_else(|| value.get("models_loaded"))
            .or_else(|| value.get("models").and_then(|m| m.get("flood_system")))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let weather_service = value
            .get("services")
            .and_then(|s| s.get("weather_service"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let api_status = value
            .get("api_status")
            .or_else(|| value.get("status"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Self {
            models_loaded,
            weather_service,
            api_status,
        }
    }
}

/// Current weather conditions for a ward (`GET /weather/current/{code}`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherReading {
    /// Current rainfall in millimetres.
    #[serde(rename = "Rainfall_mm", deserialize_with = "lenient_f64")]
    pub rainfall_mm: f64,
    /// Rainfall over the last 24 hours in millimetres.
    #[serde(rename = "Rainfall_24hr", deserialize_with = "lenient_f64")]
    pub rainfall_24hr_mm: f64,
    /// Current tide level in metres.
    #[serde(rename = "Tide_Level_m", deserialize_with = "lenient_f64")]
    pub tide_level_m: f64,
    /// Today's high tide in metres.
    #[serde(rename = "High_Tide_m", deserialize_with = "lenient_f64")]
    pub high_tide_m: f64,
    /// Today's low tide in metres.
    #[serde(rename = "Low_Tide_m", deserialize_with = "lenient_f64")]
    pub low_tide_m: f64,
    /// Air temperature in degrees Celsius.
    #[serde(rename = "Temperature_C", deserialize_with = "lenient_f64")]
    pub temperature_c: f64,
    /// Relative humidity, percent.
    #[serde(rename = "Humidity_%", deserialize_with = "lenient_f64")]
    pub humidity_percent: f64,
    /// Wind speed in km/h.
    #[serde(rename = "Wind_Speed_kmh", deserialize_with = "lenient_f64")]
    pub wind_speed_kmh: f64,
    /// Season label (e.g. `"Monsoon"`).
    #[serde(deserialize_with = "lenient_string")]
    pub season: String,
    /// Human-readable conditions.
    #[serde(deserialize_with = "lenient_string")]
    pub weather_description: String,
    /// Server timestamp, as sent.
    #[serde(deserialize_with = "lenient_string")]
    pub timestamp: String,
    /// Ward code the reading is for.
    #[serde(deserialize_with = "lenient_string")]
    pub ward_code: String,
    /// Ward name the reading is for.
    #[serde(deserialize_with = "lenient_string")]
    pub ward_name: String,
    /// Location the reading was taken for.
    #[serde(deserialize_with = "lenient_coordinates")]
    pub coordinates: Option<LatLon>,
}

/// Custom weather conditions for `POST /predict/custom` and
/// `POST /predict-comprehensive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInput {
    /// Current rainfall in millimetres.
    pub rainfall_mm: f64,
    /// Rainfall over the last 24 hours in millimetres.
    pub rainfall_24hr: f64,
    /// Tide level in metres.
    pub tide_level_m: f64,
    /// Temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Relative humidity, percent (0-100).
    pub humidity_percent: f64,
    /// Wind speed in km/h.
    pub wind_speed_kmh: f64,
    /// Season label.
    pub season: String,
}

impl Default for WeatherInput {
    fn default() -> Self {
        Self {
            rainfall_mm: 0.0,
            rainfall_24hr: 0.0,
            tide_level_m: 0.0,
            temperature_c: 28.0,
            humidity_percent: 80.0,
            wind_speed_kmh: 0.0,
            season: "Monsoon".to_string(),
        }
    }
}

/// Body of `POST /predict-comprehensive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveRequest {
    /// Ward to predict for.
    pub ward_code: String,
    /// Weather to predict with; the backend uses live data when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherInput>,
}

/// Body of `POST /bayesian/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianRequest {
    /// Ward to predict for.
    pub ward_code: String,
    /// Exactly [`BAYESIAN_FEATURE_COUNT`] finite feature values.
    pub features: Vec<f64>,
}

/// Body of `POST /routing/safe-route`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeRouteRequest {
    /// Starting point.
    pub origin: LatLon,
    /// Destination.
    pub destination: LatLon,
}

/// A route that avoids high-risk wards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeRoute {
    /// Ordered waypoints from origin to destination.
    pub waypoints: Vec<LatLon>,
    /// Route length in kilometres.
    #[serde(deserialize_with = "lenient_f64")]
    pub distance_km: f64,
    /// Ward codes the route was steered around.
    pub avoided_wards: Vec<String>,
    /// Aggregate risk along the route, in [0, 1].
    #[serde(deserialize_with = "lenient_f64")]
    pub risk_score: f64,
}

/// Body of `POST /routing/nearest-safe-zone`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestSafeZoneRequest {
    /// Where the user is.
    pub location: LatLon,
}

/// The closest low-risk location to a point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeZone {
    /// Name of the safe zone.
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    /// Where it is.
    #[serde(deserialize_with = "lenient_coordinates")]
    pub location: Option<LatLon>,
    /// Distance from the requested point in kilometres.
    #[serde(deserialize_with = "lenient_f64")]
    pub distance_km: f64,
    /// Ward the zone lies in, if reported.
    pub ward_code: Option<String>,
}

/// Summary block of `GET /predict/all-wards`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSummary {
    /// Number of wards predicted.
    pub total_wards: u64,
    /// Wards assessed as high risk.
    pub high_risk_wards: u64,
    /// Wards the tree-ensemble model put at level 1.
    pub medium_risk_wards: u64,
    /// Wards the tree-ensemble model put at level 0.
    pub low_risk_wards: u64,
    /// Mean probabilistic-network probability across wards.
    #[serde(deserialize_with = "lenient_f64")]
    pub average_bayesian_probability: f64,
}

/// Result of `GET /predict/all-wards`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPredictions {
    /// One raw prediction per ward.
    pub predictions: Vec<RawPrediction>,
    /// Server-computed summary.
    pub summary: BatchSummary,
}

/// One ward's cluster assignment (`GET /wards/clusters`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardCluster {
    /// Ward code.
    #[serde(rename = "Ward", deserialize_with = "lenient_string")]
    pub ward_code: String,
    /// Ward name.
    #[serde(rename = "Ward_Name", deserialize_with = "lenient_string")]
    pub ward_name: String,
    /// Cluster index.
    pub cluster: i64,
    /// Risk zone label of the cluster.
    #[serde(deserialize_with = "lenient_string")]
    pub risk_zone: String,
}

/// Result of `GET /wards/clusters`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardClusters {
    /// Per-ward assignments.
    pub ward_clusters: Vec<WardCluster>,
    /// Number of wards per risk zone.
    pub cluster_summary: BTreeMap<String, u64>,
}

/// Acknowledgement of `POST /models/retrain`. Training runs in the
/// background; poll [`HealthStatus`] to see when the models are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainStatus {
    /// Server message.
    #[serde(deserialize_with = "lenient_string")]
    pub message: String,
}

/// Tree-ensemble block of `GET /models/info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeEnsembleInfo {
    /// Number of trees.
    pub n_estimators: u64,
    /// Maximum tree depth.
    pub max_depth: u64,
    /// Feature columns the ensemble was trained on.
    pub features: Vec<String>,
}

/// Clustering block of `GET /models/info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringInfo {
    /// Number of clusters.
    pub n_clusters: u64,
    /// Clustering algorithm name.
    #[serde(deserialize_with = "lenient_string")]
    pub algorithm: String,
}

/// Probabilistic-network block of `GET /models/info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilisticInfo {
    /// Whether the network was built.
    pub available: bool,
    /// Network node names.
    pub nodes: Vec<String>,
}

/// Training dataset block of `GET /models/info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetInfo {
    /// Rows in the training dataset.
    pub total_records: u64,
    /// Dataset column names.
    pub features: Vec<String>,
}

/// Result of `GET /models/info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    /// Tree-ensemble classifier.
    #[serde(rename = "random_forest")]
    pub tree_ensemble: TreeEnsembleInfo,
    /// Ward clustering.
    pub clustering: ClusteringInfo,
    /// Probabilistic network.
    #[serde(rename = "bayesian_network")]
    pub probabilistic: ProbabilisticInfo,
    /// Training data.
    #[serde(rename = "dataset_info")]
    pub dataset: DatasetInfo,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let n = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(n.filter(|n| n.is_finite()).unwrap_or(0.0))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_coordinates<'de, D>(deserializer: D) -> Result<Option<LatLon>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let lat = value.get("lat").and_then(serde_json::Value::as_f64);
    let lon = value
        .get("lon")
        .or_else(|| value.get("lng"))
        .and_then(serde_json::Value::as_f64);

    Ok(match (lat, lon) {
        (Some(lat), Some(lon)) => Some(LatLon::new(lat, lon)).filter(LatLon::is_valid),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_flag_variants() {
        let nested = serde_json::json!({
            "api_status": "healthy",
            "models": { "flood_system": true },
            "services": { "weather_service": false }
        });
        let health = HealthStatus::from_value(&nested);
        assert!(health.models_loaded);
        assert!(!health.weather_service);
        assert_eq!(health.api_status, "healthy");

        assert!(HealthStatus::from_value(&serde_json::json!({ "modelsLoaded": true })).models_loaded);
        assert!(HealthStatus::from_value(&serde_json::json!({ "models_loaded": true })).models_loaded);
        assert!(!HealthStatus::from_value(&serde_json::json!({})).models_loaded);
    }

    #[test]
    fn weather_reading_tolerates_bad_fields() {
        let reading: WeatherReading = serde_json::from_value(serde_json::json!({
            "Rainfall_mm": "12.5",
            "Temperature_C": 28.0,
            "Humidity_%": null,
            "Wind_Speed_kmh": "calm",
            "season": "Monsoon",
            "ward_code": "H/E",
            "coordinates": { "lat": 19.0596, "lon": 72.8656 }
        }))
        .unwrap();

        assert!((reading.rainfall_mm - 12.5).abs() < f64::EPSILON);
        assert!((reading.temperature_c - 28.0).abs() < f64::EPSILON);
        assert!(reading.humidity_percent.abs() < f64::EPSILON);
        assert!(reading.wind_speed_kmh.abs() < f64::EPSILON);
        assert_eq!(reading.ward_code, "H/E");
        assert_eq!(reading.coordinates, Some(LatLon::new(19.0596, 72.8656)));
        assert!(reading.weather_description.is_empty());
    }

    #[test]
    fn ward_clusters_decode() {
        let clusters: WardClusters = serde_json::from_value(serde_json::json!({
            "ward_clusters": [
                { "Ward": "A", "Ward_Name": "Colaba", "cluster": 2, "risk_zone": "Low Risk" }
            ],
            "cluster_summary": { "Low Risk": 1 }
        }))
        .unwrap();

        assert_eq!(clusters.ward_clusters[0].ward_name, "Colaba");
        assert_eq!(clusters.cluster_summary.get("Low Risk"), Some(&1));
    }

    #[test]
    fn model_info_decode() {
        let info: ModelInfo = serde_json::from_value(serde_json::json!({
            "random_forest": {
                "n_estimators": 100,
                "max_depth": 10,
                "features": ["Rainfall_mm", "Tide_Level_m"]
            },
            "clustering": { "n_clusters": 4, "algorithm": "K-means" },
            "bayesian_network": { "available": false, "nodes": ["Flood"] },
            "dataset_info": { "total_records": 2400 }
        }))
        .unwrap();

        assert_eq!(info.tree_ensemble.n_estimators, 100);
        assert_eq!(info.tree_ensemble.features.len(), 2);
        assert_eq!(info.clustering.algorithm, "K-means");
        assert!(!info.probabilistic.available);
        assert_eq!(info.dataset.total_records, 2400);
        assert!(info.dataset.features.is_empty());

        let status: RetrainStatus = serde_json::from_value(serde_json::json!({
            "message": "Model retraining started in background"
        }))
        .unwrap();
        assert!(status.message.contains("retraining started"));
    }

    #[test]
    fn comprehensive_request_omits_missing_weather() {
        let body = serde_json::to_value(ComprehensiveRequest {
            ward_code: "H/E".to_string(),
            weather: None,
        })
        .unwrap();
        assert!(body.get("weather").is_none());
    }
}
