#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood risk taxonomy and prediction record types.
//!
//! The prediction backend combines three sub-models (a tree-ensemble
//! classifier, a probabilistic network, and a ward clustering model) and
//! returns a loosely-typed payload. [`RawPrediction`] carries that payload
//! as received; [`NormalizedPrediction`] is the fully-populated record the
//! rest of the system consumes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use flood_map_region_models::normalize_code;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Combined flood risk category, the unit of styling and aggregation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum RiskCategory {
    /// Flood probability below 0.1.
    Low,
    /// Flood probability in [0.1, 0.3).
    Medium,
    /// Flood probability in [0.3, 0.7).
    High,
    /// Flood probability of 0.7 or more.
    Critical,
    /// The source did not report enough to classify.
    Unknown,
}

impl RiskCategory {
    /// Lower probability bound (inclusive) of the [`Self::Critical`] tier.
    pub const CRITICAL_THRESHOLD: f64 = 0.7;
    /// Lower probability bound (inclusive) of the [`Self::High`] tier.
    pub const HIGH_THRESHOLD: f64 = 0.3;
    /// Lower probability bound (inclusive) of the [`Self::Medium`] tier.
    pub const MEDIUM_THRESHOLD: f64 = 0.1;

    /// Maps a flood probability onto a category.
    ///
    /// Non-finite input is treated as 0 and therefore maps to
    /// [`Self::Low`].
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        let p = if probability.is_finite() {
            probability
        } else {
            0.0
        };

        if p >= Self::CRITICAL_THRESHOLD {
            Self::Critical
        } else if p >= Self::HIGH_THRESHOLD {
            Self::High
        } else if p >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Maps a tree-ensemble discrete risk level (0 = low, 1 = medium,
    /// 2 = high, 3+ = critical).
    #[must_use]
    pub const fn from_level(level: u64) -> Self {
        match level {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Critical,
        }
    }

    /// Inverse of [`Self::from_level`]; `None` for [`Self::Unknown`].
    #[must_use]
    pub const fn level(self) -> Option<u64> {
        match self {
            Self::Low => Some(0),
            Self::Medium => Some(1),
            Self::High => Some(2),
            Self::Critical => Some(3),
            Self::Unknown => None,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Low,
            Self::Medium,
            Self::High,
            Self::Critical,
            Self::Unknown,
        ]
    }
}

/// Confidence in the combined assessment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ConfidenceLevel {
    /// Low confidence.
    Low,
    /// Medium confidence (the default when unreported).
    #[default]
    Medium,
    /// High confidence.
    High,
    /// Very high confidence.
    #[strum(serialize = "Very High")]
    VeryHigh,
}

impl ConfidenceLevel {
    /// Parses a backend confidence label, tolerating case and spacing
    /// variations (`"very high"`, `"Very_High"`, `"VERYHIGH"`).
    #[must_use]
    pub fn parse_label(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "veryhigh" => Some(Self::VeryHigh),
            _ => None,
        }
    }
}

/// A prediction payload exactly as received from the backend.
///
/// No field of the body is guaranteed to be present or well-typed. The
/// client stamps the moment the payload arrived so normalization has a
/// deterministic fallback timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    body: serde_json::Value,
    received_at: DateTime<Utc>,
}

impl RawPrediction {
    /// Wraps a payload received at `received_at`.
    #[must_use]
    pub const fn new(body: serde_json::Value, received_at: DateTime<Utc>) -> Self {
        Self { body, received_at }
    }

    /// The payload as received.
    #[must_use]
    pub const fn body(&self) -> &serde_json::Value {
        &self.body
    }

    /// When the client received the payload.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The ward code the payload reports, normalized.
    #[must_use]
    pub fn ward_code(&self) -> Option<String> {
        self.body
            .get("ward_code")
            .and_then(serde_json::Value::as_str)
            .map(normalize_code)
            .filter(|s| !s.is_empty())
    }

    /// The ward name the payload reports, if any.
    #[must_use]
    pub fn ward_name(&self) -> Option<&str> {
        self.body
            .get("ward_name")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The raw weather inputs the backend used, if reported.
    #[must_use]
    pub fn weather_data(&self) -> Option<&serde_json::Value> {
        self.body.get("weather_data").filter(|v| v.is_object())
    }
}

/// One sub-model's contribution to the combined assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubModelRisk {
    /// Category this sub-model indicates.
    pub risk_category: RiskCategory,
    /// Flood probability this sub-model indicates, in [0, 1].
    pub probability: f64,
}

impl Default for SubModelRisk {
    fn default() -> Self {
        Self {
            risk_category: RiskCategory::Unknown,
            probability: 0.0,
        }
    }
}

/// A closed probability interval with `lower <= upper`, both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

/// Per-sub-model breakdown of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBreakdown {
    /// Tree-ensemble classifier output.
    pub tree_ensemble: SubModelRisk,
    /// Probabilistic network output.
    pub probabilistic: SubModelRisk,
    /// Confidence interval around the probabilistic network output.
    pub probabilistic_interval: ProbabilityInterval,
    /// Ward clustering output.
    pub clustering: SubModelRisk,
}

/// The canonical, fully-defaulted risk record for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPrediction {
    /// Combined category, derived from [`Self::flood_probability`].
    pub risk_category: RiskCategory,
    /// Flood probability from the probabilistic network, in [0, 1].
    pub flood_probability: f64,
    /// Confidence in the combined assessment.
    pub combined_confidence: ConfidenceLevel,
    /// Whether the tree-ensemble model predicts flooding.
    pub will_flood: bool,
    /// Ward risk zone name from the clustering model.
    pub risk_zone: String,
    /// Per-sub-model breakdown.
    pub model_breakdown: ModelBreakdown,
    /// When the prediction was produced.
    pub retrieved_at: DateTime<Utc>,
}

/// Summary counts derived from the committed risk state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    /// Number of analyzed regions.
    pub analyzed: usize,
    /// Count per category. Every category is present, zero or not.
    pub by_category: BTreeMap<RiskCategory, usize>,
    /// Number of regions predicted to flood.
    pub will_flood: usize,
    /// Mean flood probability across analyzed regions (0 when none).
    pub mean_flood_probability: f64,
}

impl RiskSummary {
    /// Count for one category.
    #[must_use]
    pub fn count(&self, category: RiskCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}

impl Default for RiskSummary {
    fn default() -> Self {
        Self {
            analyzed: 0,
            by_category: RiskCategory::all().iter().map(|&c| (c, 0)).collect(),
            will_flood: 0,
            mean_flood_probability: 0.0,
        }
    }
}
