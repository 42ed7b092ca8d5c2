//! Normalizes raw backend payloads into [`NormalizedPrediction`] records.
//!
//! The backend reports up to three sub-models and any of them may be
//! missing, `null`, or carry numbers as strings. Every field of the output
//! is defaulted here so consumers never deal with absent data:
//!
//! | Field | Source | Default |
//! |---|---|---|
//! | `flood_probability` | `bayesian.flood_probability`, `bayesian_probability` | `0` |
//! | `risk_category` | derived from `flood_probability` | (`Low` via `0`) |
//! | `combined_confidence` | `combined_assessment.confidence` | `Medium` |
//! | `will_flood` | `random_forest.will_flood`, `random_forest.flood_risk_level >= 1` | `false` |
//! | `risk_zone` | `ward_risk_zone`, `clustering.risk_zone`, `risk_zone` | `"Unknown"` |
//! | `retrieved_at` | `timestamp` | client receipt time |
//!
//! Missing data therefore degrades toward [`RiskCategory::Low`]. That
//! understates risk when the probabilistic network is unavailable, which
//! matters for a flood warning display; the policy is kept in this one
//! function so it can be revisited in one place.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use flood_map_risk_models::{
    ConfidenceLevel, ModelBreakdown, NormalizedPrediction, ProbabilityInterval, RawPrediction,
    RiskCategory, SubModelRisk,
};
use serde_json::Value;

/// Zone name used when the clustering model reports nothing usable.
pub const UNKNOWN_ZONE: &str = "Unknown";

/// Converts a raw payload into a fully-populated record.
///
/// Never fails. The same input always yields the same output.
#[must_use]
pub fn normalize(raw: &RawPrediction) -> NormalizedPrediction {
    let body = raw.body();

    let tree_ensemble = tree_ensemble(body);
    let (probabilistic, probabilistic_interval) = probabilistic(body);
    let risk_zone = risk_zone(body);
    let clustering = SubModelRisk {
        risk_category: zone_category(&risk_zone),
        probability: 0.0,
    };

    let will_flood = body
        .get("random_forest")
        .and_then(|rf| rf.get("will_flood"))
        .and_then(coerce_bool)
        .or_else(|| {
            body.get("random_forest")
                .and_then(|rf| rf.get("flood_risk_level"))
                .and_then(coerce_level)
                .map(|level| level >= 1)
        })
        .unwrap_or(false);

    let combined_confidence = body
        .get("combined_assessment")
        .and_then(|ca| ca.get("confidence"))
        .and_then(coerce_str)
        .and_then(ConfidenceLevel::parse_label)
        .unwrap_or_default();

    let retrieved_at = body
        .get("timestamp")
        .and_then(coerce_str)
        .and_then(parse_timestamp)
        .unwrap_or_else(|| raw.received_at());

    NormalizedPrediction {
        risk_category: RiskCategory::from_probability(probabilistic.probability),
        flood_probability: probabilistic.probability,
        combined_confidence,
        will_flood,
        risk_zone,
        model_breakdown: ModelBreakdown {
            tree_ensemble,
            probabilistic,
            probabilistic_interval,
            clustering,
        },
        retrieved_at,
    }
}

/// Renders a normalized record back into the backend payload shape.
///
/// `normalize(&denormalize(p)) == p` for every `p` produced by
/// [`normalize`].
#[must_use]
pub fn denormalize(prediction: &NormalizedPrediction) -> RawPrediction {
    let breakdown = &prediction.model_breakdown;
    let tree_probability = breakdown.tree_ensemble.probability;

    let mut random_forest = serde_json::json!({
        "will_flood": prediction.will_flood,
        "risk_probabilities": {
            "low": 1.0 - tree_probability,
            "medium": 0.0,
            "high": tree_probability,
        },
    });
    if let (Some(level), Some(obj)) = (
        breakdown.tree_ensemble.risk_category.level(),
        random_forest.as_object_mut(),
    ) {
        obj.insert("flood_risk_level".to_string(), Value::from(level));
    }

    let body = serde_json::json!({
        "ward_risk_zone": prediction.risk_zone,
        "random_forest": random_forest,
        "bayesian": {
            "flood_probability": prediction.flood_probability,
            "confidence_interval": [
                breakdown.probabilistic_interval.lower,
                breakdown.probabilistic_interval.upper,
            ],
        },
        "combined_assessment": {
            "confidence": prediction.combined_confidence.to_string(),
        },
        "timestamp": prediction
            .retrieved_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
    });

    RawPrediction::new(body, prediction.retrieved_at)
}

fn tree_ensemble(body: &Value) -> SubModelRisk {
    let Some(rf) = body.get("random_forest").filter(|v| v.is_object()) else {
        return SubModelRisk::default();
    };

    let risk_category = rf
        .get("flood_risk_level")
        .and_then(coerce_level)
        .map_or(RiskCategory::Unknown, RiskCategory::from_level);

    let class_probability = |class: &str| {
        rf.get("risk_probabilities")
            .and_then(|p| p.get(class))
            .and_then(coerce_f64)
            .map_or(0.0, clamp_unit)
    };

    SubModelRisk {
        risk_category,
        probability: clamp_unit(class_probability("medium") + class_probability("high")),
    }
}

fn probabilistic(body: &Value) -> (SubModelRisk, ProbabilityInterval) {
    let nested = body.get("bayesian").filter(|v| v.is_object());

    let probability = nested
        .and_then(|b| b.get("flood_probability"))
        .and_then(coerce_f64)
        .or_else(|| body.get("bayesian_probability").and_then(coerce_f64))
        .map_or(0.0, clamp_unit);

    let interval = nested
        .and_then(|b| b.get("confidence_interval"))
        .and_then(parse_interval)
        .unwrap_or(ProbabilityInterval {
            lower: probability,
            upper: probability,
        });

    (
        SubModelRisk {
            risk_category: RiskCategory::from_probability(probability),
            probability,
        },
        interval,
    )
}

/// Accepts `[lo, hi]`, `{ "lower", "upper" }` or `{ "low", "high" }`.
fn parse_interval(value: &Value) -> Option<ProbabilityInterval> {
    let (a, b) = match value {
        Value::Array(items) if items.len() == 2 => (coerce_f64(&items[0])?, coerce_f64(&items[1])?),
        Value::Object(_) => {
            let lower = value.get("lower").or_else(|| value.get("low"))?;
            let upper = value.get("upper").or_else(|| value.get("high"))?;
            (coerce_f64(lower)?, coerce_f64(upper)?)
        }
        _ => return None,
    };

    let (a, b) = (clamp_unit(a), clamp_unit(b));
    Some(ProbabilityInterval {
        lower: a.min(b),
        upper: a.max(b),
    })
}

fn risk_zone(body: &Value) -> String {
    body.get("ward_risk_zone")
        .and_then(coerce_str)
        .or_else(|| {
            body.get("clustering")
                .and_then(|c| c.get("risk_zone"))
                .and_then(coerce_str)
        })
        .or_else(|| body.get("risk_zone").and_then(coerce_str))
        .unwrap_or(UNKNOWN_ZONE)
        .to_string()
}

/// Maps a clustering zone label (e.g. `"Very High Risk"`) to a category.
fn zone_category(zone: &str) -> RiskCategory {
    let lower = zone.to_lowercase();

    if lower.contains("very high") {
        RiskCategory::Critical
    } else if lower.contains("high") {
        RiskCategory::High
    } else if lower.contains("medium") || lower.contains("moderate") {
        RiskCategory::Medium
    } else if lower.contains("low") {
        RiskCategory::Low
    } else {
        RiskCategory::Unknown
    }
}

/// Parses RFC 3339 or a naive ISO-8601 timestamp (taken as UTC).
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    log::trace!("Unparseable prediction timestamp: {s}");
    None
}

/// A finite number, from a JSON number or a numeric string.
fn coerce_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A non-negative whole risk level; fractional values are truncated.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coerce_level(value: &Value) -> Option<u64> {
    let n = coerce_f64(value)?;
    (n >= 0.0).then(|| n.trunc() as u64)
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(_) => coerce_f64(value).map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn clamp_unit(p: f64) -> f64 {
    p.clamp(0.0, 1.0)
}
