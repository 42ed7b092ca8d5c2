//! Summary statistics over committed predictions.

use flood_map_risk_models::{NormalizedPrediction, RiskSummary};

/// Recomputes the summary from scratch.
///
/// Linear in the number of analyzed regions; there is no incremental
/// state to keep in sync.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize<'a>(predictions: impl IntoIterator<Item = &'a NormalizedPrediction>) -> RiskSummary {
    let mut summary = RiskSummary::default();
    let mut probability_sum = 0.0;

    for prediction in predictions {
        summary.analyzed += 1;
        *summary
            .by_category
            .entry(prediction.risk_category)
            .or_insert(0) += 1;
        if prediction.will_flood {
            summary.will_flood += 1;
        }
        probability_sum += prediction.flood_probability;
    }

    if summary.analyzed > 0 {
        summary.mean_flood_probability = probability_sum / summary.analyzed as f64;
    }

    summary
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use flood_map_risk_models::{ConfidenceLevel, ModelBreakdown, RiskCategory};

    use super::*;

    fn prediction(p: f64, will_flood: bool) -> NormalizedPrediction {
        NormalizedPrediction {
            risk_category: RiskCategory::from_probability(p),
            flood_probability: p,
            combined_confidence: ConfidenceLevel::Medium,
            will_flood,
            risk_zone: "Medium Risk".to_string(),
            model_breakdown: ModelBreakdown::default(),
            retrieved_at: Utc::now(),
        }
    }

    #[test]
    fn counts_categories_and_mean() {
        let predictions = [
            prediction(0.05, false),
            prediction(0.4, true),
            prediction(0.6, true),
        ];

        let summary = summarize(&predictions);

        assert_eq!(summary.analyzed, 3);
        assert_eq!(summary.count(RiskCategory::Low), 1);
        assert_eq!(summary.count(RiskCategory::High), 2);
        assert_eq!(summary.count(RiskCategory::Medium), 0);
        assert_eq!(summary.count(RiskCategory::Critical), 0);
        assert_eq!(summary.will_flood, 2);
        let expected = (0.05 + 0.4 + 0.6) / 3.0;
        assert!((summary.mean_flood_probability - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary() {
        let summary = summarize(std::iter::empty());
        assert_eq!(summary, RiskSummary::default());
        assert!(summary.mean_flood_probability.abs() < f64::EPSILON);
    }
}
