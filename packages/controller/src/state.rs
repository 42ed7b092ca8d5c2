//! Committed risk state and the selection record.
//!
//! Both types are readable by anyone and writable only from inside this
//! crate, so the [`SelectionController`](crate::SelectionController) is the
//! single writer.

use std::collections::BTreeMap;

use flood_map_api_models::WeatherReading;
use flood_map_region_models::normalize_code;
use flood_map_risk_models::{NormalizedPrediction, RiskSummary};

/// Committed predictions keyed by region code.
///
/// Absent means "not yet analyzed". Entries are overwritten by
/// re-analysis and never removed during a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppRiskState {
    predictions: BTreeMap<String, NormalizedPrediction>,
    weather: BTreeMap<String, WeatherReading>,
}

impl AppRiskState {
    /// The committed prediction for `code`, if the region was analyzed.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&NormalizedPrediction> {
        self.predictions.get(&normalize_code(code))
    }

    /// The most recent weather reading fetched alongside a prediction.
    #[must_use]
    pub fn weather(&self, code: &str) -> Option<&WeatherReading> {
        self.weather.get(&normalize_code(code))
    }

    /// Whether `code` has a committed prediction.
    #[must_use]
    pub fn is_analyzed(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// All committed predictions in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizedPrediction)> {
        self.predictions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of analyzed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Whether no region has been analyzed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Aggregate statistics, recomputed from the committed predictions.
    #[must_use]
    pub fn summary(&self) -> RiskSummary {
        flood_map_risk::summarize(self.predictions.values())
    }

    pub(crate) fn commit(&mut self, code: &str, prediction: NormalizedPrediction) {
        self.predictions.insert(normalize_code(code), prediction);
    }

    pub(crate) fn commit_weather(&mut self, code: &str, reading: WeatherReading) {
        self.weather.insert(normalize_code(code), reading);
    }
}

/// Which region is selected and whether its fetch is in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    /// The selected region, if any.
    pub selected_region: Option<String>,
    /// The only request id whose result may still be committed.
    pub pending_request_id: Option<u64>,
    /// Whether a fetch for the selected region is in flight.
    pub loading: bool,
}

impl SelectionState {
    /// Whether `code` is the selected region.
    #[must_use]
    pub fn is_selected(&self, code: &str) -> bool {
        self.selected_region
            .as_deref()
            .is_some_and(|selected| selected == normalize_code(code))
    }
}

/// Phase of the selection state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    /// Nothing has been selected yet.
    #[default]
    Idle,
    /// A fetch for `region` is in flight under `request_id`.
    Selecting {
        /// The selected region.
        region: String,
        /// The request id that may commit.
        request_id: u64,
    },
    /// The last fetch for `region` completed (successfully or not).
    Settled {
        /// The selected region.
        region: String,
    },
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use flood_map_risk_models::{ConfidenceLevel, ModelBreakdown, RiskCategory};

    use super::*;

    fn prediction(p: f64) -> NormalizedPrediction {
        NormalizedPrediction {
            risk_category: RiskCategory::from_probability(p),
            flood_probability: p,
            combined_confidence: ConfidenceLevel::Medium,
            will_flood: p >= 0.5,
            risk_zone: "Unknown".to_string(),
            model_breakdown: ModelBreakdown::default(),
            retrieved_at: Utc::now(),
        }
    }

    #[test]
    fn lookups_ignore_code_case() {
        let mut state = AppRiskState::default();
        state.commit("h/e", prediction(0.4));

        assert!(state.is_analyzed("H/E"));
        assert!(state.is_analyzed(" h/e"));
        assert_eq!(state.iter().next().map(|(code, _)| code), Some("H/E"));
    }

    #[test]
    fn reanalysis_overwrites() {
        let mut state = AppRiskState::default();
        state.commit("A", prediction(0.05));
        state.commit("A", prediction(0.8));

        assert_eq!(state.len(), 1);
        assert_eq!(state.get("A").map(|p| p.risk_category), Some(RiskCategory::Critical));
    }

    #[test]
    fn summary_reflects_commits() {
        let mut state = AppRiskState::default();
        state.commit("A", prediction(0.05));
        state.commit("B", prediction(0.4));
        state.commit("C", prediction(0.6));

        let summary = state.summary();
        assert_eq!(summary.analyzed, 3);
        assert_eq!(summary.count(RiskCategory::High), 2);
        assert_eq!(summary.will_flood, 1);
    }

    #[test]
    fn selection_matching() {
        let state = SelectionState {
            selected_region: Some("H/E".to_string()),
            pending_request_id: Some(1),
            loading: true,
        };
        assert!(state.is_selected("h/e"));
        assert!(!state.is_selected("A"));
        assert!(!SelectionState::default().is_selected("A"));
    }
}
