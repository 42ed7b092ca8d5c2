//! Async driver connecting the selection state machine to a backend.
//!
//! Network calls run on spawned tasks; their results come back through a
//! [`JoinSet`] and are applied to the controller one at a time on the
//! caller's task. State is therefore only ever mutated between awaits,
//! never concurrently. In-flight calls are not aborted when superseded;
//! their results are discarded by the staleness check.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flood_map_api::{ApiError, PredictionBackend};
use flood_map_api_models::{BatchPredictions, WeatherReading};
use flood_map_region::RegionError;
use flood_map_risk_models::RawPrediction;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, Interval};

use crate::ControllerError;
use crate::notification::NotificationCenter;
use crate::selection::{BulkTicket, FetchOutcome, FetchTicket, SelectionController};

/// Input to [`Session::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user selected a region.
    Select(String),
    /// The user asked to retry the current selection.
    Retry,
    /// Re-fetch the current selection as if the refresh timer fired.
    Refresh,
    /// Load predictions for every region.
    LoadAll,
    /// Dismiss a notification by id.
    Dismiss(u64),
    /// Stop after applying the results already in flight.
    Shutdown,
}

/// A fetch result after it has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A region fetch completed.
    Region {
        /// The region the fetch was for.
        region: String,
        /// What the controller did with it.
        outcome: FetchOutcome,
    },
    /// A bulk load completed. `None` when it failed.
    Bulk {
        /// Regions committed.
        committed: Option<usize>,
    },
}

enum Completion {
    Region {
        ticket: FetchTicket,
        prediction: Result<RawPrediction, ApiError>,
        weather: Result<WeatherReading, ApiError>,
    },
    Bulk {
        ticket: BulkTicket,
        result: Result<BatchPredictions, ApiError>,
    },
}

/// One user session against a prediction backend.
pub struct Session {
    controller: SelectionController,
    backend: Arc<dyn PredictionBackend>,
    tasks: JoinSet<Completion>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("controller", &self.controller)
            .field("in_flight", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session driving `controller` against `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn PredictionBackend>, controller: SelectionController) -> Self {
        Self {
            controller,
            backend,
            tasks: JoinSet::new(),
        }
    }

    /// Read access to the controller and everything it owns.
    #[must_use]
    pub const fn controller(&self) -> &SelectionController {
        &self.controller
    }

    /// Notifications, for dismissing and expiring.
    pub const fn notifications_mut(&mut self) -> &mut NotificationCenter {
        self.controller.notifications_mut()
    }

    /// Surfaces a failed boundary load as a notification.
    pub fn on_boundary_failure(&mut self, error: &RegionError) {
        self.controller.on_boundary_failure(error);
    }

    /// Number of fetches whose results have not been applied yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Checks backend health and, when the models are loaded, starts a
    /// bulk load. Returns whether the bulk load was started.
    pub async fn start(&mut self) -> bool {
        match self.backend.health().await {
            Ok(health) => {
                log::info!(
                    "backend status: {} (models loaded: {}, weather service: {})",
                    health.api_status,
                    health.models_loaded,
                    health.weather_service,
                );
                if self.controller.on_health(&health) {
                    self.load_all();
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                self.controller.on_health_failure(&e);
                false
            }
        }
    }

    /// Selects `region` and fetches its prediction and weather together.
    pub fn select(&mut self, region: &str) {
        let ticket = self.controller.select(region);
        self.spawn_region(ticket);
    }

    /// Retries the current selection. Returns whether a fetch was issued.
    pub fn retry(&mut self) -> bool {
        let Some(ticket) = self.controller.retry() else {
            return false;
        };
        self.spawn_region(ticket);
        true
    }

    /// Refreshes the current selection if it has settled. Returns whether
    /// a fetch was issued.
    pub fn refresh_tick(&mut self) -> bool {
        let Some(ticket) = self.controller.on_refresh_tick() else {
            return false;
        };
        self.spawn_region(ticket);
        true
    }

    /// Starts loading predictions for every region.
    pub fn load_all(&mut self) {
        let ticket = self.controller.begin_bulk_load();
        let backend = Arc::clone(&self.backend);

        log::debug!("bulk load started");
        self.tasks.spawn(async move {
            let result = backend.all_region_predictions().await;
            Completion::Bulk { ticket, result }
        });
    }

    /// Waits for the next fetch to finish and applies it. Returns `None`
    /// when nothing is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Task`] if a fetch task panicked.
    pub async fn next_update(&mut self) -> Option<Result<SessionUpdate, ControllerError>> {
        let joined = self.tasks.join_next().await?;
        Some(self.apply(joined))
    }

    /// Applies every in-flight fetch, in completion order.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Task`] if a fetch task panicked.
    pub async fn settle(&mut self) -> Result<Vec<SessionUpdate>, ControllerError> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update?);
        }
        Ok(updates)
    }

    /// Event loop. Handles `events` until the channel closes or
    /// [`SessionEvent::Shutdown`] arrives, re-fetches the selection every
    /// `refresh_every` when set, and calls `on_update` after each applied
    /// result. Results still in flight at shutdown are applied before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Task`] if a fetch task panicked.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        refresh_every: Option<Duration>,
        mut on_update: impl FnMut(&SelectionController, &SessionUpdate),
    ) -> Result<(), ControllerError> {
        let mut refresh = refresh_every
            .filter(|period| !period.is_zero())
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            self.controller.notifications_mut().expire(Utc::now());

            tokio::select! {
                event = events.recv() => match event {
                    Some(SessionEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event),
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    let update = self.apply(joined)?;
                    on_update(&self.controller, &update);
                }
                () = next_tick(refresh.as_mut()) => {
                    if !self.refresh_tick() {
                        log::trace!("refresh skipped: nothing settled to refresh");
                    }
                }
            }
        }

        while let Some(update) = self.next_update().await {
            on_update(&self.controller, &update?);
        }

        Ok(())
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Select(region) => self.select(&region),
            SessionEvent::Retry => {
                self.retry();
            }
            SessionEvent::Refresh => {
                self.refresh_tick();
            }
            SessionEvent::LoadAll => self.load_all(),
            SessionEvent::Dismiss(id) => {
                self.controller.notifications_mut().dismiss(id);
            }
            SessionEvent::Shutdown => {}
        }
    }

    fn spawn_region(&mut self, ticket: FetchTicket) {
        let backend = Arc::clone(&self.backend);

        self.tasks.spawn(async move {
            let (prediction, weather) = tokio::join!(
                backend.predict_region(&ticket.region),
                backend.current_weather(&ticket.region),
            );
            Completion::Region {
                ticket,
                prediction,
                weather,
            }
        });
    }

    fn apply(
        &mut self,
        joined: Result<Completion, JoinError>,
    ) -> Result<SessionUpdate, ControllerError> {
        let completion = joined.map_err(|e| ControllerError::Task {
            message: e.to_string(),
        })?;

        Ok(match completion {
            Completion::Region {
                ticket,
                prediction,
                weather,
            } => {
                let outcome = match prediction {
                    Ok(raw) => {
                        if let Err(e) = &weather {
                            log::warn!("weather for {} unavailable: {e}", ticket.region);
                        }
                        self.controller.on_fetch_success(&ticket, &raw, weather.ok())
                    }
                    Err(e) => self.controller.on_fetch_failure(&ticket, &e),
                };
                SessionUpdate::Region {
                    region: ticket.region,
                    outcome,
                }
            }
            Completion::Bulk { ticket, result } => match result {
                Ok(batch) => SessionUpdate::Bulk {
                    committed: Some(self.controller.commit_bulk(ticket, &batch)),
                },
                Err(e) => {
                    self.controller.on_bulk_failure(&e);
                    SessionUpdate::Bulk { committed: None }
                }
            },
        })
    }
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use flood_map_api_models::{BatchSummary, HealthStatus};
    use flood_map_risk_models::RiskCategory;
    use serde_json::json;

    use super::*;
    use crate::notification::NotificationLevel;

    #[derive(Default)]
    struct FakeBackend {
        models_loaded: bool,
        delays: BTreeMap<String, Duration>,
        failing_predictions: Vec<String>,
        failing_weather: bool,
        prediction_calls: Mutex<Vec<String>>,
        weather_calls: Mutex<Vec<String>>,
        bulk_calls: Mutex<usize>,
    }

    fn payload(code: &str, level: u64, probability: f64) -> serde_json::Value {
        json!({
            "ward_code": code,
            "ward_name": format!("Ward {code}"),
            "random_forest": {
                "flood_risk_level": level,
                "will_flood": level >= 1,
                "risk_probabilities": { "low": 0.1, "medium": 0.2, "high": 0.7 }
            },
            "bayesian_probability": probability,
            "combined_assessment": { "high_risk": true, "confidence": "High" },
            "timestamp": "2024-07-01T10:00:00"
        })
    }

    #[async_trait::async_trait]
    impl PredictionBackend for FakeBackend {
        async fn predict_region(&self, code: &str) -> Result<RawPrediction, ApiError> {
            self.prediction_calls.lock().unwrap().push(code.to_string());
            if let Some(delay) = self.delays.get(code) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing_predictions.iter().any(|c| c == code) {
                return Err(ApiError::NotFound { detail: None });
            }
            let probability = if code == "A" { 0.05 } else { 0.82 };
            Ok(RawPrediction::new(payload(code, 2, probability), Utc::now()))
        }

        async fn current_weather(&self, code: &str) -> Result<WeatherReading, ApiError> {
            self.weather_calls.lock().unwrap().push(code.to_string());
            if self.failing_weather {
                return Err(ApiError::Network {
                    message: "timed out".to_string(),
                });
            }
            Ok(WeatherReading {
                ward_code: code.to_string(),
                rainfall_mm: 64.0,
                ..WeatherReading::default()
            })
        }

        async fn all_region_predictions(&self) -> Result<BatchPredictions, ApiError> {
            *self.bulk_calls.lock().unwrap() += 1;
            Ok(BatchPredictions {
                predictions: vec![
                    RawPrediction::new(payload("A", 0, 0.05), Utc::now()),
                    RawPrediction::new(payload("B", 1, 0.4), Utc::now()),
                    RawPrediction::new(payload("C", 1, 0.5), Utc::now()),
                ],
                summary: BatchSummary::default(),
            })
        }

        async fn health(&self) -> Result<HealthStatus, ApiError> {
            Ok(HealthStatus {
                models_loaded: self.models_loaded,
                weather_service: true,
                api_status: "healthy".to_string(),
            })
        }
    }

    fn new_session(backend: &Arc<FakeBackend>) -> Session {
        let backend: Arc<dyn PredictionBackend> = backend.clone();
        Session::new(backend, SelectionController::default())
    }

    #[tokio::test]
    async fn selecting_a_ward_fetches_prediction_and_weather_once() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = new_session(&backend);

        session.select("H/E");
        let updates = session.settle().await.unwrap();

        assert_eq!(
            updates,
            vec![SessionUpdate::Region {
                region: "H/E".to_string(),
                outcome: FetchOutcome::Committed,
            }]
        );
        assert_eq!(*backend.prediction_calls.lock().unwrap(), vec!["H/E"]);
        assert_eq!(*backend.weather_calls.lock().unwrap(), vec!["H/E"]);

        let risk = session.controller().risk();
        let prediction = risk.get("H/E").unwrap();
        assert_eq!(prediction.risk_category, RiskCategory::Critical);
        assert!(prediction.will_flood);
        assert!((prediction.flood_probability - 0.82).abs() < f64::EPSILON);
        assert!((risk.weather("H/E").unwrap().rainfall_mm - 64.0).abs() < f64::EPSILON);
        assert!(!session.controller().selection().loading);
    }

    #[tokio::test]
    async fn slow_superseded_fetch_is_discarded() {
        let backend = Arc::new(FakeBackend {
            delays: BTreeMap::from([("A".to_string(), Duration::from_millis(100))]),
            ..FakeBackend::default()
        });
        let mut session = new_session(&backend);

        session.select("A");
        session.select("B");
        let updates = session.settle().await.unwrap();

        assert_eq!(
            updates,
            vec![
                SessionUpdate::Region {
                    region: "B".to_string(),
                    outcome: FetchOutcome::Committed,
                },
                SessionUpdate::Region {
                    region: "A".to_string(),
                    outcome: FetchOutcome::Stale,
                },
            ]
        );

        let controller = session.controller();
        assert!(!controller.risk().is_analyzed("A"));
        assert!(controller.risk().is_analyzed("B"));
        assert_eq!(controller.selection().selected_region.as_deref(), Some("B"));
        assert!(!controller.selection().loading);
    }

    #[tokio::test]
    async fn weather_failure_still_commits_prediction() {
        let backend = Arc::new(FakeBackend {
            failing_weather: true,
            ..FakeBackend::default()
        });
        let mut session = new_session(&backend);

        session.select("K/W");
        session.settle().await.unwrap();

        let risk = session.controller().risk();
        assert!(risk.is_analyzed("K/W"));
        assert!(risk.weather("K/W").is_none());
        assert!(session.controller().notifications().active().is_empty());
    }

    #[tokio::test]
    async fn prediction_failure_notifies_and_allows_retry() {
        let backend = Arc::new(FakeBackend {
            failing_predictions: vec!["Z".to_string()],
            ..FakeBackend::default()
        });
        let mut session = new_session(&backend);

        session.select("Z");
        session.settle().await.unwrap();

        let controller = session.controller();
        assert!(!controller.risk().is_analyzed("Z"));
        assert!(!controller.selection().loading);
        assert_eq!(
            controller.notifications().active()[0].level,
            NotificationLevel::Error
        );

        assert!(session.retry());
        session.settle().await.unwrap();
        assert_eq!(backend.prediction_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn start_loads_all_only_when_models_are_loaded() {
        let untrained = Arc::new(FakeBackend::default());
        let mut session = new_session(&untrained);
        assert!(!session.start().await);
        assert_eq!(session.in_flight(), 0);
        assert_eq!(*untrained.bulk_calls.lock().unwrap(), 0);
        assert_eq!(session.controller().notifications().active().len(), 1);

        let trained = Arc::new(FakeBackend {
            models_loaded: true,
            ..FakeBackend::default()
        });
        let mut session = new_session(&trained);
        assert!(session.start().await);
        let updates = session.settle().await.unwrap();

        assert_eq!(updates, vec![SessionUpdate::Bulk { committed: Some(3) }]);
        let summary = session.controller().summary();
        assert_eq!(summary.analyzed, 3);
        assert_eq!(summary.count(RiskCategory::Low), 1);
        assert_eq!(summary.count(RiskCategory::High), 2);
        assert_eq!(summary.count(RiskCategory::Medium), 0);
        assert_eq!(summary.count(RiskCategory::Critical), 0);
        let expected = (0.05 + 0.4 + 0.5) / 3.0;
        assert!((summary.mean_flood_probability - expected).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn run_applies_events_and_drains_on_close() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = new_session(&backend);
        let (tx, rx) = mpsc::channel(8);

        tx.send(SessionEvent::Select("A".to_string())).await.unwrap();
        tx.send(SessionEvent::Select("H/E".to_string())).await.unwrap();
        drop(tx);

        let mut seen = Vec::new();
        session
            .run(rx, None, |_, update| seen.push(update.clone()))
            .await
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(session.controller().risk().is_analyzed("H/E"));
        assert_eq!(
            session.controller().selection().selected_region.as_deref(),
            Some("H/E")
        );
        assert_eq!(session.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_superseded_by_user_selection_is_stale() {
        let backend = Arc::new(FakeBackend {
            delays: BTreeMap::from([("A".to_string(), Duration::from_secs(5))]),
            ..FakeBackend::default()
        });
        let mut session = new_session(&backend);
        let (tx, rx) = mpsc::channel(8);

        tx.send(SessionEvent::Select("A".to_string())).await.unwrap();
        tokio::spawn(async move {
            // A settles at 5s, the refresh re-fetches it at 10s, and B is
            // selected at 12s while that refresh is still in flight.
            tokio::time::sleep(Duration::from_secs(12)).await;
            tx.send(SessionEvent::Select("B".to_string())).await.unwrap();
            tokio::time::sleep(Duration::from_secs(6)).await;
            tx.send(SessionEvent::Shutdown).await.unwrap();
        });

        let mut seen = Vec::new();
        session
            .run(rx, Some(Duration::from_secs(10)), |_, update| {
                seen.push(update.clone());
            })
            .await
            .unwrap();

        let update = |region: &str, outcome| SessionUpdate::Region {
            region: region.to_string(),
            outcome,
        };
        assert_eq!(
            seen,
            vec![
                update("A", FetchOutcome::Committed),
                update("B", FetchOutcome::Committed),
                update("A", FetchOutcome::Stale),
            ]
        );
        assert_eq!(*backend.prediction_calls.lock().unwrap(), vec!["A", "A", "B"]);

        let controller = session.controller();
        assert_eq!(controller.selection().selected_region.as_deref(), Some("B"));
        assert!(!controller.selection().loading);
        let a = controller.risk().get("A").unwrap();
        assert!((a.flood_probability - 0.05).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_tick_refetches_settled_selection() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = new_session(&backend);
        let (tx, rx) = mpsc::channel(8);

        tx.send(SessionEvent::Select("H/E".to_string())).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            tx.send(SessionEvent::Shutdown).await.unwrap();
        });

        session
            .run(rx, Some(Duration::from_secs(10)), |_, _| {})
            .await
            .unwrap();

        // Initial selection plus the ticks at 10s and 20s.
        assert_eq!(backend.prediction_calls.lock().unwrap().len(), 3);
        assert_eq!(backend.weather_calls.lock().unwrap().len(), 3);
        assert!(session.controller().risk().is_analyzed("H/E"));
    }

    #[tokio::test]
    async fn run_handles_load_all_dismiss_and_idle_retry() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = new_session(&backend);
        let id = session
            .notifications_mut()
            .raise(NotificationLevel::Info, "welcome", Utc::now());
        let (tx, rx) = mpsc::channel(8);

        tx.send(SessionEvent::LoadAll).await.unwrap();
        tx.send(SessionEvent::Dismiss(id)).await.unwrap();
        tx.send(SessionEvent::Retry).await.unwrap();
        tx.send(SessionEvent::Refresh).await.unwrap();
        drop(tx);

        let mut seen = Vec::new();
        session
            .run(rx, None, |_, update| seen.push(update.clone()))
            .await
            .unwrap();

        assert_eq!(seen, vec![SessionUpdate::Bulk { committed: Some(3) }]);
        assert_eq!(*backend.bulk_calls.lock().unwrap(), 1);
        assert!(backend.prediction_calls.lock().unwrap().is_empty());
        assert!(session.controller().notifications().active().is_empty());
        assert_eq!(session.controller().summary().analyzed, 3);
    }

    #[test]
    fn boundary_failure_reaches_notifications() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = new_session(&backend);

        session.on_boundary_failure(&RegionError::Malformed {
            message: "no features".to_string(),
        });

        let notices = session.controller().notifications().active();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NotificationLevel::Warning);
    }
}
