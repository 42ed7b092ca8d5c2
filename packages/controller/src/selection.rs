//! The selection state machine.
//!
//! Every transition is a synchronous method call that runs to completion,
//! so no observer can see a half-applied transition. Request ids are
//! monotonic and only the most recently issued one may commit; anything
//! else is stale and is dropped without touching state.

use std::collections::BTreeMap;

use chrono::{TimeDelta, Utc};
use flood_map_api::ApiError;
use flood_map_api_models::{BatchPredictions, HealthStatus, WeatherReading};
use flood_map_region::RegionError;
use flood_map_region_models::normalize_code;
use flood_map_risk_models::{RawPrediction, RiskSummary};

use crate::notification::{NotificationCenter, NotificationLevel};
use crate::state::{AppRiskState, SelectionPhase, SelectionState};

/// Permission to fetch one region, handed out by
/// [`SelectionController::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Normalized region code.
    pub region: String,
    /// Request id the result must be reported under.
    pub request_id: u64,
}

/// Marks a bulk load with the last request id issued before it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkTicket {
    issued_after: u64,
}

/// What happened to a reported fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result was current and the state was updated.
    Committed,
    /// The failure was current; the error was surfaced, nothing committed.
    Failed,
    /// A newer selection superseded the request; nothing changed.
    Stale,
}

/// Owns [`SelectionState`] and [`AppRiskState`]; the only writer of both.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selection: SelectionState,
    phase: SelectionPhase,
    risk: AppRiskState,
    notifications: NotificationCenter,
    last_request_id: u64,
    /// Request id (or bulk marker) behind each region's committed entry.
    committed_by: BTreeMap<String, u64>,
}

impl SelectionController {
    /// Creates a controller whose notifications live for `notification_ttl`.
    #[must_use]
    pub fn new(notification_ttl: TimeDelta) -> Self {
        Self {
            notifications: NotificationCenter::new(notification_ttl),
            ..Self::default()
        }
    }

    /// Current selection.
    #[must_use]
    pub const fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> &SelectionPhase {
        &self.phase
    }

    /// Committed risk state.
    #[must_use]
    pub const fn risk(&self) -> &AppRiskState {
        &self.risk
    }

    /// Aggregate statistics over the committed risk state.
    #[must_use]
    pub fn summary(&self) -> RiskSummary {
        self.risk.summary()
    }

    /// User notifications.
    #[must_use]
    pub const fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Mutable access for dismissing and expiring notifications.
    pub const fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    /// Selects `region` from any phase. The returned ticket carries the
    /// only request id that can commit until the next selection.
    pub fn select(&mut self, region: &str) -> FetchTicket {
        let region = normalize_code(region);
        self.last_request_id += 1;
        let request_id = self.last_request_id;

        self.selection = SelectionState {
            selected_region: Some(region.clone()),
            pending_request_id: Some(request_id),
            loading: true,
        };
        self.phase = SelectionPhase::Selecting {
            region: region.clone(),
            request_id,
        };

        log::debug!("select {region} as request #{request_id}");

        FetchTicket { region, request_id }
    }

    /// Re-selects the current region. No-op with no selection.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        let region = self.selection.selected_region.clone()?;
        Some(self.select(&region))
    }

    /// Periodic refresh: re-selects the current region once it has
    /// settled. Ignored while loading or with no selection.
    pub fn on_refresh_tick(&mut self) -> Option<FetchTicket> {
        match &self.phase {
            SelectionPhase::Settled { region } if !self.selection.loading => {
                let region = region.clone();
                Some(self.select(&region))
            }
            _ => None,
        }
    }

    /// Reports a successful fetch. `weather` is stored when present.
    pub fn on_fetch_success(
        &mut self,
        ticket: &FetchTicket,
        raw: &RawPrediction,
        weather: Option<WeatherReading>,
    ) -> FetchOutcome {
        if !self.is_current(ticket) {
            return FetchOutcome::Stale;
        }

        let prediction = flood_map_risk::normalize(raw);
        log::info!(
            "commit {} (request #{}): {} at {:.0}%",
            ticket.region,
            ticket.request_id,
            prediction.risk_category,
            prediction.flood_probability * 100.0,
        );

        self.risk.commit(&ticket.region, prediction);
        if let Some(reading) = weather {
            self.risk.commit_weather(&ticket.region, reading);
        }
        self.committed_by
            .insert(ticket.region.clone(), ticket.request_id);
        self.settle(&ticket.region);

        FetchOutcome::Committed
    }

    /// Reports a failed fetch. A current failure is surfaced as an error
    /// notification and leaves the committed state untouched.
    pub fn on_fetch_failure(&mut self, ticket: &FetchTicket, error: &ApiError) -> FetchOutcome {
        if !self.is_current(ticket) {
            return FetchOutcome::Stale;
        }

        let message = if error.is_user_retryable() {
            format!("{} Choose Retry to try again.", error.user_message())
        } else {
            error.user_message()
        };
        self.notifications
            .raise(NotificationLevel::Error, message, Utc::now());
        self.settle(&ticket.region);

        FetchOutcome::Failed
    }

    /// Startup gate. Returns whether bulk predictions should be loaded.
    ///
    /// The all-wards endpoint needs both the models and the live weather
    /// service; single-ward predictions only need the models.
    pub fn on_health(&mut self, health: &HealthStatus) -> bool {
        if health.models_loaded {
            if health.weather_service {
                return true;
            }
            self.notifications.raise(
                NotificationLevel::Warning,
                "Live weather service is unavailable. Wards are analyzed one at a time \
                 with fallback conditions.",
                Utc::now(),
            );
            return false;
        }

        self.notifications.raise(
            NotificationLevel::Info,
            "Prediction models are not loaded yet. Run `flood_map retrain` or select a ward \
             once training has finished.",
            Utc::now(),
        );
        false
    }

    /// Reports a failed health check.
    pub fn on_health_failure(&mut self, error: &ApiError) {
        self.notifications
            .raise(NotificationLevel::Warning, error.user_message(), Utc::now());
    }

    /// Reports a failed boundary load. The session carries on without
    /// ward outlines.
    pub fn on_boundary_failure(&mut self, error: &RegionError) {
        self.notifications.raise(
            NotificationLevel::Warning,
            format!("{error}. The map is shown without ward boundaries; enter ward codes instead."),
            Utc::now(),
        );
    }

    /// Starts a bulk load.
    #[must_use]
    pub const fn begin_bulk_load(&self) -> BulkTicket {
        BulkTicket {
            issued_after: self.last_request_id,
        }
    }

    /// Commits a bulk load. Regions whose entry came from a selection
    /// issued after the bulk load started keep that entry. Returns the
    /// number of regions committed.
    pub fn commit_bulk(&mut self, ticket: BulkTicket, batch: &BatchPredictions) -> usize {
        let mut committed = 0;

        for raw in &batch.predictions {
            let Some(code) = raw.ward_code() else {
                log::warn!("bulk prediction without a ward code skipped");
                continue;
            };

            if self
                .committed_by
                .get(&code)
                .is_some_and(|&id| id > ticket.issued_after)
            {
                log::debug!("bulk entry for {code} skipped: newer selection already committed");
                continue;
            }

            self.risk.commit(&code, flood_map_risk::normalize(raw));
            self.committed_by.insert(code, ticket.issued_after);
            committed += 1;
        }

        log::info!("bulk load committed {committed} of {} regions", batch.predictions.len());
        committed
    }

    /// Reports a failed bulk load.
    pub fn on_bulk_failure(&mut self, error: &ApiError) {
        self.notifications
            .raise(NotificationLevel::Warning, error.user_message(), Utc::now());
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        let current = self.selection.pending_request_id == Some(ticket.request_id)
            && self.selection.is_selected(&ticket.region);

        if !current {
            log::debug!(
                "discard stale result for {} (request #{}, current {:?})",
                ticket.region,
                ticket.request_id,
                self.selection.pending_request_id,
            );
        }

        current
    }

    fn settle(&mut self, region: &str) {
        self.selection.pending_request_id = None;
        self.selection.loading = false;
        self.phase = SelectionPhase::Settled {
            region: region.to_string(),
        };
    }
}
