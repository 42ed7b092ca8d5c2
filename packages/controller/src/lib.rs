#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Selection state machine and session driver for the flood map.
//!
//! [`SelectionController`] is the only writer of [`SelectionState`] and
//! [`AppRiskState`]. It hands out a [`FetchTicket`] per selection; a fetch
//! result may only commit while its ticket's request id is the most recent
//! one issued ("last select wins"). [`Session`] wires the controller to a
//! [`PredictionBackend`](flood_map_api::PredictionBackend) and applies
//! results one at a time.

pub mod notification;
pub mod selection;
pub mod session;
pub mod state;

use thiserror::Error;

pub use notification::{Notification, NotificationCenter, NotificationLevel};
pub use selection::{BulkTicket, FetchOutcome, FetchTicket, SelectionController};
pub use session::{Session, SessionEvent, SessionUpdate};
pub use state::{AppRiskState, SelectionPhase, SelectionState};

/// Failures of the session driver itself. Backend failures are never
/// reported here; they become notifications.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A fetch task panicked or was cancelled.
    #[error("Fetch task failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },
}
