#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client for the flood prediction backend.
//!
//! One function per backend operation. Every function validates its own
//! input before touching the network, sends a request with a fixed
//! 10-second timeout, and classifies every failure into exactly one
//! [`ApiError`] variant. Callers never see a raw `reqwest` error.
//!
//! The operations the selection controller depends on are also exposed
//! through the [`PredictionBackend`] trait so the controller can be driven
//! by an in-memory backend.

pub mod client;
pub mod validate;

use flood_map_api_models::{BatchPredictions, HealthStatus, WeatherReading};
use flood_map_risk_models::RawPrediction;
use thiserror::Error;

pub use client::{ApiClient, REQUEST_TIMEOUT};

/// Every failure the client can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The input was rejected before any request was sent.
    #[error("Invalid input: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// The backend is up but its models are not loaded.
    #[error("Prediction service unavailable{}", fmt_detail(.detail.as_deref()))]
    ServiceUnavailable {
        /// Server-provided detail, if any.
        detail: Option<String>,
    },

    /// The backend has no data for the requested resource.
    #[error("Not found{}", fmt_detail(.detail.as_deref()))]
    NotFound {
        /// Server-provided detail, if any.
        detail: Option<String>,
    },

    /// No response was received (timeout, DNS, connection refused).
    #[error("Network error: {message}")]
    Network {
        /// Transport-level description.
        message: String,
    },

    /// Any other non-success response, or an undecodable success body.
    #[error("Server error (HTTP {status}){}", fmt_detail(.detail.as_deref()))]
    Server {
        /// HTTP status code.
        status: u16,
        /// Server-provided detail, if any.
        detail: Option<String>,
    },
}

fn fmt_detail(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    /// Text suitable for showing to the user in a notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message } => format!("Invalid request: {message}"),
            Self::ServiceUnavailable { .. } => {
                "Prediction models are not loaded. Start training with `flood_map retrain`, \
                 or wait a moment and retry."
                    .to_string()
            }
            Self::NotFound { .. } => "No prediction data is available for this ward.".to_string(),
            Self::Network { .. } => {
                "Could not reach the prediction backend. Check that the backend server is \
                 running and reachable."
                    .to_string()
            }
            Self::Server { status, detail } => match detail {
                Some(detail) => format!("The prediction backend failed (HTTP {status}): {detail}"),
                None => format!("The prediction backend failed (HTTP {status})."),
            },
        }
    }

    /// Whether retrying the same request can succeed without the user
    /// changing the input.
    #[must_use]
    pub const fn is_user_retryable(&self) -> bool {
        !matches!(self, Self::Validation { .. })
    }
}

/// The backend operations the selection controller drives.
#[async_trait::async_trait]
pub trait PredictionBackend: Send + Sync {
    /// `POST /predict/ward/{code}`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails.
    async fn predict_region(&self, code: &str) -> Result<RawPrediction, ApiError>;

    /// `GET /weather/current/{code}`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails.
    async fn current_weather(&self, code: &str) -> Result<WeatherReading, ApiError>;

    /// `GET /predict/all-wards`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails.
    async fn all_region_predictions(&self) -> Result<BatchPredictions, ApiError>;

    /// `GET /health`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails.
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_message_points_at_backend() {
        let err = ApiError::Network {
            message: "connection refused".to_string(),
        };
        assert!(err.user_message().contains("backend server is running"));
        assert!(err.is_user_retryable());
    }

    #[test]
    fn server_message_includes_detail() {
        let err = ApiError::Server {
            status: 500,
            detail: Some("Prediction error: boom".to_string()),
        };
        assert!(err.user_message().contains("Prediction error: boom"));
        assert_eq!(
            err.to_string(),
            "Server error (HTTP 500): Prediction error: boom"
        );
    }

    #[test]
    fn validation_is_not_retryable() {
        let err = ApiError::Validation {
            message: "bad".to_string(),
        };
        assert!(!err.is_user_retryable());
    }

    #[test]
    fn unavailable_message_names_retrain_command() {
        let err = ApiError::ServiceUnavailable { detail: None };
        assert!(err.user_message().contains("flood_map retrain"));
        assert!(err.is_user_retryable());
    }

    #[test]
    fn display_without_detail() {
        let err = ApiError::ServiceUnavailable { detail: None };
        assert_eq!(err.to_string(), "Prediction service unavailable");
    }
}
