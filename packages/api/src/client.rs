//! `reqwest`-backed implementation of every backend operation.

use std::time::Duration;

use chrono::Utc;
use flood_map_api_models::{
    BatchPredictions, BatchSummary, BayesianRequest, ComprehensiveRequest, HealthStatus,
    ModelInfo, NearestSafeZoneRequest, RetrainStatus, SafeRoute, SafeRouteRequest, SafeZone,
    WardClusters, WeatherInput, WeatherReading,
};
use flood_map_region_models::LatLon;
use flood_map_risk_models::RawPrediction;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::{ApiError, PredictionBackend, validate};

/// Timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of a non-JSON error body carried as detail.
const DETAIL_PREVIEW_LEN: usize = 200;

/// Client for the flood prediction backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: reqwest::Client,
}

impl ApiClient {
    /// Creates a client for the backend at `base_url`
    /// (e.g. `"http://localhost:8000"`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the URL cannot be used as a base
    /// and [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::Validation {
            message: format!("invalid backend URL '{base_url}': {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Validation {
                message: format!("backend URL '{base_url}' cannot be used as a base"),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { base_url, client })
    }

    /// The backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /predict/custom?ward_code={code}` with explicit weather.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for a blank code or out-of-range
    /// weather, otherwise any classified request failure.
    pub async fn predict_custom(
        &self,
        code: &str,
        weather: &WeatherInput,
    ) -> Result<RawPrediction, ApiError> {
        let code = validate::ward_code(code)?;
        validate::weather_input(weather)?;

        let mut url = self.endpoint(&["predict", "custom"])?;
        url.query_pairs_mut().append_pair("ward_code", &code);

        let body = self.send(self.client.post(url).json(weather)).await?;
        Ok(RawPrediction::new(body, Utc::now()))
    }

    /// `POST /predict-comprehensive`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for a blank code or out-of-range
    /// weather, otherwise any classified request failure.
    pub async fn predict_comprehensive(
        &self,
        request: &ComprehensiveRequest,
    ) -> Result<RawPrediction, ApiError> {
        let ward_code = validate::ward_code(&request.ward_code)?;
        if let Some(weather) = &request.weather {
            validate::weather_input(weather)?;
        }
        let request = ComprehensiveRequest {
            ward_code,
            weather: request.weather.clone(),
        };

        let url = self.endpoint(&["predict-comprehensive"])?;
        let body = self.send(self.client.post(url).json(&request)).await?;
        Ok(RawPrediction::new(body, Utc::now()))
    }

    /// `POST /bayesian/predict`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] unless the series has exactly 15
    /// finite values, otherwise any classified request failure.
    pub async fn bayesian_predict(
        &self,
        request: &BayesianRequest,
    ) -> Result<RawPrediction, ApiError> {
        let ward_code = validate::ward_code(&request.ward_code)?;
        validate::feature_series(&request.features)?;
        let request = BayesianRequest {
            ward_code,
            features: request.features.clone(),
        };

        let url = self.endpoint(&["bayesian", "predict"])?;
        let body = self.send(self.client.post(url).json(&request)).await?;
        Ok(RawPrediction::new(body, Utc::now()))
    }

    /// `POST /routing/safe-route`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for out-of-range coordinates,
    /// otherwise any classified request failure.
    pub async fn safe_route(
        &self,
        origin: LatLon,
        destination: LatLon,
    ) -> Result<SafeRoute, ApiError> {
        validate::location("origin", origin)?;
        validate::location("destination", destination)?;

        let url = self.endpoint(&["routing", "safe-route"])?;
        let request = SafeRouteRequest {
            origin,
            destination,
        };
        self.send_decoded(self.client.post(url).json(&request)).await
    }

    /// `POST /routing/nearest-safe-zone`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for an out-of-range coordinate,
    /// otherwise any classified request failure.
    pub async fn nearest_safe_zone(&self, location: LatLon) -> Result<SafeZone, ApiError> {
        validate::location("location", location)?;

        let url = self.endpoint(&["routing", "nearest-safe-zone"])?;
        let request = NearestSafeZoneRequest { location };
        self.send_decoded(self.client.post(url).json(&request)).await
    }

    /// `GET /wards/clusters`
    ///
    /// # Errors
    ///
    /// Returns any classified request failure.
    pub async fn ward_clusters(&self) -> Result<WardClusters, ApiError> {
        let url = self.endpoint(&["wards", "clusters"])?;
        self.send_decoded(self.client.get(url)).await
    }

    /// `POST /models/retrain`. Training continues on the backend after this
    /// returns; [`PredictionBackend::health`] reports when it is done.
    ///
    /// # Errors
    ///
    /// Returns any classified request failure.
    pub async fn retrain_models(&self) -> Result<RetrainStatus, ApiError> {
        let url = self.endpoint(&["models", "retrain"])?;
        self.send_decoded(self.client.post(url)).await
    }

    /// `GET /models/info`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ServiceUnavailable`] while the models are not
    /// loaded, otherwise any classified request failure.
    pub async fn model_info(&self) -> Result<ModelInfo, ApiError> {
        let url = self.endpoint(&["models", "info"])?;
        self.send_decoded(self.client.get(url)).await
    }

    /// Builds an endpoint URL from path segments. Segments are
    /// percent-encoded, so ward codes containing `/` stay one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Validation {
                message: format!("backend URL '{}' cannot be used as a base", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request and returns the JSON body of a success response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value, ApiError> {
        let request = request.build().map_err(|e| ApiError::Validation {
            message: format!("could not build request: {e}"),
        })?;
        let method = request.method().clone();
        let url = request.url().clone();
        log::debug!("{method} {url}");

        let result = self.client.execute(request).await;
        let response = result.map_err(|e| {
            let err = classify_transport(&e);
            log::warn!("{method} {url} failed: {err}");
            err
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| classify_transport(&e))?;

        if !status.is_success() {
            let err = classify_status(status, &text);
            log::warn!("{method} {url} failed: {err}");
            return Err(err);
        }

        serde_json::from_str(&text).map_err(|e| {
            log::warn!("{method} {url} returned an undecodable body: {e}");
            ApiError::Server {
                status: status.as_u16(),
                detail: Some(format!("invalid JSON response: {e}")),
            }
        })
    }

    async fn send_decoded<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        decode(body)
    }
}

#[async_trait::async_trait]
impl PredictionBackend for ApiClient {
    async fn predict_region(&self, code: &str) -> Result<RawPrediction, ApiError> {
        let code = validate::ward_code(code)?;
        let url = self.endpoint(&["predict", "ward", &code])?;
        let body = self.send(self.client.post(url)).await?;
        Ok(RawPrediction::new(body, Utc::now()))
    }

    async fn current_weather(&self, code: &str) -> Result<WeatherReading, ApiError> {
        let code = validate::ward_code(code)?;
        let url = self.endpoint(&["weather", "current", &code])?;
        self.send_decoded(self.client.get(url)).await
    }

    async fn all_region_predictions(&self) -> Result<BatchPredictions, ApiError> {
        let url = self.endpoint(&["predict", "all-wards"])?;
        let body = self.send(self.client.get(url)).await?;
        parse_batch(body)
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = self.endpoint(&["health"])?;
        let body = self.send(self.client.get(url)).await?;
        Ok(HealthStatus::from_value(&body))
    }
}

/// Classifies a transport failure. Every transport failure means no
/// usable response arrived.
fn classify_transport(e: &reqwest::Error) -> ApiError {
    let kind = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_body() || e.is_decode() {
        "response body could not be read"
    } else {
        "request failed"
    };

    ApiError::Network {
        message: format!("{kind}: {e}"),
    }
}

/// Classifies a non-success HTTP status.
fn classify_status(status: StatusCode, body: &str) -> ApiError {
    let detail = extract_detail(body);

    match status {
        StatusCode::SERVICE_UNAVAILABLE => ApiError::ServiceUnavailable { detail },
        StatusCode::NOT_FOUND => ApiError::NotFound { detail },
        _ => ApiError::Server {
            status: status.as_u16(),
            detail,
        },
    }
}

/// Pulls the server's explanation out of an error body: the `detail` field
/// of a JSON body, otherwise a preview of the raw text.
fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match json.get("detail") {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                Some(s.trim().to_string())
            }
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
    }

    let preview: String = trimmed.chars().take(DETAIL_PREVIEW_LEN).collect();
    Some(preview)
}

fn parse_batch(body: serde_json::Value) -> Result<BatchPredictions, ApiError> {
    let received_at = Utc::now();

    let Some(items) = body.get("predictions").and_then(serde_json::Value::as_array) else {
        return Err(ApiError::Server {
            status: StatusCode::OK.as_u16(),
            detail: Some("batch response has no predictions array".to_string()),
        });
    };

    let predictions = items
        .iter()
        .map(|item| RawPrediction::new(item.clone(), received_at))
        .collect();

    let summary = body
        .get("summary")
        .cloned()
        .map(serde_json::from_value::<BatchSummary>)
        .and_then(Result::ok)
        .unwrap_or_default();

    Ok(BatchPredictions {
        predictions,
        summary,
    })
}

fn decode<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Server {
        status: StatusCode::OK.as_u16(),
        detail: Some(format!("unexpected response shape: {e}")),
    })
}
