//! Runtime configuration from the environment, overridable by flags.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_BOUNDARY_PATH: &str = "data/mumbai_wards.geojson";
const DEFAULT_REFRESH_SECS: u64 = 300;
const DEFAULT_NOTIFICATION_TTL_SECS: i64 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub boundary_path: PathBuf,
    /// `None` disables the periodic weather refresh.
    pub refresh: Option<Duration>,
    pub notification_ttl: TimeDelta,
}

impl Config {
    /// Reads `FLOOD_API_URL`, `FLOOD_BOUNDARY_PATH`,
    /// `FLOOD_WEATHER_REFRESH_SECS`, and `FLOOD_NOTIFICATION_TTL_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = lookup("FLOOD_API_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let boundary_path = lookup("FLOOD_BOUNDARY_PATH")
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_BOUNDARY_PATH), PathBuf::from);

        let refresh_secs = lookup("FLOOD_WEATHER_REFRESH_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_REFRESH_SECS);

        let ttl_secs = lookup("FLOOD_NOTIFICATION_TTL_SECS")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_NOTIFICATION_TTL_SECS);

        Self {
            api_url,
            boundary_path,
            refresh: refresh_from_secs(refresh_secs),
            notification_ttl: TimeDelta::seconds(ttl_secs),
        }
    }

    /// Applies command-line overrides.
    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        boundary_path: Option<PathBuf>,
        refresh_secs: Option<u64>,
    ) -> Self {
        if let Some(api_url) = api_url {
            self.api_url = api_url;
        }
        if let Some(boundary_path) = boundary_path {
            self.boundary_path = boundary_path;
        }
        if let Some(secs) = refresh_secs {
            self.refresh = refresh_from_secs(secs);
        }
        self
    }
}

fn refresh_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
