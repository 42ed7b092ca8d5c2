//! Input validation run before any request is sent.

use flood_map_api_models::{BAYESIAN_FEATURE_COUNT, WeatherInput};
use flood_map_region_models::{LatLon, normalize_code};

use crate::ApiError;

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation {
        message: message.into(),
    }
}

/// Normalizes a ward code, rejecting blank input.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if the code is empty after trimming.
pub fn ward_code(code: &str) -> Result<String, ApiError> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(invalid("ward code must not be empty"));
    }
    Ok(code)
}

/// Checks a probabilistic-network feature series.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] unless the series has exactly
/// [`BAYESIAN_FEATURE_COUNT`] entries, all finite.
pub fn feature_series(features: &[f64]) -> Result<(), ApiError> {
    if features.len() != BAYESIAN_FEATURE_COUNT {
        return Err(invalid(format!(
            "expected {BAYESIAN_FEATURE_COUNT} feature values, got {}",
            features.len()
        )));
    }

    if let Some(i) = features.iter().position(|v| !v.is_finite()) {
        return Err(invalid(format!("feature value #{} is not a finite number", i + 1)));
    }

    Ok(())
}

/// Checks custom weather conditions.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if any value is non-finite, rainfall
/// or wind speed is negative, or humidity is outside 0-100.
pub fn weather_input(input: &WeatherInput) -> Result<(), ApiError> {
    let fields = [
        ("rainfall_mm", input.rainfall_mm),
        ("rainfall_24hr", input.rainfall_24hr),
        ("tide_level_m", input.tide_level_m),
        ("temperature_c", input.temperature_c),
        ("humidity_percent", input.humidity_percent),
        ("wind_speed_kmh", input.wind_speed_kmh),
    ];

    for (name, value) in fields {
        if !value.is_finite() {
            return Err(invalid(format!("{name} must be a finite number")));
        }
    }

    for (name, value) in [
        ("rainfall_mm", input.rainfall_mm),
        ("rainfall_24hr", input.rainfall_24hr),
        ("wind_speed_kmh", input.wind_speed_kmh),
    ] {
        if value < 0.0 {
            return Err(invalid(format!("{name} must not be negative")));
        }
    }

    if !(0.0..=100.0).contains(&input.humidity_percent) {
        return Err(invalid("humidity_percent must be between 0 and 100"));
    }

    if input.season.trim().is_empty() {
        return Err(invalid("season must not be empty"));
    }

    Ok(())
}

/// Checks a coordinate pair.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] if the point is out of range.
pub fn location(label: &str, point: LatLon) -> Result<(), ApiError> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(invalid(format!("{label} ({point}) is not a valid coordinate")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_series_requires_exactly_fifteen() {
        assert!(feature_series(&[0.5; 15]).is_ok());
        assert!(matches!(
            feature_series(&[0.5; 14]),
            Err(ApiError::Validation { .. })
        ));
        assert!(matches!(
            feature_series(&[0.5; 16]),
            Err(ApiError::Validation { .. })
        ));
    }

    #[test]
    fn feature_series_rejects_non_finite() {
        let mut series = [1.0; 15];
        series[3] = f64::NAN;
        let err = feature_series(&series).unwrap_err();
        assert!(err.to_string().contains("#4"));
    }

    #[test]
    fn weather_input_bounds() {
        assert!(weather_input(&WeatherInput::default()).is_ok());

        let wet = WeatherInput {
            humidity_percent: 120.0,
            ..WeatherInput::default()
        };
        assert!(weather_input(&wet).is_err());

        let negative = WeatherInput {
            rainfall_mm: -1.0,
            ..WeatherInput::default()
        };
        assert!(weather_input(&negative).is_err());

        let cold = WeatherInput {
            temperature_c: -5.0,
            ..WeatherInput::default()
        };
        assert!(weather_input(&cold).is_ok());
    }

    #[test]
    fn ward_codes() {
        assert_eq!(ward_code(" h/e ").unwrap(), "H/E");
        assert!(ward_code("   ").is_err());
    }

    #[test]
    fn locations() {
        assert!(location("origin", LatLon::new(19.07, 72.87)).is_ok());
        assert!(location("origin", LatLon::new(19.07, 272.87)).is_err());
    }
}
