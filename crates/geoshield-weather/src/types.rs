use geoshield_core::{AppError, NetworkError};
use geoshield_fetch::FetchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Travel mode for directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Walking,
    Bicycling,
}

impl TravelMode {
    /// Map a free-form activity name to a travel mode.
    /// Anything mentioning "ride" is a bike trip; everything else is on foot.
    pub fn from_activity(activity: &str) -> Self {
        if activity.to_lowercase().contains("ride") {
            Self::Bicycling
        } else {
            Self::Walking
        }
    }

    /// Value expected by the directions API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Bicycling => "bicycling",
        }
    }
}

/// A decoded route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub mode: TravelMode,
    /// (latitude, longitude) pairs along the overview polyline
    pub waypoints: Vec<(f64, f64)>,
}

/// Current conditions summarised from an OpenWeather payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
    pub place: Option<String>,
}

impl CurrentConditions {
    /// Extract the fields the CLI shows. Only the temperature is required.
    pub fn from_payload(payload: &Value) -> Result<Self, WeatherError> {
        let main = &payload["main"];
        let temperature = main["temp"]
            .as_f64()
            .ok_or_else(|| WeatherError::Parse("missing main.temp".to_string()))?;

        Ok(Self {
            temperature,
            feels_like: main["feels_like"].as_f64(),
            humidity: main["humidity"].as_f64(),
            wind_speed: payload["wind"]["speed"].as_f64(),
            description: payload["weather"][0]["description"]
                .as_str()
                .map(str::to_string),
            place: payload["name"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Directions provider errors
#[derive(Debug, thiserror::Error)]
pub enum DirectionsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The upstream answered, but with a non-OK status field
    #[error("Directions API returned {status}: {message}")]
    Api { status: String, message: String },
    #[error("Invalid polyline at byte {0}")]
    Polyline(usize),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<WeatherError> for AppError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::Fetch(e) => e.into(),
            WeatherError::Parse(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
        }
    }
}

impl From<DirectionsError> for AppError {
    fn from(err: DirectionsError) -> Self {
        match err {
            DirectionsError::Fetch(e) => e.into(),
            DirectionsError::Api { status, message } => {
                AppError::Service(format!("{}: {}", status, message))
            }
            other => AppError::Network(NetworkError::InvalidResponse(other.to_string())),
        }
    }
}
