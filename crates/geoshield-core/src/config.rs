use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "GEOSHIELD_CONFIG";
/// Environment fallback for the OpenWeather API key.
pub const WEATHER_API_KEY_ENV: &str = "WEATHER_API_KEY";
/// Environment fallback for the Google Maps API key.
pub const DIRECTIONS_API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Summarize all errors in one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Response cache storage
    #[serde(default)]
    pub cache: CacheConfig,

    /// Raw location points used to build prefetch groups
    #[serde(default)]
    pub locations: LocationsConfig,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry/backoff settings shared by all upstream calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Weather API settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Directions API settings
    #[serde(default)]
    pub directions: DirectionsConfig,

    /// Background prefetch settings
    #[serde(default)]
    pub prefetch: PrefetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite file holding the `api_cache` table
    pub database_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("cache.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsConfig {
    /// SQLite file holding the `Location` table
    pub database_path: PathBuf,
}

impl Default for LocationsConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("safety_map.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_retries: u32,
    /// First exponential backoff delay (doubles each attempt)
    pub initial_delay_ms: u64,
    /// Upper bound for exponential backoff
    pub max_delay_ms: u64,
    /// Delay used by fixed-delay call sites
    pub fixed_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
            fixed_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Current-conditions endpoint
    pub base_url: String,

    /// Unit system passed upstream
    pub units: String,

    /// Freshness for foreground reads, in seconds
    pub max_age_secs: u64,

    /// Freshness for prefetch warming, in seconds
    pub prefetch_max_age_secs: u64,

    /// OpenWeather API key (falls back to `WEATHER_API_KEY`, never saved)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.openweathermap.org/data/2.5/weather".to_string(),
            units: "metric".to_string(),
            max_age_secs: 900,
            prefetch_max_age_secs: 720,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsConfig {
    /// Directions endpoint
    pub base_url: String,

    /// Freshness in seconds; absent means cached routes never expire
    #[serde(default)]
    pub max_age_secs: Option<u64>,

    /// Google Maps API key (falls back to `GOOGLE_MAPS_API_KEY`, never saved)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/directions/json".to_string(),
            max_age_secs: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Share of location groups warmed when no percentage is given
    pub default_percentage: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            default_percentage: 100.0,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geoshield")
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist.
    ///
    /// API keys missing from the file are filled in from the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration and reject it if validation finds errors
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Fill unset API keys from their environment variables
    pub fn apply_env(&mut self) {
        if self.weather.api_key.is_none() {
            self.weather.api_key = env_secret(WEATHER_API_KEY_ENV);
        }
        if self.directions.api_key.is_none() {
            self.directions.api_key = env_secret(DIRECTIONS_API_KEY_ENV);
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(&self.weather.base_url, "weather.base_url", &mut result);
        validate_url(&self.directions.base_url, "directions.base_url", &mut result);

        if self.http.timeout_secs == 0 {
            result.add_error("http.timeout_secs", "Timeout must be greater than 0");
        }

        if self.retry.max_retries == 0 {
            result.add_warning(
                "retry.max_retries",
                "0 attempts requested; every request will be tried once",
            );
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            result.add_warning(
                "retry.initial_delay_ms",
                "Initial backoff exceeds the maximum; every delay will be capped",
            );
        }

        if self.weather.max_age_secs == 0 {
            result.add_warning("weather.max_age_secs", "Weather responses expire immediately");
        }

        if !(0.0..=100.0).contains(&self.prefetch.default_percentage) {
            result.add_warning(
                "prefetch.default_percentage",
                "Percentage outside 0-100 selects one group or all groups",
            );
        }

        if self.weather.api_key.is_none() {
            result.add_warning(
                "weather.api_key",
                format!("Not configured - set {} to enable weather", WEATHER_API_KEY_ENV),
            );
        }
        if self.directions.api_key.is_none() {
            result.add_warning(
                "directions.api_key",
                format!("Not configured - set {} to enable directions", DIRECTIONS_API_KEY_ENV),
            );
        }

        result
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to `path`. API keys are never written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("geoshield");

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }
            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.directions.base_url = "ftp://maps.example.com/directions".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_missing_keys_are_warnings() {
        let mut config = Config::default();
        config.weather.api_key = None;
        config.directions.api_key = None;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
        assert!(result.warnings.iter().any(|w| w.field == "directions.api_key"));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.weather.max_age_secs, 900);
        assert_eq!(config.weather.prefetch_max_age_secs, 720);
    }

    #[test]
    fn test_api_keys_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.weather.api_key = Some("super-secret".to_string());
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("super-secret"));
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[retry]\nmax_retries = 5\ninitial_delay_ms = 10\n\
             max_delay_ms = 100\nfixed_delay_ms = 10\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.prefetch.default_percentage, 100.0);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
