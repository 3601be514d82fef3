pub mod config;
pub mod error;
pub mod location;

pub use config::{
    CacheConfig, Config, DirectionsConfig, HttpConfig, LocationsConfig, PrefetchConfig,
    RetryConfig, ValidationResult, WeatherConfig,
};
pub use error::{AppError, ConfigError, DatabaseError, NetworkError};
pub use location::{
    group_locations, is_valid_coordinate, CoordinateResolver, LocationGroup, LocationSource,
    RawLocation,
};

use anyhow::Result;

/// Initialize logging for the geoshield binaries.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("geoshield core initialized");
    Ok(())
}
