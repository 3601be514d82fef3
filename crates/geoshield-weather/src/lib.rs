//! Concrete geodata providers on top of the resilient fetcher.
//!
//! Provides OpenWeather current conditions, Google Directions routes and a
//! SQLite-backed source of location groups for prefetching.

pub mod directions;
pub mod location;
pub mod types;
pub mod weather;

pub use directions::{decode_polyline, parse_route, DirectionsClient};
pub use location::SqliteLocationSource;
pub use types::*;
pub use weather::{round_coordinate, WeatherClient};
