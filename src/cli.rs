//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// geoshield - cached, retrying access to weather and directions APIs.
#[derive(Parser, Debug)]
#[command(name = "geoshield", author, version, about)]
pub struct Cli {
    /// Config file (defaults to $CONFIG_DIR/geoshield/config.toml).
    #[arg(long, global = true, env = "GEOSHIELD_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Current weather for a coordinate, served from cache when fresh.
    Weather {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Print the full upstream payload instead of a summary.
        #[arg(long)]
        raw: bool,
    },

    /// Route between two coordinates.
    Directions {
        #[arg(long, allow_negative_numbers = true)]
        from_lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        from_lng: f64,
        #[arg(long, allow_negative_numbers = true)]
        to_lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        to_lng: f64,
        /// Activity; anything mentioning "ride" is routed for bicycles.
        #[arg(long, default_value = "walk")]
        mode: String,
    },

    /// Warm the weather cache for a random share of location groups.
    Prefetch {
        /// Percentage of groups to warm (defaults to prefetch.default_percentage).
        #[arg(long, allow_negative_numbers = true)]
        percentage: Option<f64>,
    },

    /// Remove cache entries whose key starts with PATTERN and that are older than MAX_AGE_SECS.
    Purge {
        /// Regular expression matched at the start of each cache key.
        #[arg(long)]
        pattern: String,
        #[arg(long, default_value_t = 0)]
        max_age_secs: u64,
    },
}
