mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use geoshield_cache::{RequestCache, SqliteCacheStore};
use geoshield_core::{AppError, Config, DatabaseError};
use geoshield_fetch::ResilientFetcher;
use geoshield_prefetch::PrefetchScheduler;
use geoshield_weather::{CurrentConditions, DirectionsClient, SqliteLocationSource, WeatherClient};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    geoshield_core::init()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let validation = config.validate();
    if !validation.is_valid() {
        anyhow::bail!("Configuration validation failed: {}", validation.error_summary());
    }
    for warning in &validation.warnings {
        tracing::debug!("Config warning: {}", warning);
    }

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, config: &Config) -> Result<(), AppError> {
    let store = SqliteCacheStore::open(&config.cache.database_path)?;
    let cache = RequestCache::new(Arc::new(store));
    let fetcher = ResilientFetcher::new(
        cache.clone(),
        Duration::from_secs(config.http.timeout_secs),
    )?;

    match command {
        Commands::Weather { lat, lon, raw } => {
            let client = WeatherClient::new(fetcher, &config.weather, &config.retry);
            let payload = client.current(lat, lon).await?;
            if raw {
                print_json(&payload)?;
            } else {
                let conditions = CurrentConditions::from_payload(&payload)?;
                print_json(&conditions)?;
            }
        }

        Commands::Directions {
            from_lat,
            from_lng,
            to_lat,
            to_lng,
            mode,
        } => {
            let client = DirectionsClient::new(fetcher, &config.directions, &config.retry);
            let route = client
                .route((from_lat, from_lng), (to_lat, to_lng), &mode)
                .await?;
            print_json(&route)?;
        }

        Commands::Prefetch { percentage } => {
            let source = SqliteLocationSource::open(&config.locations.database_path)
                .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
            let client = WeatherClient::new(fetcher, &config.weather, &config.retry);
            let scheduler = PrefetchScheduler::new(Arc::new(source), Arc::new(client));

            let percentage = percentage.unwrap_or(config.prefetch.default_percentage);
            let ack = scheduler.start(percentage).await?;
            println!("Prefetch job {} started for {} groups", ack.job_id, ack.sample_size);

            if let Some(report) = scheduler.wait().await {
                println!(
                    "Prefetch job {} {}: {} warmed, {} failed",
                    report.job_id,
                    report.state,
                    report.succeeded(),
                    report.failed
                );
            }
        }

        Commands::Purge {
            pattern,
            max_age_secs,
        } => {
            let removed = cache.purge(&pattern, Duration::from_secs(max_age_secs))?;
            println!("Removed {} cache entries", removed);
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{}", rendered);
    Ok(())
}
