//! Polls the Min Renovasjon calendar for one address and reports a sensor per fraction.

mod config;
mod sensor;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use renovasjon_core::{CalendarCache, RefreshOutcome, SystemClock};
use renovasjon_provider_norkart::NorkartCalendarPort;
use reqwest::Client;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::sensor::{FractionSensor, SensorGroup};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Arguments {
    /// path to the configuration file
    #[arg(long, env = "RENOVASJON_CONFIG", default_value = "renovasjon.toml")]
    config: PathBuf,
    /// report the sensors once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Arguments::parse();
    let config = config::load(&args.config)?;

    // HTTP + calendar setup
    let client = Client::builder()
        .user_agent(concat!("renovasjon/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout)
        .build()?;
    let port = Arc::new(NorkartCalendarPort::with_base_url(client, config.base_url));
    let calendar = Arc::new(
        CalendarCache::load(port, Arc::new(SystemClock), config.address, config.cache).await?,
    );

    let group = SensorGroup::new(calendar, config.fraction_ids);

    report(group.sensors());
    if args.once {
        return Ok(());
    }

    let mut ticker = interval(config.scan_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick fires immediately and the calendar was just loaded
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                update(&group).await;
                report(group.sensors());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn update(group: &SensorGroup) {
    match group.update().await {
        Ok(RefreshOutcome::Fresh) => {}
        Ok(outcome) => info!(?outcome, "calendar refreshed"),
        // keep serving the previous calendar, the next tick tries again
        Err(err) => error!(error = %err, "refresh failed"),
    }
}

fn report(sensors: &[FractionSensor]) {
    for sensor in sensors {
        let Some(name) = sensor.name() else {
            info!(fraction = %sensor.fraction_id(), "sensor has no data");
            continue;
        };
        let state = sensor.state();
        let picture = sensor.entity_picture();

        info!(
            fraction = %sensor.fraction_id(),
            %name,
            state = state.as_deref().unwrap_or("unknown"),
            picture = picture.as_deref().unwrap_or_default(),
            "sensor"
        );
    }
}
