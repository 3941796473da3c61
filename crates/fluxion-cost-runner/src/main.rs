// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use fluxion_cost::calendar::is_request_time;
use fluxion_cost::config::load_devices;
use fluxion_cost::schedule::resolve;
use fluxion_cost::{
    ConfigProvider, DeviceConfig, DispatchHandler, JsonFileConfig, JsonLinesSink, PriceOverride,
    ResultSink, SqliteMeasurementStore, TIMESTAMP_FORMAT, TracingSink,
};

/// How often `watch` compares the clock with the request time
const WATCH_TICK: Duration = Duration::from_secs(30);

type Handler =
    DispatchHandler<SqliteMeasurementStore, Box<dyn ResultSink>, Box<dyn ConfigProvider>>;

#[derive(Parser)]
#[command(name = "fluxion-cost", version)]
#[command(about = "Daily, monthly and yearly energy cost reports for metered devices", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file (general settings and devices)
    #[arg(short, long, env = "FLUXION_COST_CONFIG", default_value = "cost_config.json")]
    config: PathBuf,

    /// Path to the SQLite measurement database
    #[arg(short, long, env = "FLUXION_COST_DB", default_value = "measurements.db")]
    database: PathBuf,

    /// Append reports as JSON lines to this file instead of logging them
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the configured price per kWh
    #[arg(long)]
    price: Option<f64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single dispatch tick
    Run {
        /// Timestamp of the tick (`YYYY-MM-DD HH:MM:SS`, UTC), defaults to now
        #[arg(long)]
        now: Option<String>,

        /// Only dispatch this device
        #[arg(long)]
        device: Option<String>,
    },
    /// Dispatch all devices once a day at the configured request time
    Watch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set default tracing subscriber")?;

    let handler = build_handler(&cli);

    match cli.command {
        Command::Run { now, device } => {
            let now = match now {
                Some(value) => NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
                    .with_context(|| format!("Invalid --now timestamp '{value}'"))?,
                None => Utc::now().naive_utc(),
            };
            let devices = load_devices(&cli.config).with_context(|| {
                format!("Failed to load devices from {}", cli.config.display())
            })?;
            let reports = run_tick(&handler, &devices, now, device.as_deref());
            info!("Dispatch finished, {reports} report(s) emitted");
            Ok(())
        }
        Command::Watch => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;
            runtime.block_on(watch(Arc::new(handler), cli.config))
        }
    }
}

fn build_handler(cli: &Cli) -> Handler {
    let store = SqliteMeasurementStore::new(&cli.database);

    let sink: Box<dyn ResultSink> = match &cli.output {
        Some(path) => {
            info!("Writing cost reports to {}", path.display());
            Box::new(JsonLinesSink::new(path))
        }
        None => Box::new(TracingSink),
    };

    let file_config = JsonFileConfig::new(&cli.config);
    let config: Box<dyn ConfigProvider> = match cli.price {
        Some(price) => {
            let config = PriceOverride::new(price, file_config);
            info!("Using price override of {:.3} per kWh", config.price_per_kwh());
            Box::new(config)
        }
        None => Box::new(file_config),
    };

    DispatchHandler::new(store, sink, config)
}

/// Dispatch every (or the selected) device at `now`; returns the number of reports
fn run_tick(
    handler: &Handler,
    devices: &[DeviceConfig],
    now: NaiveDateTime,
    only: Option<&str>,
) -> usize {
    let mut reports = 0;

    for device in devices {
        if only.is_some_and(|name| name != device.name) {
            continue;
        }

        let schedule = resolve(&device.settings);
        if !schedule.is_active() {
            debug!(device = %device.name, "No cost calculation requested");
            continue;
        }

        match handler.dispatch(device, &schedule, now) {
            Ok(records) => {
                debug!(device = %device.name, reports = records.len(), "Device dispatched");
                reports += records.len();
            }
            Err(err) => error!(device = %device.name, "Cost calculation failed: {err}"),
        }
    }

    if let Some(name) = only
        && !devices.iter().any(|device| device.name == name)
    {
        warn!("Device '{name}' not found in configuration");
    }

    reports
}

async fn watch(handler: Arc<Handler>, config_path: PathBuf) -> Result<()> {
    info!(
        "Watching for request time {} (config {})",
        handler.config().request_time(),
        config_path.display()
    );

    let mut interval = tokio::time::interval(WATCH_TICK);
    let mut last_run: Option<NaiveDate> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }

        let now = Utc::now().naive_utc();
        if last_run == Some(now.date()) || !is_request_time(now, &handler.config().request_time())
        {
            continue;
        }
        last_run = Some(now.date());

        let devices = match load_devices(&config_path) {
            Ok(devices) => devices,
            Err(err) => {
                error!("Failed to load devices from {}: {err}", config_path.display());
                continue;
            }
        };

        let tick_handler = Arc::clone(&handler);
        let reports =
            tokio::task::spawn_blocking(move || run_tick(&tick_handler, &devices, now, None))
                .await
                .context("Dispatch task panicked")?;
        info!("Dispatch at {now} finished, {reports} report(s) emitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxion_cost::{DeviceSettings, MeasurementSample, StaticConfig};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn daily(name: &str) -> DeviceConfig {
        DeviceConfig::new(
            name,
            DeviceSettings {
                cost_calc_day: true,
                update_time: Some(3600.0),
                ..DeviceSettings::default()
            },
        )
    }

    #[test]
    fn test_run_tick_filters_devices() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMeasurementStore::new(dir.path().join("measurements.db"));
        store.init_schema().unwrap();
        for device in ["washer", "dryer"] {
            store
                .insert_sample(
                    device,
                    at(1, 12),
                    MeasurementSample {
                        energy_wh: 750.0,
                        fetch_success: true,
                    },
                )
                .unwrap();
        }

        let output = dir.path().join("costs.jsonl");
        let handler: Handler = DispatchHandler::new(
            store,
            Box::new(JsonLinesSink::new(&output)),
            Box::new(StaticConfig::new(0.3)),
        );
        let devices = vec![
            daily("washer"),
            daily("dryer"),
            DeviceConfig::new("idle", DeviceSettings::default()),
        ];

        assert_eq!(run_tick(&handler, &devices, at(2, 0), Some("washer")), 1);
        assert_eq!(run_tick(&handler, &devices, at(2, 0), None), 2);
        assert_eq!(run_tick(&handler, &devices, at(2, 0), Some("unknown")), 0);

        let lines = std::fs::read_to_string(&output).unwrap();
        assert_eq!(lines.lines().count(), 3);
        assert!(lines.contains("\"key\":\"washer_day\""));
        assert!(lines.contains("\"key\":\"dryer_day\""));
    }
}
