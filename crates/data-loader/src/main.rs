//! data-loader: fetch PurpleAir history, quality-control it and persist PM2.5 series.
//!
//! For each region, reads `{QC_SENSORS_DIR}/{region}.csv` and for every sensor
//! fetches the last 24h (raw) and last 7d (hourly averages), runs the quality
//! control engine and writes `24h_` / `7d_` series under `{QC_DATA_DIR}/{region}`.
//!
//! Usage:
//!   cargo run -p data-loader
//!   cargo run -p data-loader -- --region patras --region thermi
//!   cargo run -p data-loader -- --dry-run --concurrency 4

mod config;
mod pipeline;

use anyhow::Context;
use chrono::Utc;
use config::LoaderConfig;
use pipeline::process_sensor;
use purpleair_client::{read_sensor_registry, PurpleAirClient};
use quality_control::{QcConfig, QualityControlEngine};
use sensor_core::{SeriesSink, TelemetrySource};
use series_store::{CsvSeriesSink, SqliteSeriesSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "data_loader=info,purpleair_client=info,series_store=info,quality_control=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = LoaderConfig::from_env()?.apply_args(&args)?;

    tracing::info!("{} START {}", "-".repeat(15), "-".repeat(15));
    tracing::info!(
        "data-loader: regions={:?}, ratio_threshold={}, concurrency={}, dry_run={}",
        config.regions, config.ratio_threshold, config.concurrency, config.dry_run
    );

    let source: Arc<dyn TelemetrySource> = Arc::new(PurpleAirClient::new(config.read_key.clone()));
    let engine = Arc::new(QualityControlEngine::new(QcConfig::new(config.ratio_threshold)?));

    let sqlite = match &config.sqlite_url {
        Some(url) => Some(
            SqliteSeriesSink::connect(url)
                .await
                .with_context(|| format!("opening {}", url))?,
        ),
        None => None,
    };

    let mut failed_regions = 0;
    for region in &config.regions {
        tracing::info!("{} Running task for region: {} {}", "-".repeat(10), region, "-".repeat(10));

        let mut sinks: Vec<Arc<dyn SeriesSink>> = vec![Arc::new(CsvSeriesSink::new(config.data_dir.join(region)))];
        if let Some(db) = &sqlite {
            sinks.push(Arc::new(db.clone()));
        }

        match run_region(region, &config, Arc::clone(&source), Arc::clone(&engine), Arc::new(sinks)).await {
            Ok(failed) => {
                tracing::info!(
                    "{} Finished task for region: {} ({} sensors failed) {}",
                    "-".repeat(10), region, failed, "-".repeat(10)
                );
            }
            Err(e) => {
                failed_regions += 1;
                tracing::error!("Region {} failed: {:#}", region, e);
            }
        }
    }

    if failed_regions > 0 {
        anyhow::bail!("{} of {} regions failed", failed_regions, config.regions.len());
    }
    tracing::info!("{} SUCCESS {}", "-".repeat(15), "-".repeat(15));
    Ok(())
}

/// Process every sensor of one region; returns how many sensors failed
async fn run_region(
    region: &str,
    config: &LoaderConfig,
    source: Arc<dyn TelemetrySource>,
    engine: Arc<QualityControlEngine>,
    sinks: Arc<Vec<Arc<dyn SeriesSink>>>,
) -> anyhow::Result<u64> {
    let registry = config.sensors_dir.join(format!("{}.csv", region));
    let sensors = read_sensor_registry(&registry)
        .with_context(|| format!("reading sensor registry {}", registry.display()))?;
    let total = sensors.len();

    let now = Utc::now();
    let completed = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let mut handles = Vec::with_capacity(total);

    for sensor in sensors {
        let source = Arc::clone(&source);
        let engine = Arc::clone(&engine);
        let sinks = Arc::clone(&sinks);
        let completed = Arc::clone(&completed);
        let failed = Arc::clone(&failed);
        let semaphore = Arc::clone(&semaphore);
        let alert_threshold = config.alert_threshold;
        let dry_run = config.dry_run;

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let result = process_sensor(
                source.as_ref(),
                engine.as_ref(),
                sinks.as_slice(),
                &sensor,
                now,
                alert_threshold,
                dry_run,
            )
            .await;

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            match result {
                Ok(summary) => {
                    match summary.last_reading {
                        Some(last) => tracing::info!(
                            "[{}/{}] {} => last PM2.5 {:.1} at {}",
                            done, total, sensor.name, last.value, last.timestamp
                        ),
                        None => tracing::info!("[{}/{}] {} => no valid reading", done, total, sensor.name),
                    }
                    if dry_run {
                        match serde_json::to_string(&summary) {
                            Ok(json) => tracing::info!("{}", json),
                            Err(e) => tracing::warn!("{}: could not serialize summary: {}", sensor.name, e),
                        }
                    }
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("[{}/{}] {} failed: {:#}", done, total, sensor.name, e);
                }
            }
        }));
    }

    let aborted = join_sensor_tasks(handles).await;

    Ok(failed.load(Ordering::Relaxed) + aborted)
}

/// Wait for every sensor task; returns how many panicked or were cancelled
async fn join_sensor_tasks(handles: Vec<JoinHandle<()>>) -> u64 {
    let mut aborted = 0;
    for handle in handles {
        if let Err(e) = handle.await {
            aborted += 1;
            tracing::warn!("Sensor task did not finish: {}", e);
        }
    }
    aborted
}
