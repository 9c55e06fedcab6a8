use async_trait::async_trait;
use sensor_core::{Pm25Point, Pm25Series, SensorError, SeriesKind, SeriesSink};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::{format_timestamp, parse_timestamp};

fn storage_err(e: sqlx::Error) -> SensorError {
    SensorError::StorageError(e.to_string())
}

/// Keeps every fused point keyed by (sensor, series kind, timestamp).
/// NaN is stored as NULL.
#[derive(Clone)]
pub struct SqliteSeriesSink {
    pool: SqlitePool,
}

impl SqliteSeriesSink {
    /// Wrap an existing pool and make sure the table exists
    pub async fn new(pool: SqlitePool) -> Result<Self, SensorError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pm25_series (
                sensor_name TEXT NOT NULL,
                label TEXT NOT NULL,
                time_stamp TEXT NOT NULL,
                pm25 REAL,
                PRIMARY KEY (sensor_name, label, time_stamp)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(storage_err)?;

        Ok(Self { pool })
    }

    /// Open (creating if needed) a database such as `sqlite:pm25.db`
    pub async fn connect(url: &str) -> Result<Self, SensorError> {
        let url = if url.starts_with("sqlite:") && !url.contains('?') && !url.contains(":memory:") {
            format!("{}?mode=rwc", url)
        } else {
            url.to_string()
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .map_err(storage_err)?;
        Self::new(pool).await
    }

    /// All stored points for a sensor and series kind, oldest first
    pub async fn load(&self, sensor_name: &str, kind: SeriesKind) -> Result<Pm25Series, SensorError> {
        let rows: Vec<(String, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT time_stamp, pm25
            FROM pm25_series
            WHERE sensor_name = ? AND label = ?
            ORDER BY time_stamp
            "#,
        )
        .bind(sensor_name)
        .bind(kind.label())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut points = Vec::with_capacity(rows.len());
        for (raw_ts, value) in rows {
            let timestamp = parse_timestamp(&raw_ts)
                .ok_or_else(|| SensorError::ParseError(format!("bad stored timestamp '{}'", raw_ts)))?;
            points.push(Pm25Point {
                timestamp,
                value: value.unwrap_or(f64::NAN),
            });
        }
        Ok(Pm25Series::new(points))
    }
}

#[async_trait]
impl SeriesSink for SqliteSeriesSink {
    async fn write(&self, sensor_name: &str, kind: SeriesKind, series: &Pm25Series) -> Result<(), SensorError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for point in &series.points {
            let value = if point.value.is_nan() { None } else { Some(point.value) };
            sqlx::query(
                r#"
                INSERT INTO pm25_series (sensor_name, label, time_stamp, pm25)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (sensor_name, label, time_stamp) DO UPDATE SET pm25 = excluded.pm25
                "#,
            )
            .bind(sensor_name)
            .bind(kind.label())
            .bind(format_timestamp(&point.timestamp))
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::info!(
            "Stored {} points for {} ({})",
            series.len(),
            sensor_name,
            kind.label()
        );
        Ok(())
    }
}
