use async_trait::async_trait;
use reqwest::Client;
use sensor_core::{MeasurementTable, SensorError, TelemetrySource, TimeWindow, COLUMNS};
use std::time::Duration;

use crate::history::parse_history_csv;

const BASE_URL: &str = "https://api.purpleair.com";

/// Timestamp format accepted by the history endpoint
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Clone)]
pub struct PurpleAirClient {
    read_key: String,
    base_url: String,
    client: Client,
}

impl PurpleAirClient {
    pub fn new(read_key: String) -> Self {
        Self::with_base_url(read_key, BASE_URL.to_string())
    }

    pub fn with_base_url(read_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            read_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Query string for one history request, without the API key
    pub fn history_query(window: &TimeWindow) -> Vec<(&'static str, String)> {
        vec![
            ("start_timestamp", window.start.format(TIMESTAMP_FORMAT).to_string()),
            ("end_timestamp", window.end.format(TIMESTAMP_FORMAT).to_string()),
            ("average", window.average_minutes.to_string()),
            ("fields", COLUMNS.join(",")),
        ]
    }

    pub fn history_url(&self, sensor_index: u64) -> String {
        format!("{}/v1/sensors/{}/history/csv", self.base_url, sensor_index)
    }

    /// Fetch the history CSV for one sensor and window
    pub async fn get_history(
        &self,
        sensor_index: u64,
        window: &TimeWindow,
    ) -> Result<MeasurementTable, SensorError> {
        let url = self.history_url(sensor_index);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", self.read_key.as_str())
            .query(&Self::history_query(window))
            .send()
            .await
            .map_err(|e| SensorError::ApiError(e.to_string()))?;

        tracing::debug!("Sensor ID: {}, Response status: {}", sensor_index, response.status());

        if !response.status().is_success() {
            return Err(SensorError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SensorError::ApiError(e.to_string()))?;

        let table = parse_history_csv(&body)?;
        tracing::info!("Retrieved {} records for sensor id: {}", table.len(), sensor_index);
        Ok(table)
    }
}

#[async_trait]
impl TelemetrySource for PurpleAirClient {
    async fn fetch(&self, sensor_index: u64, window: &TimeWindow) -> Result<MeasurementTable, SensorError> {
        self.get_history(sensor_index, window).await
    }
}
