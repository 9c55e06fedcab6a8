//! Per-region sensor registry files (`sensor_index,name,latitude,longitude`).

use sensor_core::{SensorError, SensorInfo};
use std::path::Path;

/// Parse registry CSV text. Extra columns are ignored.
pub fn parse_sensor_registry(data: &str) -> Result<Vec<SensorInfo>, SensorError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut sensors = Vec::new();
    for result in reader.deserialize() {
        let sensor: SensorInfo = result.map_err(|e| SensorError::ParseError(e.to_string()))?;
        sensors.push(sensor);
    }
    Ok(sensors)
}

pub fn read_sensor_registry(path: impl AsRef<Path>) -> Result<Vec<SensorInfo>, SensorError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .map_err(|e| SensorError::ParseError(format!("{}: {}", path.display(), e)))?;
    let sensors = parse_sensor_registry(&data)?;
    tracing::debug!("Found {} sensors in {}", sensors.len(), path.display());
    Ok(sensors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry() {
        let csv = "sensor_index,name,latitude,longitude,notes\n\
                   131075,patras_center,38.24664,21.73457,roof\n\
                   140220, rio ,38.29,21.79,\n";

        let sensors = parse_sensor_registry(csv).unwrap();

        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].sensor_index, 131075);
        assert_eq!(sensors[0].name, "patras_center");
        assert_eq!(sensors[1].name, "rio");
        assert!((sensors[1].longitude - 21.79).abs() < 1e-9);
    }

    #[test]
    fn test_registry_bad_row() {
        let csv = "sensor_index,name,latitude,longitude\nabc,x,1,2\n";
        assert!(matches!(parse_sensor_registry(csv), Err(SensorError::ParseError(_))));
    }

    #[test]
    fn test_missing_registry_file() {
        assert!(read_sensor_registry("/nonexistent/sensors.csv").is_err());
    }
}
