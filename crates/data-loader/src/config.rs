use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    // PurpleAir read key
    #[serde(skip_serializing)]
    pub read_key: String,

    // Quality control
    pub ratio_threshold: f64,              // 0.6
    pub alert_threshold: f64,              // 20 µg/m³

    // Regions and files
    pub regions: Vec<String>,
    pub sensors_dir: PathBuf,              // {sensors_dir}/{region}.csv
    pub data_dir: PathBuf,                 // {data_dir}/{region}/{sensor}/...
    pub sqlite_url: Option<String>,

    // Run control
    pub concurrency: usize,
    pub dry_run: bool,
}

const DEFAULT_REGIONS: &str = "thrace,patras,skyros,nafpaktos,thermi";

impl LoaderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            read_key: get("PURPLEAIR_READ_KEY")
                .filter(|s| !s.is_empty())
                .context("PURPLEAIR_READ_KEY not set")?,

            ratio_threshold: get("PM25_RATIO_THRESHOLD")
                .unwrap_or_else(|| "0.6".to_string())
                .parse()
                .context("PM25_RATIO_THRESHOLD must be a number")?,
            alert_threshold: get("PM25_ALERT_THRESHOLD")
                .unwrap_or_else(|| "20".to_string())
                .parse()
                .context("PM25_ALERT_THRESHOLD must be a number")?,

            regions: split_list(&get("QC_REGIONS").unwrap_or_else(|| DEFAULT_REGIONS.to_string())),
            sensors_dir: get("QC_SENSORS_DIR")
                .unwrap_or_else(|| "sensors".to_string())
                .into(),
            data_dir: get("QC_DATA_DIR")
                .unwrap_or_else(|| "data".to_string())
                .into(),
            sqlite_url: get("QC_SQLITE_URL").filter(|s| !s.is_empty()),

            concurrency: get("QC_CONCURRENCY")
                .unwrap_or_else(|| "8".to_string())
                .parse()
                .context("QC_CONCURRENCY must be a positive integer")?,
            dry_run: false,
        };

        config.validate()?;
        Ok(config)
    }

    /// Command-line overrides: `--region NAME` (repeatable), `--dry-run`, `--concurrency N`
    pub fn apply_args(mut self, args: &[String]) -> Result<Self> {
        let mut regions = Vec::new();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--dry-run" => self.dry_run = true,
                "--region" => {
                    let name = iter.next().context("--region needs a value")?;
                    regions.push(name.trim().to_string());
                }
                "--concurrency" => {
                    self.concurrency = iter
                        .next()
                        .context("--concurrency needs a value")?
                        .parse()
                        .context("--concurrency must be a positive integer")?;
                }
                other => bail!("unknown argument: {}", other),
            }
        }
        if !regions.is_empty() {
            self.regions = regions;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            bail!("no regions configured");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("data-loader")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::from_lookup(lookup(&[("PURPLEAIR_READ_KEY", "abc")])).unwrap();

        assert_eq!(config.ratio_threshold, 0.6);
        assert_eq!(config.alert_threshold, 20.0);
        assert_eq!(config.regions.len(), 5);
        assert_eq!(config.sensors_dir, PathBuf::from("sensors"));
        assert!(config.sqlite_url.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn test_missing_key() {
        assert!(LoaderConfig::from_lookup(lookup(&[])).is_err());
        assert!(LoaderConfig::from_lookup(lookup(&[("PURPLEAIR_READ_KEY", "")])).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = LoaderConfig::from_lookup(lookup(&[
            ("PURPLEAIR_READ_KEY", "abc"),
            ("PM25_RATIO_THRESHOLD", "0.2"),
            ("QC_REGIONS", "patras, thermi ,"),
            ("QC_SQLITE_URL", "sqlite:pm25.db"),
        ]))
        .unwrap();

        assert_eq!(config.ratio_threshold, 0.2);
        assert_eq!(config.regions, vec!["patras", "thermi"]);
        assert_eq!(config.sqlite_url.as_deref(), Some("sqlite:pm25.db"));
    }

    #[test]
    fn test_bad_number() {
        let result = LoaderConfig::from_lookup(lookup(&[
            ("PURPLEAIR_READ_KEY", "abc"),
            ("PM25_RATIO_THRESHOLD", "lots"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_args() {
        let config = LoaderConfig::from_lookup(lookup(&[("PURPLEAIR_READ_KEY", "abc")]))
            .unwrap()
            .apply_args(&args(&["--region", "skyros", "--dry-run", "--region", "thrace", "--concurrency", "2"]))
            .unwrap();

        assert_eq!(config.regions, vec!["skyros", "thrace"]);
        assert!(config.dry_run);
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_bad_args() {
        let base = LoaderConfig::from_lookup(lookup(&[("PURPLEAIR_READ_KEY", "abc")])).unwrap();
        assert!(base.clone().apply_args(&args(&["--region"])).is_err());
        assert!(base.clone().apply_args(&args(&["--concurrency", "0"])).is_err());
        assert!(base.apply_args(&args(&["--verbose"])).is_err());
    }
}
