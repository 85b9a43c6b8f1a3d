use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::sim::controller::DEFAULT_STEP_INTERVAL_MS;

/// Process-level settings, loaded from a TOML file. A missing file
/// yields the defaults so `bnsim-web` runs without any setup.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    /// Cap on the retained event log; unbounded when absent.
    #[serde(default)]
    pub log_capacity: Option<usize>,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            step_interval_ms: default_step_interval_ms(),
            log_capacity: None,
            seed: None,
        }
    }
}

impl SimSettings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        let settings: SimSettings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))?;
        Ok(settings)
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_step_interval_ms() -> u64 {
    DEFAULT_STEP_INTERVAL_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_omitted_fields() {
        let settings: SimSettings = toml::from_str("listen_addr = \"0.0.0.0:9000\"").unwrap();
        assert_eq!(settings.listen_addr, "0.0.0.0:9000");
        assert_eq!(settings.step_interval_ms, DEFAULT_STEP_INTERVAL_MS);
        assert!(settings.log_capacity.is_none());
        assert!(settings.seed.is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = SimSettings::load_from_file("/nonexistent/bnsim.toml").unwrap();
        assert_eq!(settings.listen_addr, "127.0.0.1:8080");
    }

    #[test]
    fn full_settings_round_trip() {
        let settings = SimSettings {
            listen_addr: "127.0.0.1:7777".to_string(),
            step_interval_ms: 250,
            log_capacity: Some(500),
            seed: Some(42),
        };
        let text = toml::to_string(&settings).unwrap();
        let back: SimSettings = toml::from_str(&text).unwrap();
        assert_eq!(back.step_interval_ms, 250);
        assert_eq!(back.seed, Some(42));
    }
}
