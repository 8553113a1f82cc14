/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed runner configuration with defaults applied
[POS]:    Configuration layer - account, paths and engine tunables
[UPDATE]: When adding new configuration options
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Top-level configuration for the volume runner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Account credentials used by workers
    pub account: AccountConfig,
    /// Exchange REST base URL override (defaults to the production API)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Directory holding the task store (defaults to the OS data dir)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Directory holding per-task worker logs (defaults to data_dir/logs)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Engine tunables
    #[serde(default)]
    pub engine: EngineTuning,
}

/// Account credentials configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub api_key: String,
    pub api_secret: String,
}

/// Engine tunables with production defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineTuning {
    /// Delay between sell and buy submission, in milliseconds
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    /// Fill monitoring window, in milliseconds
    #[serde(default = "default_monitor_window_ms")]
    pub monitor_window_ms: u64,
    /// Order status poll interval, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Base-asset quantity kept out of every round
    #[serde(default = "default_safety_margin")]
    pub safety_margin: Decimal,
    /// Acceptable base-asset drift after reconciliation
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: Decimal,
    /// Ceiling on corrective reconciliation orders per pass
    #[serde(default = "default_max_reconcile_attempts")]
    pub max_reconcile_attempts: u32,
    /// Delay between a corrective order and the balance re-check, in ms
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            stagger_ms: default_stagger_ms(),
            monitor_window_ms: default_monitor_window_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            safety_margin: default_safety_margin(),
            drift_tolerance: default_drift_tolerance(),
            max_reconcile_attempts: default_max_reconcile_attempts(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

fn default_stagger_ms() -> u64 {
    50
}

fn default_monitor_window_ms() -> u64 {
    3_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_safety_margin() -> Decimal {
    Decimal::ONE
}

fn default_drift_tolerance() -> Decimal {
    Decimal::from_str("0.1").unwrap_or(Decimal::ZERO)
}

fn default_max_reconcile_attempts() -> u32 {
    5
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

impl RunnerConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Directory holding the task store.
    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("aster-volume-runner"))
            .ok_or_else(|| anyhow::anyhow!("could not determine data directory"))
    }

    /// Directory holding per-task worker logs.
    pub fn resolve_log_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.log_dir {
            return Ok(dir.clone());
        }
        Ok(self.resolve_data_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied_for_missing_engine_section() {
        let yaml = r#"
account:
  api_key: key
  api_secret: secret
"#;
        let config: RunnerConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.engine.monitor_window_ms, 3_000);
        assert_eq!(config.engine.poll_interval_ms, 500);
        assert_eq!(config.engine.drift_tolerance, Decimal::from_str("0.1").unwrap());
        assert_eq!(config.engine.max_reconcile_attempts, 5);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn engine_overrides_parse() {
        let yaml = r#"
account:
  api_key: key
  api_secret: secret
engine:
  stagger_ms: 10
  safety_margin: "2.5"
"#;
        let config: RunnerConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.engine.stagger_ms, 10);
        assert_eq!(config.engine.safety_margin, Decimal::from_str("2.5").unwrap());
        assert_eq!(config.engine.monitor_window_ms, 3_000);
    }
}
