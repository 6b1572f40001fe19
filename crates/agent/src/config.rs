//! Agent configuration
//!
//! Layered from an optional TOML file and `HOSTWATCH_*` environment
//! variables, e.g. `HOSTWATCH_API_PORT=9000` or
//! `HOSTWATCH_SCHEDULE__INTERVAL_MINUTES=15`.

use agent_lib::policy::AnalysisPolicy;
use agent_lib::scheduler::{ScheduleConfig, ScheduleWindow};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

const CONFIG_PATH_VAR: &str = "HOSTWATCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "hostwatch.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Host name attached to logs and reports
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// API server port for health/metrics/analyze
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// JSON file holding the persisted sample history
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Maximum number of samples kept
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Directory for JSON reports; disabled when unset
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub policy: AnalysisPolicy,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_history_path() -> PathBuf {
    PathBuf::from("hostwatch-history.json")
}

fn default_history_capacity() -> usize {
    agent_lib::history::DEFAULT_CAPACITY
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Self::from_sources(
            config::Config::builder()
                .add_source(config::File::new(&path, config::FileFormat::Toml).required(false))
                .add_source(
                    config::Environment::with_prefix("HOSTWATCH")
                        .prefix_separator("_")
                        .separator("__")
                        .try_parsing(true)
                        .list_separator(",")
                        .with_list_parse_key("schedule.days"),
                ),
        )
        .with_context(|| format!("Failed to load configuration (file {})", path))
    }

    fn from_sources(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.schedule_window()?;
        Ok(config)
    }

    /// Validated schedule window
    pub fn schedule_window(&self) -> Result<ScheduleWindow> {
        self.schedule
            .window()
            .context("Invalid schedule configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_lib::policy::RamMetric;

    fn from_toml(toml: &str) -> Result<AgentConfig> {
        AgentConfig::from_sources(
            config::Config::builder().add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = from_toml("").unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.history_capacity, 100);
        assert!(config.report_dir.is_none());
        assert!(config.schedule.active);
        assert_eq!(config.policy, AnalysisPolicy::default());
    }

    #[test]
    fn test_nested_sections_override_defaults() {
        let config = from_toml(
            r#"
            host_name = "build-box"
            history_capacity = 20
            report_dir = "/var/lib/hostwatch/reports"

            [schedule]
            days = ["monday", "friday"]
            start_time = "08:30"
            end_time = "18:00"
            interval_minutes = 15

            [policy.anomaly]
            k = 3.0
            ram_metric = "used_gb"

            [policy.sample]
            memory_threshold_mb = 150
            "#,
        )
        .unwrap();

        assert_eq!(config.host_name, "build-box");
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.schedule.days.len(), 2);
        assert_eq!(config.policy.anomaly.k, 3.0);
        assert_eq!(config.policy.anomaly.ram_metric, RamMetric::UsedGb);
        assert_eq!(config.policy.sample.memory_threshold_mb, 150.0);
        assert_eq!(config.policy.risk.high_max, 8);
        assert_eq!(
            config.schedule_window().unwrap().interval(),
            std::time::Duration::from_secs(15 * 60)
        );
    }

    #[test]
    fn test_invalid_schedule_is_a_startup_error() {
        let err = from_toml(
            r#"
            [schedule]
            days = ["someday"]
            "#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("someday"));
    }
}
