//! Controller configuration

use anyhow::{Context, Result};
use autoscaler_lib::sources::DEFAULT_ANNOTATION_PREFIX;
use autoscaler_lib::PolicyDefaults;
use serde::Deserialize;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AutoscalerConfig {
    /// Instance name attached to log events (pod name from the downward API)
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Seconds between reconciliation cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Per-cycle deadline in seconds, 0 disables it
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,

    /// Prometheus server base URL
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    #[serde(default = "default_prometheus_timeout")]
    pub prometheus_timeout_secs: u64,

    /// Prefix of every annotation the controller reads or writes
    #[serde(default = "default_annotation_prefix")]
    pub annotation_prefix: String,

    /// Only manage claims in this namespace
    #[serde(default)]
    pub namespace: Option<String>,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Log decisions without patching claims
    #[serde(default)]
    pub dry_run: bool,

    /// Run a single cycle and exit
    #[serde(default)]
    pub run_once: bool,

    /// Threshold for claims that do not annotate one
    #[serde(default = "default_threshold")]
    pub default_threshold: String,

    /// Increase for claims that do not annotate one
    #[serde(default = "default_increase")]
    pub default_increase: String,
}

fn default_instance() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "pvc-autoscaler".to_string())
}

fn default_interval() -> u64 {
    60
}

fn default_cycle_timeout() -> u64 {
    50
}

fn default_prometheus_url() -> String {
    "http://prometheus-server.monitoring.svc:9090".to_string()
}

fn default_prometheus_timeout() -> u64 {
    10
}

fn default_annotation_prefix() -> String {
    DEFAULT_ANNOTATION_PREFIX.to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_threshold() -> String {
    "80%".to_string()
}

fn default_increase() -> String {
    "20%".to_string()
}

impl AutoscalerConfig {
    /// Load configuration from an optional config file, then the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/autoscaler").required(false))
            .add_source(config::Environment::with_prefix("AUTOSCALER").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> Result<Self> {
        let parsed: Self = config
            .try_deserialize()
            .context("Invalid configuration")?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than zero");
        }
        if self.annotation_prefix.is_empty() {
            anyhow::bail!("annotation_prefix must not be empty");
        }
        self.policy_defaults()?;
        Ok(())
    }

    /// Policy defaults, validated like claim annotations
    pub fn policy_defaults(&self) -> Result<PolicyDefaults> {
        PolicyDefaults::parse(&self.default_threshold, &self.default_increase)
            .context("Invalid default policy")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn prometheus_timeout(&self) -> Duration {
        Duration::from_secs(self.prometheus_timeout_secs)
    }
}
