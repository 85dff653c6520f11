use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379/0".into()
}

impl StoreConfig {
    /// `url` with a `redis://` scheme added when it was given as bare `host:port`.
    pub fn connection_url(&self) -> String {
        if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("redis://{}", self.url)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Longest wait for a command before the listener re-checks the store.
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            liveness_interval_ms: default_liveness_interval_ms(),
        }
    }
}

fn default_channel() -> String {
    crate::coordination::DEFAULT_CHANNEL.into()
}

fn default_liveness_interval_ms() -> u64 {
    5000
}

impl CoordinationConfig {
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkStrategy {
    #[default]
    Aggregate,
    Latest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default)]
    pub strategy: SinkStrategy,
    #[serde(default = "default_latest_key")]
    pub latest_key: String,
    /// Consecutive uncommitted ticks before a session gives up.
    #[serde(default = "default_max_failed_ticks")]
    pub max_failed_ticks: u32,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            strategy: SinkStrategy::default(),
            latest_key: default_latest_key(),
            max_failed_ticks: default_max_failed_ticks(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

fn default_sample_interval_ms() -> u64 {
    2000
}

fn default_latest_key() -> String {
    crate::sink::latest::DEFAULT_LATEST_KEY.into()
}

fn default_max_failed_ticks() -> u32 {
    3
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

impl MonitoringConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        let mut config: AppConfig = toml::from_str(&s)?;
        if let Ok(url) = std::env::var("REDIS_URL")
            && !url.is_empty()
        {
            config.store.url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.store.url.is_empty(), "store.url must be non-empty");
        anyhow::ensure!(
            !self.coordination.channel.is_empty(),
            "coordination.channel must be non-empty"
        );
        anyhow::ensure!(
            self.coordination.liveness_interval_ms > 0,
            "coordination.liveness_interval_ms must be > 0, got {}",
            self.coordination.liveness_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            !self.monitoring.latest_key.is_empty(),
            "monitoring.latest_key must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.max_failed_ticks > 0,
            "monitoring.max_failed_ticks must be > 0, got {}",
            self.monitoring.max_failed_ticks
        );
        anyhow::ensure!(
            self.monitoring.stop_timeout_ms > 0,
            "monitoring.stop_timeout_ms must be > 0, got {}",
            self.monitoring.stop_timeout_ms
        );
        Ok(())
    }
}
