use serde::Deserialize;
use std::time::Duration;

/// Prefix shared by every environment variable the client reads.
pub const ENV_PREFIX: &str = "BUNDLE_";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the bundle service (e.g., "https://bundles.example.com/")
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Seconds between job status checks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Wall-clock budget for a generation job, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Per-request HTTP timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Prometheus scrape listener address (e.g., "127.0.0.1:9100"). Disabled when unset.
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

fn default_service_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    30 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Polling cadence and budget for a [`GenerationTracker`](crate::services::tracker::GenerationTracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(default_poll_interval_secs()),
            timeout: Duration::from_secs(default_timeout_secs()),
        }
    }
}
