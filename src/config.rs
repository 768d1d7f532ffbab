use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gamma: GammaConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GammaConfig {
    #[serde(default = "default_gamma_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Thresholds for the heartbeat digest. Passed explicitly to the alerting
/// code; the scan itself has no tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Percentage points.
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    #[serde(default)]
    pub min_volume: f64,
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
    #[serde(default = "default_session_label")]
    pub session_label: String,
}

fn default_gamma_url() -> String { "https://gamma-api.polymarket.com".to_string() }
fn default_page_size() -> usize { 100 }
fn default_max_pages() -> usize { 50 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_backoff_ms() -> u64 { 500 }
fn default_request_timeout() -> u64 { 15 }
fn default_min_edge() -> f64 { 3.0 }
fn default_max_alerts() -> usize { 5 }
fn default_session_label() -> String { "scan".to_string() }

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: default_gamma_url(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_edge: default_min_edge(),
            min_volume: 0.0,
            max_alerts: default_max_alerts(),
            session_label: default_session_label(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub polymarket_gamma_url: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Like [`Config::load`], but a missing file means defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!("No config file at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.polymarket_gamma_url {
            self.gamma.base_url = url.clone();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        Self {
            polymarket_gamma_url: std::env::var("POLYMARKET_GAMMA_URL").ok(),
        }
    }
}
