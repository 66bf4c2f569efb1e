use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::prober::{DEFAULT_CONCURRENCY, ProbeOptions};

pub const CONFIG_ENV: &str = "TARGET_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "targets.json";

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `{"websites": [...]}` with a response string per port
    #[default]
    Summary,
    Detailed,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub hosts: Vec<String>,
    pub ports: Vec<u16>,
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub log_level: String,
    pub log_format: LogFormat,
    pub output: OutputFormat,
    /// Re-probe on this interval until interrupted; a single run when absent.
    pub probe_interval_ms: Option<u64>,
    pub metrics_addr: Option<SocketAddr>,
    pub enable_latency_history: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            hosts: ["google.com", "aol.com", "aws.net", "facebook.com"]
                .into_iter()
                .map(String::from)
                .collect(),
            ports: vec![443, 80, 22],
            timeout_ms: 3000,
            concurrency: DEFAULT_CONCURRENCY,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            output: OutputFormat::Summary,
            probe_interval_ms: None,
            metrics_addr: None,
            enable_latency_history: false,
        }
    }
}

impl ProbeConfig {
    /// Load from `$TARGET_CONFIG`, else `targets.json` if present, else defaults.
    pub async fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_file(&path).await,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_file(DEFAULT_CONFIG_FILE).await
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub async fn load_file(file_path: &str) -> Result<Self> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        let config: ProbeConfig = serde_json::from_str(&content)?;
        config.validate_log_level()?;
        Ok(config)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    /// Validate the log level is one of the supported values
    pub fn validate_log_level(&self) -> Result<()> {
        self.get_tracing_level().map(|_| ())
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            concurrency: self.concurrency,
        }
    }
}
