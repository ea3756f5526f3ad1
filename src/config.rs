use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub cache: CacheConfig,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub postgres_max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Balance cache tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Bank backup period; account backups run at twice this
    pub backup_interval_ms: u64,
    /// Bound of each outbound backup stream
    pub stream_capacity: usize,
    /// Bound of each inbound bootstrap stream
    pub bootstrap_capacity: usize,
    /// How often the processed-transaction count is logged (0 = never)
    pub stats_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backup_interval_ms: 1000,
            stream_capacity: 1024,
            bootstrap_capacity: 1024,
            stats_interval_secs: 5,
        }
    }
}

impl CacheConfig {
    pub fn backup_interval(&self) -> Duration {
        Duration::from_millis(self.backup_interval_ms.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "interbank_cache.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            cache: CacheConfig::default(),
            gateway: GatewayConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            postgres_url: None,
            postgres_max_connections: default_max_connections(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
