use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_app_id")]
    pub app_id: u32,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_currency")]
    pub currency: u32,
    #[serde(default = "default_search_count")]
    pub search_count: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: default_app_id(),
            country: default_country(),
            language: default_language(),
            currency: default_currency(),
            search_count: default_search_count(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub announce_on_start: bool,
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            announce_on_start: true,
            recent_count: default_recent_count(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiffConfig {
    /// Absent means price moves never count as new listings
    #[serde(default)]
    pub price_change_threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Falls back to a file named after the backend when unset
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

impl StorageConfig {
    pub fn path(&self) -> &str {
        match (&self.path, self.backend) {
            (Some(path), _) => path,
            (None, StorageBackend::Json) => "steam_market_data.json",
            (None, StorageBackend::Sqlite) => "steam_market_data.db",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,
    #[serde(default = "default_price_cache_ttl_secs")]
    pub price_cache_ttl_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            search_limit: default_search_limit(),
            icon_base_url: default_icon_base_url(),
            price_cache_ttl_secs: default_price_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_log_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_message_len: default_max_message_len(),
        }
    }
}

fn default_base_url() -> String { "https://steamcommunity.com".to_string() }
fn default_app_id() -> u32 { 216150 }
fn default_country() -> String { "US".to_string() }
fn default_language() -> String { "english".to_string() }
fn default_currency() -> u32 { 1 }
fn default_search_count() -> u32 { 100 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}
fn default_cooldown_secs() -> u64 { 60 }
fn default_max_attempts() -> u32 { 3 }
fn default_timeout_secs() -> u64 { 30 }
fn default_interval_secs() -> u64 { 300 }
fn default_true() -> bool { true }
fn default_recent_count() -> usize { 5 }
fn default_backend() -> StorageBackend { StorageBackend::Json }
fn default_catalog_path() -> String { "All_Items.csv".to_string() }
fn default_search_limit() -> usize { 5 }
fn default_icon_base_url() -> String { "https://maplestory.io/api/GMS/255".to_string() }
fn default_price_cache_ttl_secs() -> u64 { 60 }
fn default_csv_log_path() -> String { "market_events.csv".to_string() }
fn default_max_message_len() -> usize { 1900 }

/// Secrets and per-deployment overrides, read from the environment / `.env`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub steam_cookie: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub market_base_url: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Fold environment overrides into the file config
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.market_base_url {
            self.market.base_url = url.clone();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            steam_cookie: non_empty_var("STEAM_COOKIE"),
            discord_webhook_url: non_empty_var("DISCORD_WEBHOOK_URL"),
            market_base_url: non_empty_var("MARKET_BASE_URL"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.market.app_id, 216150);
        assert_eq!(config.lookup.cooldown_secs, 60);
        assert_eq!(config.polling.interval_secs, 300);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.commands.search_limit, 5);
        assert!(config.diff.price_change_threshold.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [market]
            app_id = 730

            [storage]
            backend = "sqlite"
            path = "state.db"

            [diff]
            price_change_threshold = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.market.app_id, 730);
        assert_eq!(config.market.country, "US");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.path(), "state.db");
        assert_eq!(config.diff.price_change_threshold, Some(2.5));
    }

    #[test]
    fn test_storage_path_defaults_per_backend() {
        let json = Config::parse("").unwrap();
        assert_eq!(json.storage.path(), "steam_market_data.json");

        let sqlite = Config::parse("[storage]\nbackend = \"sqlite\"").unwrap();
        assert_eq!(sqlite.storage.path(), "steam_market_data.db");
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = Config::parse(include_str!("../config.toml")).unwrap();
        assert_eq!(config.lookup.max_attempts, 3);
        assert_eq!(config.notify.max_message_len, 1900);
        assert!(!config.monitoring.csv_logging);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Config::parse("[storage]\nbackend = \"redis\"").is_err());
    }

    #[test]
    fn test_env_override_base_url() {
        let mut config = Config::default();
        config.apply_env(&EnvConfig {
            market_base_url: Some("http://127.0.0.1:9000".to_string()),
            ..Default::default()
        });
        assert_eq!(config.market.base_url, "http://127.0.0.1:9000");
    }
}
