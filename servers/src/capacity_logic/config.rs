use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "server_capacity.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Dynamic capacity and admission control server for eco-tourism sites", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "ECOGATE_PORT", help = "Port to listen on for HTTP and WebSocket clients.")]
    pub port: Option<u16>,

    #[clap(long, env = "ECOGATE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "ECOGATE_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "ECOGATE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "ECOGATE_LOG_KEEP_FILES", help = "Number of rolled log files to keep.")]
    pub log_keep_files: Option<usize>,

    #[clap(long, env = "ECOGATE_DATABASE_URL", help = "PostgreSQL URL. Without it an in-memory store is used.")]
    pub database_url: Option<String>,

    #[clap(long, env = "ECOGATE_DATABASE_POOL_SIZE", help = "Maximum PostgreSQL pool size.")]
    pub database_pool_size: Option<usize>,

    #[clap(long, env = "ECOGATE_REDIS_URL", help = "Redis URL. Without it an in-process cache is used.")]
    pub redis_url: Option<String>,

    #[clap(long, env = "ECOGATE_SITES_FILE", help = "JSON file of sites to seed the store with.")]
    pub sites_file: Option<PathBuf>,

    #[clap(long, env = "ECOGATE_POLICY_PATH", help = "Path of the sensitivity policy and override file.")]
    pub policy_path: Option<PathBuf>,

    #[clap(long, env = "ECOGATE_WEATHER_BASE_URL", help = "Base URL of the weather provider API.")]
    pub weather_base_url: Option<String>,

    #[clap(long, env = "ECOGATE_WEATHER_API_KEY", help = "Weather provider API key. Without it only persisted readings are used.")]
    pub weather_api_key: Option<String>,

    #[clap(long, env = "ECOGATE_PROVIDER_TIMEOUT_SECONDS", help = "Timeout in seconds for one weather provider call.")]
    pub provider_timeout_seconds: Option<u64>,

    #[clap(long, env = "ECOGATE_WEATHER_CACHE_TTL_SECONDS", help = "Weather cache entry lifetime in seconds.")]
    pub weather_cache_ttl_seconds: Option<u64>,

    #[clap(long, env = "ECOGATE_MONITOR_INTERVAL_SECONDS", help = "Seconds between scheduled weather sweeps.")]
    pub monitor_interval_seconds: Option<u64>,

    #[clap(long, env = "ECOGATE_BATCH_SIZE", help = "Sites fetched concurrently per weather batch.")]
    pub batch_size: Option<usize>,

    #[clap(long, env = "ECOGATE_BATCH_DELAY_MS", help = "Pause in milliseconds between weather batches.")]
    pub batch_delay_ms: Option<u64>,

    #[clap(long, env = "ECOGATE_EVENT_BACKLOG", help = "Queued events per subscriber before it is dropped.")]
    pub event_backlog: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_keep_files: other.log_keep_files.or(self.log_keep_files),
            database_url: other.database_url.or(self.database_url),
            database_pool_size: other.database_pool_size.or(self.database_pool_size),
            redis_url: other.redis_url.or(self.redis_url),
            sites_file: other.sites_file.or(self.sites_file),
            policy_path: other.policy_path.or(self.policy_path),
            weather_base_url: other.weather_base_url.or(self.weather_base_url),
            weather_api_key: other.weather_api_key.or(self.weather_api_key),
            provider_timeout_seconds: other.provider_timeout_seconds.or(self.provider_timeout_seconds),
            weather_cache_ttl_seconds: other.weather_cache_ttl_seconds.or(self.weather_cache_ttl_seconds),
            monitor_interval_seconds: other.monitor_interval_seconds.or(self.monitor_interval_seconds),
            batch_size: other.batch_size.or(self.batch_size),
            batch_delay_ms: other.batch_delay_ms.or(self.batch_delay_ms),
            event_backlog: other.event_backlog.or(self.event_backlog),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(9010),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_keep_files: Some(7),
            database_pool_size: Some(16),
            sites_file: Some(PathBuf::from("sites.json")),
            policy_path: dirs::config_dir().map(|dir| dir.join("ecogate").join("policies.json")),
            weather_base_url: Some("https://api.openweathermap.org/data/2.5/".to_string()),
            provider_timeout_seconds: Some(10),
            weather_cache_ttl_seconds: Some(600),
            monitor_interval_seconds: Some(6 * 60 * 60),
            batch_size: Some(5),
            batch_delay_ms: Some(250),
            event_backlog: Some(1024),
            ..Default::default()
        }
    }

    /// Fills every unset field from the built-in defaults.
    pub fn resolve(self) -> Settings {
        let defaults = Config::defaults();
        let merged = defaults.merge(self);
        Settings {
            port: merged.port.unwrap_or(9010),
            log_dir: merged.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
            log_keep_files: merged.log_keep_files.unwrap_or(7),
            database_url: merged.database_url.filter(|url| !url.trim().is_empty()),
            database_pool_size: merged.database_pool_size.unwrap_or(16),
            redis_url: merged.redis_url.filter(|url| !url.trim().is_empty()),
            sites_file: merged.sites_file,
            policy_path: merged.policy_path.unwrap_or_else(|| PathBuf::from("policies.json")),
            weather_base_url: merged.weather_base_url.unwrap_or_default(),
            weather_api_key: merged.weather_api_key.filter(|key| !key.trim().is_empty()),
            provider_timeout: Duration::from_secs(merged.provider_timeout_seconds.unwrap_or(10).max(1)),
            weather_cache_ttl: Duration::from_secs(merged.weather_cache_ttl_seconds.unwrap_or(600).max(1)),
            monitor_interval: Duration::from_secs(merged.monitor_interval_seconds.unwrap_or(21_600).max(1)),
            batch_size: merged.batch_size.unwrap_or(5).max(1),
            batch_delay: Duration::from_millis(merged.batch_delay_ms.unwrap_or(250)),
            event_backlog: merged.event_backlog.unwrap_or(1024).max(1),
        }
    }
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_keep_files: usize,
    pub database_url: Option<String>,
    pub database_pool_size: usize,
    pub redis_url: Option<String>,
    pub sites_file: Option<PathBuf>,
    pub policy_path: PathBuf,
    pub weather_base_url: String,
    pub weather_api_key: Option<String>,
    pub provider_timeout: Duration,
    pub weather_cache_ttl: Duration,
    pub monitor_interval: Duration,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub event_backlog: usize,
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<Config>(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Layers the config file under the CLI/env values. Defaults are applied
/// later by `Config::resolve`.
pub fn load_config_from(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    match read_config_file(&config_file_path) {
        Some(file_config) => file_config.merge(cli),
        None => cli,
    }
}

/// Precedence: defaults < config file < environment < CLI arguments.
pub fn load_config() -> Config {
    load_config_from(Config::parse())
}
