use anyhow::{Context, Result};
use serde::Deserialize;
use validator::Validate;

// Default constants
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_SERVER_NAME: &str = "Sqlyard Server";
pub const DEFAULT_API_KEY: &str = "dev-key";

pub const DEFAULT_DB_DIR: &str = "databases";
pub const DEFAULT_EXTENSIONS_DIR: &str = "extensions";

pub const DEFAULT_MAX_WORKERS: usize = 30;
pub const DEFAULT_RESULT_RETENTION_SECS: u64 = 300;

pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Deserialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    #[validate(nested)]
    pub executor: ExecutorSettings,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_key: default_api_key(),
            name: default_server_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// Directory holding one `<name>.db` file per database.
    #[serde(default = "default_db_dir")]
    pub db_dir: String,

    /// Directory scanned for loadable shared extensions.
    #[serde(default = "default_extensions_dir")]
    pub extensions_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_dir: default_db_dir(),
            extensions_dir: default_extensions_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ExecutorSettings {
    /// Upper bound on concurrently executing statements.
    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1))]
    pub max_workers: usize,

    /// Seconds a terminal submission record is retained before reclamation.
    #[serde(default = "default_result_retention_secs")]
    pub result_retention_secs: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            result_retention_secs: default_result_retention_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CacheSettings {
    #[serde(default = "default_cache_max_entries")]
    #[validate(range(min = 1))]
    pub max_entries: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: i64,

    #[serde(default = "default_sweep_interval_secs")]
    #[validate(range(min = 1))]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            default_ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_db_dir() -> String {
    DEFAULT_DB_DIR.to_string()
}

fn default_extensions_dir() -> String {
    DEFAULT_EXTENSIONS_DIR.to_string()
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_result_retention_secs() -> u64 {
    DEFAULT_RESULT_RETENTION_SECS
}

fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_cache_ttl_secs() -> i64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

impl AppConfig {
    /// Load configuration from an optional file plus `SQLYARD_*` environment
    /// overrides. `SQLYARD_SERVER__API_KEY` maps to `server.api_key`, etc.
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("SQLYARD")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}
