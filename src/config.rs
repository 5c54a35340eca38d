//! Configuration management and validation.
//!
//! Configuration is layered: built-in defaults, then environment variables,
//! then command-line overrides applied through the `with_*` builders. The
//! resolved value is passed explicitly into the store and the migration
//! runner; nothing reads it from global state.

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_CATEGORIES_FILE, DEFAULT_CONNECT_RETRY_ATTEMPTS,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_POOL_SIZE, DEFAULT_MIGRATION_RETRY_ATTEMPTS,
    DEFAULT_PRODUCTS_FILE, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
    DEFAULT_SOCKET_TIMEOUT_MS, DEFAULT_STORE_URI, DEFAULT_VENDORS_FILE,
    MIGRATION_PROGRESS_INTERVAL_MS, env_vars,
};
use crate::error::{MigratorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Unknown names fall back to development
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

/// Store connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory://`, `file://<dir>` or a directory path
    pub uri: String,
    /// Reserved for networked stores; the embedded store does not read it
    pub server_selection_timeout_ms: u64,
    /// Reserved for networked stores; the embedded store does not read it
    pub socket_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Reserved for networked stores; the embedded store does not read it
    pub max_pool_size: u32,
    /// Connection retries at startup, after the first attempt
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_STORE_URI.to_string(),
            server_selection_timeout_ms: DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            retry_attempts: DEFAULT_CONNECT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Source file locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePaths {
    pub categories: PathBuf,
    pub vendors: PathBuf,
    pub products: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            categories: PathBuf::from(".").join(DEFAULT_CATEGORIES_FILE),
            vendors: PathBuf::from(".").join(DEFAULT_VENDORS_FILE),
            products: PathBuf::from(".").join(DEFAULT_PRODUCTS_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub batch_size: usize,
    /// Connection retries when a migration run reconnects to the store
    pub retry_attempts: u32,
    pub use_transactions: bool,
    pub progress_interval_ms: u64,
    pub report_progress: bool,
    pub paths: SourcePaths,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry_attempts: DEFAULT_MIGRATION_RETRY_ATTEMPTS,
            use_transactions: false,
            progress_interval_ms: MIGRATION_PROGRESS_INTERVAL_MS,
            report_progress: true,
            paths: SourcePaths::default(),
        }
    }
}

impl MigrationConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: Environment,
    pub database: DatabaseConfig,
    pub migration: MigrationConfig,
}

impl AppConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(env) = lookup(env_vars::APP_ENV).or_else(|| lookup(env_vars::NODE_ENV)) {
            config.env = Environment::from_name(&env);
        }

        if let Some(uri) = lookup(env_vars::STORE_URI).filter(|v| !v.trim().is_empty()) {
            config.database.uri = uri;
        }
        if let Some(value) = lookup(env_vars::STORE_RETRY_ATTEMPTS) {
            config.database.retry_attempts = parse_env(env_vars::STORE_RETRY_ATTEMPTS, &value)?;
        }

        let migration = &mut config.migration;
        if let Some(value) = lookup(env_vars::BATCH_SIZE) {
            migration.batch_size = parse_env(env_vars::BATCH_SIZE, &value)?;
        }
        if let Some(value) = lookup(env_vars::MIGRATION_RETRY_ATTEMPTS) {
            migration.retry_attempts = parse_env(env_vars::MIGRATION_RETRY_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(env_vars::USE_TRANSACTIONS) {
            migration.use_transactions = value == "true";
        }
        if let Some(path) = lookup(env_vars::CATEGORIES_PATH) {
            migration.paths.categories = PathBuf::from(path);
        }
        if let Some(path) = lookup(env_vars::VENDORS_PATH) {
            migration.paths.vendors = PathBuf::from(path);
        }
        if let Some(path) = lookup(env_vars::PRODUCTS_PATH) {
            migration.paths.products = PathBuf::from(path);
        }

        debug!("Configuration loaded for {} environment", config.env);
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.database.uri.trim().is_empty() {
            return Err(MigratorError::configuration("store URI must not be empty"));
        }
        if self.migration.batch_size == 0 {
            return Err(MigratorError::configuration(
                "batch_size must be greater than 0",
            ));
        }
        if self.database.connect_timeout_ms == 0 {
            return Err(MigratorError::configuration(
                "connect_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn with_store_uri(mut self, uri: impl Into<String>) -> Self {
        self.database.uri = uri.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.migration.batch_size = batch_size;
        self
    }

    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.migration.use_transactions = enabled;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.migration.report_progress = enabled;
        self
    }

    pub fn with_categories_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.migration.paths.categories = path.into();
        self
    }

    pub fn with_vendors_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.migration.paths.vendors = path.into();
        self
    }

    pub fn with_products_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.migration.paths.products = path.into();
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.database.retry_attempts = attempts;
        self
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        MigratorError::configuration(format!("{} has invalid value '{}': {}", key, value, e))
    })
}
