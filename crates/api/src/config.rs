//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use armory_infra::StockPolicy;
use armory_inventory::CatalogSeed;
use armory_observability::tracing::LogFormat;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a socket address, got '{value}'")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var} must be true or false, got '{value}'")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("ARMORY_LOG_FORMAT: {0}")]
    InvalidLogFormat(String),

    #[error("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,

    #[error("failed to read catalog file {path:?}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {path:?}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the ledger lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String, max_connections: u32 },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was unset and the insecure dev secret is in use.
    pub jwt_secret_defaulted: bool,
    pub backend: StoreBackend,
    pub catalog_file: Option<PathBuf>,
    pub stock_policy: StockPolicy,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = var("ARMORY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddr {
                var: "ARMORY_BIND_ADDR",
                value: bind_raw.clone(),
            })?;

        let (jwt_secret, jwt_secret_defaulted) = match var("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEV_JWT_SECRET.to_string(), true),
        };

        let backend = if parse_bool("USE_PERSISTENT_STORES", var("USE_PERSISTENT_STORES"))? {
            let database_url = var("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;
            let max_connections = match var("ARMORY_DB_MAX_CONNECTIONS") {
                Some(raw) => raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(ConfigError::InvalidNumber {
                        var: "ARMORY_DB_MAX_CONNECTIONS",
                        value: raw,
                    })?,
                None => DEFAULT_DB_MAX_CONNECTIONS,
            };
            StoreBackend::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StoreBackend::InMemory
        };

        let stock_policy = if parse_bool("ARMORY_ALLOW_NEGATIVE_STOCK", var("ARMORY_ALLOW_NEGATIVE_STOCK"))? {
            StockPolicy::AllowNegative
        } else {
            StockPolicy::RejectInsufficient
        };

        let log_format = match var("ARMORY_LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidLogFormat)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_defaulted,
            backend,
            catalog_file: var("ARMORY_CATALOG_FILE").map(PathBuf::from),
            stock_policy,
            log_format,
        })
    }

    /// Read and parse the catalog file, if one is configured.
    pub fn load_catalog(&self) -> Result<Option<CatalogSeed>, ConfigError> {
        let Some(path) = &self.catalog_file else {
            return Ok(None);
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::CatalogRead {
            path: path.clone(),
            source,
        })?;
        let seed = serde_json::from_str(&raw).map_err(|source| ConfigError::CatalogParse {
            path: path.clone(),
            source,
        })?;
        Ok(Some(seed))
    }
}

fn parse_bool(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value }),
    }
}
