//! Configuration module for voucher-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::dtos::vouchers::MAX_VALIDITY_DAYS;

#[derive(Debug, Clone)]
pub struct VoucherConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub issuance: IssuanceConfig,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Directory holding the SQLite file; created on startup if missing.
    pub dir: PathBuf,
    pub file: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

#[derive(Debug, Clone)]
pub struct IssuanceConfig {
    pub id_prefix: String,
    pub currency: String,
    pub default_validity_days: u32,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            id_prefix: "PGM".to_string(),
            currency: "USD".to_string(),
            default_validity_days: 30,
        }
    }
}

impl VoucherConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let mut common = core_config::Config::load()?;
        // Hosting platforms inject a bare PORT.
        if let Some(port) = optional_env::<u16>("PORT")? {
            common.port = port;
        }

        let defaults = IssuanceConfig::default();
        let default_validity_days =
            parse_env("VOUCHER_DEFAULT_VALIDITY_DAYS", defaults.default_validity_days)?;
        if default_validity_days == 0 || i64::from(default_validity_days) > MAX_VALIDITY_DAYS {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "VOUCHER_DEFAULT_VALIDITY_DAYS must be between 1 and {}",
                MAX_VALIDITY_DAYS
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "voucher-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                dir: env::var("DB_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("db")),
                file: env::var("DB_FILE").unwrap_or_else(|_| "pagamos.db".to_string()),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            issuance: IssuanceConfig {
                id_prefix: env::var("VOUCHER_ID_PREFIX").unwrap_or(defaults.id_prefix),
                currency: env::var("VOUCHER_CURRENCY").unwrap_or(defaults.currency),
                default_validity_days,
            },
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_static_dir()),
        })
    }
}

/// The pages shipped with this crate, independent of the working directory.
fn default_static_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/public"))
}

fn optional_env<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, raw))
        }),
        Err(_) => Ok(None),
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    Ok(optional_env(key)?.unwrap_or(default))
}
