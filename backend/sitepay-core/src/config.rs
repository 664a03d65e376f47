// src/config.rs

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::deductions::DEFAULT_FLAT_TAX_RATE;

pub const ENV_PREFIX: &str = "SITEPAY_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Flat tax rate must be between 0 and 1, got {0}")]
    InvalidTaxRate(Decimal),
}

fn default_flat_tax_rate() -> Decimal {
    DEFAULT_FLAT_TAX_RATE
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./sitepay_data")
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

/// Read from `SITEPAY_*` variables, e.g. `SITEPAY_FLAT_TAX_RATE=0.2`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PayrollConfig {
    #[serde(default = "default_flat_tax_rate")]
    pub flat_tax_rate: Decimal,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    // Server
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    // TLS is only enabled when both are set
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl Default for PayrollConfig {
    fn default() -> Self {
        Self {
            flat_tax_rate: default_flat_tax_rate(),
            data_dir: default_data_dir(),
            server_host: default_server_host(),
            server_port: default_server_port(),
            cert_path: None,
            key_path: None,
        }
    }
}

impl PayrollConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::prefixed(ENV_PREFIX)
            .from_env::<PayrollConfig>()?
            .validated()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, PayrollConfig>(vars)?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.flat_tax_rate < Decimal::ZERO || self.flat_tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidTaxRate(self.flat_tax_rate));
        }
        Ok(self)
    }

    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.cert_path.as_ref().zip(self.key_path.as_ref())
    }
}
