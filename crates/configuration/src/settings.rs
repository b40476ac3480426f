use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section is optional in `config.toml`; missing sections fall back to
/// the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fees: Fees,
    #[serde(default)]
    pub locking: Locking,
    #[serde(default)]
    pub settlement: Settlement,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub database: Database,
}

impl Config {
    /// Rejects values that would make the ledger misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fees.commission_rate.is_sign_negative() {
            return Err(ConfigError::ValidationError(format!(
                "fees.commission_rate must not be negative, got {}",
                self.fees.commission_rate
            )));
        }
        if self.locking.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "locking.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.settlement.reconciliation_tolerance.is_sign_negative() {
            return Err(ConfigError::ValidationError(format!(
                "settlement.reconciliation_tolerance must not be negative, got {}",
                self.settlement.reconciliation_tolerance
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Commission policy applied to every fill.
#[derive(Debug, Clone, Deserialize)]
pub struct Fees {
    /// Flat commission as a fraction of fill value.
    /// 0.001 corresponds to 0.1%.
    pub commission_rate: Decimal,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.001),
        }
    }
}

/// Row-lock behaviour of the ledger store.
#[derive(Debug, Clone, Deserialize)]
pub struct Locking {
    /// Upper bound on the wait for any single row lock, in milliseconds.
    pub timeout_ms: u64,
}

impl Locking {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for Locking {
    fn default() -> Self {
        Self { timeout_ms: 500 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settlement {
    /// Absolute difference under which an account counts as reconciled.
    pub reconciliation_tolerance: Decimal,
}

impl Default for Settlement {
    fn default() -> Self {
        Self {
            reconciliation_tolerance: dec!(0.01),
        }
    }
}

/// Verbosity used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logging {
    #[serde(default)]
    pub level: LogLevel,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_file_prefix() -> String {
    "bourse.log".to_string()
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

/// Connection pool settings. The URL itself comes from `DATABASE_URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}
