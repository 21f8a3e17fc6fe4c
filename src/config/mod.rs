use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Accepted session lifetimes: one minute up to one year
pub const SESSION_TTL_RANGE: RangeInclusive<i64> = 60..=31_536_000;
/// Accepted purge intervals: one second up to one day
pub const PURGE_INTERVAL_RANGE: RangeInclusive<u64> = 1..=86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Whole-request timeout applied by the HTTP layer, seconds
    pub request_timeout: u64,
    /// Upper bound for a single store call, seconds
    pub db_timeout_secs: u64,
    pub log_format: LogFormat,
    pub session: SessionConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Invalid LOG_FORMAT: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a freshly issued session, seconds
    pub ttl_secs: i64,
    /// How often expired and revoked sessions are deleted, seconds
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            purge_interval_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Tariff used to price a top-up when the caller omits the price
    pub price_per_kwh: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            price_per_kwh: Decimal::from(1_000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let price_per_kwh = match env::var("PRICE_PER_KWH") {
            Ok(raw) => Decimal::from_str(raw.trim())
                .map_err(|e| anyhow::anyhow!("PRICE_PER_KWH is not a decimal: {}", e))?,
            Err(_) => LedgerConfig::default().price_per_kwh,
        };
        if price_per_kwh.is_sign_negative() {
            return Err(anyhow::anyhow!("PRICE_PER_KWH must not be negative"));
        }

        Ok(Config {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            max_connections: env::var("MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            request_timeout: env::var("REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            db_timeout_secs: env::var("DB_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?,
            session: SessionConfig {
                ttl_secs: env_in_range(
                    "SESSION_TTL_SECS",
                    SessionConfig::default().ttl_secs,
                    SESSION_TTL_RANGE,
                )?,
                purge_interval_secs: env_in_range(
                    "SESSION_PURGE_INTERVAL_SECS",
                    SessionConfig::default().purge_interval_secs,
                    PURGE_INTERVAL_RANGE,
                )?,
            },
            ledger: LedgerConfig { price_per_kwh },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Optional numeric key; present values must parse and fall inside `range`
fn env_in_range<T>(key: &str, default: T, range: RangeInclusive<T>) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let value = match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is not a valid number: {}", key, e))?,
        Err(_) => default,
    };
    if !range.contains(&value) {
        return Err(anyhow::anyhow!(
            "{} must be between {} and {}, got {}",
            key,
            range.start(),
            range.end(),
            value
        ));
    }
    Ok(value)
}

/// Development settings without a database URL. Used with the in-memory store.
impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 8080,
            database_url: String::new(),
            max_connections: 20,
            request_timeout: 30,
            db_timeout_secs: 5,
            log_format: LogFormat::Pretty,
            session: SessionConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}
