//! Engine configuration
//!
//! Defaults follow the live feed setup: 5 second windows, rolling means
//! over 1, 5 and 15 minutes, an unbounded ingestion channel and unbounded
//! history. `from_env` overrides any of them from `INSIGHTS_*` variables.

use std::time::Duration;

use thiserror::Error;
use types::errors::TypesError;
use types::ids::ProductId;

use crate::normalizer::validate_product_id;
use crate::series::RetentionPolicy;

pub const ENV_WINDOW_INTERVAL_MS: &str = "INSIGHTS_WINDOW_INTERVAL_MS";
pub const ENV_HORIZONS_SECS: &str = "INSIGHTS_HORIZONS_SECS";
pub const ENV_CHANNEL_CAPACITY: &str = "INSIGHTS_CHANNEL_CAPACITY";
pub const ENV_RETENTION_MAX_ENTRIES: &str = "INSIGHTS_RETENTION_MAX_ENTRIES";
pub const ENV_PRODUCT_ID: &str = "INSIGHTS_PRODUCT_ID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Window interval must be greater than zero")]
    ZeroWindowInterval,

    #[error("At least one rolling horizon is required")]
    NoHorizons,

    #[error("Rolling horizon must be greater than zero")]
    ZeroHorizon,

    #[error("Channel capacity must be greater than zero")]
    ZeroChannelCapacity,

    #[error("Retention must keep at least one entry")]
    ZeroRetention,

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error(transparent)]
    Product(#[from] TypesError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightsConfig {
    pub product_id: ProductId,
    pub window_interval: Duration,
    /// Trailing horizons for the rolling mid-price, in report order.
    pub rolling_horizons: Vec<Duration>,
    /// `None` for an unbounded ingestion channel.
    pub channel_capacity: Option<usize>,
    pub retention: RetentionPolicy,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            product_id: ProductId::btc_usd(),
            window_interval: Duration::from_secs(5),
            rolling_horizons: vec![
                Duration::from_secs(60),
                Duration::from_secs(5 * 60),
                Duration::from_secs(15 * 60),
            ],
            channel_capacity: None,
            retention: RetentionPolicy::Unbounded,
        }
    }
}

impl InsightsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_interval.is_zero() {
            return Err(ConfigError::ZeroWindowInterval);
        }
        if self.rolling_horizons.is_empty() {
            return Err(ConfigError::NoHorizons);
        }
        if self.rolling_horizons.iter().any(Duration::is_zero) {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.channel_capacity == Some(0) {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        match self.retention {
            RetentionPolicy::MaxEntries(0) => return Err(ConfigError::ZeroRetention),
            RetentionPolicy::MaxAge(age) if age.is_zero() => {
                return Err(ConfigError::ZeroRetention)
            }
            _ => {}
        }
        Ok(())
    }

    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = product_id;
        self
    }

    pub fn with_window_interval(mut self, interval: Duration) -> Self {
        self.window_interval = interval;
        self
    }

    pub fn with_horizons(mut self, horizons: Vec<Duration>) -> Self {
        self.rolling_horizons = horizons;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: Option<usize>) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Defaults overridden by `INSIGHTS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PRODUCT_ID) {
            config.product_id = validate_product_id(raw.trim())?;
        }
        if let Some(raw) = lookup(ENV_WINDOW_INTERVAL_MS) {
            let millis: u64 = parse_var(ENV_WINDOW_INTERVAL_MS, &raw)?;
            config.window_interval = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(ENV_HORIZONS_SECS) {
            config.rolling_horizons = raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| parse_var(ENV_HORIZONS_SECS, part).map(Duration::from_secs))
                .collect::<Result<_, _>>()?;
        }
        if let Some(raw) = lookup(ENV_CHANNEL_CAPACITY) {
            config.channel_capacity = Some(parse_var(ENV_CHANNEL_CAPACITY, &raw)?);
        }
        if let Some(raw) = lookup(ENV_RETENTION_MAX_ENTRIES) {
            config.retention = RetentionPolicy::MaxEntries(parse_var(ENV_RETENTION_MAX_ENTRIES, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}
