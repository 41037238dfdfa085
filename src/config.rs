// Runtime configuration, read from the environment (a .env file is loaded
// by main before this runs). Defaults mirror a typical NFL-style series:
// hour-long polls days out, minute-long polls once the event is underway.

use std::env;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

use crate::scheduler::Cadence;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    Parse { name: &'static str, value: String },

    #[error("polling intervals must satisfy far > near > live (got {far}m, {near}m, {live}m)")]
    IntervalOrdering { far: u64, near: u64, live: u64 },

    #[error("{name} must be positive")]
    NonPositive { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub base_url: String,
    pub series_ticker: String,
    /// Polling intervals in minutes, one per market phase.
    pub poll_far_mins: u64,
    pub poll_near_mins: u64,
    pub poll_live_mins: u64,
    /// Hours before the estimated start at which polling tightens.
    pub near_threshold_hours: f64,
    /// Assumed event length in hours, used to estimate the start from the
    /// contract close time.
    pub event_duration_hours: f64,
    /// Discovery refresh cadence in minutes (also the idle sleep when
    /// nothing is tracked).
    pub refresh_mins: u64,
    /// Upper bound on every venue HTTP call, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "data/liquidity.db".to_string(),
            base_url: "https://api.elections.kalshi.com/trade-api/v2".to_string(),
            series_ticker: "KXNFLGAME".to_string(),
            poll_far_mins: 60,
            poll_near_mins: 15,
            poll_live_mins: 1,
            near_threshold_hours: 24.0,
            event_duration_hours: 3.5,
            refresh_mins: 15,
            http_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            db_path: var_string("LIQTRACK_DB_PATH", defaults.db_path),
            base_url: var_string("LIQTRACK_BASE_URL", defaults.base_url),
            series_ticker: var_string("LIQTRACK_SERIES", defaults.series_ticker),
            poll_far_mins: var_parsed("LIQTRACK_POLL_FAR_MINS", defaults.poll_far_mins)?,
            poll_near_mins: var_parsed("LIQTRACK_POLL_NEAR_MINS", defaults.poll_near_mins)?,
            poll_live_mins: var_parsed("LIQTRACK_POLL_LIVE_MINS", defaults.poll_live_mins)?,
            near_threshold_hours: var_parsed(
                "LIQTRACK_NEAR_THRESHOLD_HOURS",
                defaults.near_threshold_hours,
            )?,
            event_duration_hours: var_parsed(
                "LIQTRACK_EVENT_DURATION_HOURS",
                defaults.event_duration_hours,
            )?,
            refresh_mins: var_parsed("LIQTRACK_REFRESH_MINS", defaults.refresh_mins)?,
            http_timeout_secs: var_parsed("LIQTRACK_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.poll_far_mins > self.poll_near_mins && self.poll_near_mins > self.poll_live_mins)
        {
            return Err(ConfigError::IntervalOrdering {
                far: self.poll_far_mins,
                near: self.poll_near_mins,
                live: self.poll_live_mins,
            });
        }
        if self.poll_live_mins == 0 {
            return Err(ConfigError::NonPositive { name: "LIQTRACK_POLL_LIVE_MINS" });
        }
        if !(self.near_threshold_hours > 0.0 && self.near_threshold_hours.is_finite()) {
            return Err(ConfigError::NonPositive { name: "LIQTRACK_NEAR_THRESHOLD_HOURS" });
        }
        if !(self.event_duration_hours > 0.0 && self.event_duration_hours.is_finite()) {
            return Err(ConfigError::NonPositive { name: "LIQTRACK_EVENT_DURATION_HOURS" });
        }
        if self.refresh_mins == 0 {
            return Err(ConfigError::NonPositive { name: "LIQTRACK_REFRESH_MINS" });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::NonPositive { name: "LIQTRACK_HTTP_TIMEOUT_SECS" });
        }
        Ok(())
    }

    pub fn cadence(&self) -> Cadence {
        Cadence {
            far_interval: Duration::minutes(self.poll_far_mins as i64),
            near_interval: Duration::minutes(self.poll_near_mins as i64),
            live_interval: Duration::minutes(self.poll_live_mins as i64),
            near_threshold: hours_to_duration(self.near_threshold_hours),
            event_duration: hours_to_duration(self.event_duration_hours),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::minutes(self.refresh_mins as i64)
    }

    pub fn http_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.http_timeout_secs)
    }
}

// Fractional hours are common here (a 3.5h event); round to whole seconds.
fn hours_to_duration(hours: f64) -> Duration {
    Duration::seconds((hours * 3600.0).round() as i64)
}

fn var_string(name: &'static str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn var_parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Parse { name, value: raw }),
        Err(_) => Ok(default),
    }
}
