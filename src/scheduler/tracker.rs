use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::market_data::adapters::DiscoveredMarket;
use crate::persist::MarketRecord;

use super::phase::{Cadence, MarketPhase};

#[derive(Error, Debug)]
pub enum ScheduleParseError {
    #[error("missing close time")]
    Missing,

    #[error("unparseable close time {raw:?}: {source}")]
    Invalid {
        raw: String,
        source: chrono::ParseError,
    },
}

/// Polling state for a single tracked event market.
#[derive(Debug, Clone)]
pub struct TrackedMarket {
    pub event_ticker: String,
    pub market_ticker: String,
    pub home: String,
    pub away: String,
    /// Contract close time, i.e. the scheduled end of the event (UTC).
    pub close_time: DateTime<Utc>,
    /// Next collection deadline. Non-decreasing over the market's lifetime.
    pub next_due: DateTime<Utc>,
}

impl TrackedMarket {
    /// Build a tracked market from a discovery row, scheduling its first
    /// collection one interval out from `now`.
    pub fn from_discovery(
        discovered: &DiscoveredMarket,
        now: DateTime<Utc>,
        cadence: &Cadence,
    ) -> Result<Self, ScheduleParseError> {
        let close_time = parse_close_time(discovered.close_time.as_deref())?;

        let mut market = Self {
            event_ticker: discovered.event_ticker.clone(),
            market_ticker: discovered.market_ticker.clone(),
            home: discovered.home.clone(),
            away: discovered.away.clone(),
            close_time,
            next_due: now,
        };
        market.update_next_due(now, cadence);
        Ok(market)
    }

    pub fn phase(&self, now: DateTime<Utc>, cadence: &Cadence) -> MarketPhase {
        cadence.phase_at(now, self.close_time)
    }

    /// Advance the deadline on the cadence of the phase observed at `now`,
    /// whether or not the collection attempt at `now` produced a snapshot.
    pub fn update_next_due(&mut self, now: DateTime<Utc>, cadence: &Cadence) {
        self.next_due = now + cadence.interval(self.phase(now, cadence));
    }

    pub fn record(&self) -> MarketRecord {
        MarketRecord {
            event_ticker: self.event_ticker.clone(),
            market_ticker: self.market_ticker.clone(),
            home: self.home.clone(),
            away: self.away.clone(),
            close_time: self.close_time,
        }
    }

    /// `AWY@HOM` label used in log lines.
    pub fn matchup(&self) -> String {
        format!("{}@{}", self.away, self.home)
    }
}

/// Parse the venue's close-time string. RFC 3339 (with `Z` or an explicit
/// offset) is the norm; a bare naive timestamp is taken as UTC.
pub fn parse_close_time(raw: Option<&str>) -> Result<DateTime<Utc>, ScheduleParseError> {
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return Err(ScheduleParseError::Missing),
    };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| ScheduleParseError::Invalid {
                raw: raw.to_string(),
                source: rfc_err,
            }),
    }
}
