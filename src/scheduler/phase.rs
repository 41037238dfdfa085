use chrono::{DateTime, Duration, Utc};

/// Temporal state of a tracked market relative to its event.
///
/// There is deliberately no `Ended` variant: a finished event simply drops
/// out of the venue's discovery listing and is removed during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketPhase {
    Far,
    Near,
    Live,
}

impl std::fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketPhase::Far => write!(f, "far"),
            MarketPhase::Near => write!(f, "near"),
            MarketPhase::Live => write!(f, "live"),
        }
    }
}

/// Polling cadence: one fixed interval per phase plus the two thresholds
/// that drive classification. Config guarantees far > near > live.
#[derive(Debug, Clone)]
pub struct Cadence {
    pub far_interval: Duration,
    pub near_interval: Duration,
    pub live_interval: Duration,
    /// How long before the estimated start the market counts as `Near`.
    pub near_threshold: Duration,
    /// Assumed event length, used to back the start out of the close time.
    pub event_duration: Duration,
}

impl Cadence {
    /// Estimated event start: the contract closes at event end, so back out
    /// the assumed duration.
    pub fn estimated_start(&self, close_time: DateTime<Utc>) -> DateTime<Utc> {
        close_time - self.event_duration
    }

    /// Classify a market. Pure in `now`: no wall clock is read here and no
    /// state is kept, so repeated calls with equal arguments agree.
    pub fn phase_at(&self, now: DateTime<Utc>, close_time: DateTime<Utc>) -> MarketPhase {
        let start = self.estimated_start(close_time);

        if now >= start {
            MarketPhase::Live
        } else if now >= start - self.near_threshold {
            MarketPhase::Near
        } else {
            MarketPhase::Far
        }
    }

    pub fn interval(&self, phase: MarketPhase) -> Duration {
        match phase {
            MarketPhase::Far => self.far_interval,
            MarketPhase::Near => self.near_interval,
            MarketPhase::Live => self.live_interval,
        }
    }
}
