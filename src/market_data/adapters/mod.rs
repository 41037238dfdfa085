// Shared trait + wire-facing types for market venue clients.

use async_trait::async_trait;
use thiserror::Error;

use crate::persist::StoreError;

/// One event market as reported by the venue's discovery listing.
#[derive(Debug, Clone)]
pub struct DiscoveredMarket {
    /// Stable identity of the real-world event.
    pub event_ticker: String,
    /// The one venue market tracked for this event.
    pub market_ticker: String,
    pub home: String,
    pub away: String,
    /// Contract close time exactly as the venue sent it. Left as a raw
    /// string so one malformed value is a per-market problem downstream,
    /// not a discovery failure.
    pub close_time: Option<String>,
}

/// The venue's two one-sided ledgers, (price_cents, quantity) pairs.
#[derive(Debug, Clone, Default)]
pub struct RawOrderbook {
    pub yes: Vec<(i64, u64)>,
    pub no: Vec<(i64, u64)>,
}

/// Per-market metadata fetched alongside the book.
#[derive(Debug, Clone, Default)]
pub struct MarketInfo {
    pub open_interest: Option<i64>,
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("venue returned {status} for {url}")]
    Api { status: u16, url: String },

    #[error("failed to decode discovery response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("venue request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("venue returned {status} for {url}")]
    Api { status: u16, url: String },

    #[error("failed to decode venue response: {0}")]
    Decode(String),

    #[error("failed to persist snapshot: {0}")]
    Store(#[from] StoreError),
}

/// Read-only venue access used by the scheduler. Implementations must carry
/// a bounded per-call timeout; a hung request is a [`CollectionError`], not a
/// stalled schedule.
#[async_trait]
pub trait MarketClient: Send + Sync {
    /// List the currently active event markets for the tracked series.
    async fn discover_markets(&self) -> Result<Vec<DiscoveredMarket>, DiscoveryError>;

    /// Fetch the raw yes/no ledgers for one market.
    async fn fetch_orderbook(&self, market_ticker: &str) -> Result<RawOrderbook, CollectionError>;

    /// Fetch market metadata (open interest). May fail independently of the
    /// orderbook fetch.
    async fn fetch_market_info(&self, market_ticker: &str) -> Result<MarketInfo, CollectionError>;
}

pub mod kalshi;
pub mod kalshi_types;
