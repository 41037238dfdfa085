use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything the store needs to upsert one event and its tracked market.
#[derive(Debug, Clone)]
pub struct MarketRecord {
    pub event_ticker: String,
    pub market_ticker: String,
    pub home: String,
    pub away: String,
    pub close_time: DateTime<Utc>,
}
