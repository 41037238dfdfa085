//! Pure assembly of a point-in-time liquidity snapshot from a unified book.
//!
//! This file MUST NOT talk to the database or the venue. Only value -> value
//! derivation lives here; the caller supplies the timestamp.

use chrono::{DateTime, Utc};

use crate::market_data::book::UnifiedBook;

/// Immutable summary of one market's liquidity at a single instant.
///
/// A crossed or one-sided book is a valid snapshot: `mid` and `spread` are
/// simply absent when either best price is, and `spread` can be negative when
/// the book is crossed.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquiditySnapshot {
    pub ts: DateTime<Utc>,
    pub best_bid: Option<i64>,
    pub best_ask: Option<i64>,
    pub mid: Option<f64>,
    pub spread: Option<i64>,
    pub total_bid_depth: u64,
    pub total_ask_depth: u64,
    pub open_interest: Option<i64>,
    /// Full depth, kept so the store can persist every price level.
    pub book: UnifiedBook,
}

impl LiquiditySnapshot {
    pub fn assemble(book: UnifiedBook, open_interest: Option<i64>, ts: DateTime<Utc>) -> Self {
        let best_bid = book.best_bid();
        let best_ask = book.best_ask();

        let (mid, spread) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => (Some((bid + ask) as f64 / 2.0), Some(ask - bid)),
            _ => (None, None),
        };

        Self {
            ts,
            best_bid,
            best_ask,
            mid,
            spread,
            total_bid_depth: book.total_bid_depth(),
            total_ask_depth: book.total_ask_depth(),
            open_interest,
            book,
        }
    }
}
