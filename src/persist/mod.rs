pub mod types;
pub use types::*;
pub mod sqlite;

use async_trait::async_trait;

use crate::market_data::snapshot::LiquiditySnapshot;

/// Append-only persistence for collected snapshots. Snapshots are written
/// and never read back by the collector.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Idempotent upsert of the event and its tracked market.
    async fn register_market(&self, record: &MarketRecord) -> StoreResult<()>;

    /// Append a snapshot (summary row plus one depth row per price level);
    /// returns the new snapshot id.
    async fn save_snapshot(
        &self,
        market_ticker: &str,
        snapshot: &LiquiditySnapshot,
    ) -> StoreResult<i64>;
}
