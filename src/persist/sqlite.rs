use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::market_data::snapshot::LiquiditySnapshot;
use crate::persist::{MarketRecord, SnapshotStore, StoreResult};

const SCHEMA: &str = r#"
-- Events we are tracking (one per matchup)
CREATE TABLE IF NOT EXISTS events (
    event_ticker TEXT PRIMARY KEY,
    home         TEXT NOT NULL,
    away         TEXT NOT NULL,
    close_time   TEXT NOT NULL,
    created_at   TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One tracked market per event (its mirrors are redundant)
CREATE TABLE IF NOT EXISTS markets (
    ticker       TEXT PRIMARY KEY,
    event_ticker TEXT NOT NULL REFERENCES events(event_ticker),
    outcome      TEXT NOT NULL
);

-- Point-in-time liquidity summaries
CREATE TABLE IF NOT EXISTS snapshots (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker           TEXT NOT NULL REFERENCES markets(ticker),
    ts               TEXT NOT NULL,
    best_bid         INTEGER,
    best_ask         INTEGER,
    mid              REAL,
    spread           INTEGER,
    total_bid_depth  INTEGER NOT NULL,
    total_ask_depth  INTEGER NOT NULL,
    open_interest    INTEGER
);

-- Full book depth per snapshot (for heatmap reconstruction)
CREATE TABLE IF NOT EXISTS depth_levels (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
    side        TEXT NOT NULL,
    price       INTEGER NOT NULL,
    quantity    INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_ticker_ts ON snapshots(ticker, ts);
CREATE INDEX IF NOT EXISTS idx_depth_snapshot ON depth_levels(snapshot_id);
"#;

/// SQLite-backed store. The schema is created on connect; an unreachable
/// database is therefore a startup failure, not a runtime one.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &str) -> StoreResult<Self> {
        info!(path = db_path, "connecting to snapshot database");

        let options = SqliteConnectOptions::from_str(db_path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // Single coordinating writer; one connection is enough.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        debug!("snapshot database schema ready");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl SnapshotStore for SqliteStore {
    async fn register_market(&self, record: &MarketRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO events (event_ticker, home, away, close_time)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.event_ticker)
        .bind(&record.home)
        .bind(&record.away)
        .bind(record.close_time.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let outcome = record
            .market_ticker
            .rsplit('-')
            .next()
            .unwrap_or(&record.market_ticker);

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO markets (ticker, event_ticker, outcome)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&record.market_ticker)
        .bind(&record.event_ticker)
        .bind(outcome)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save_snapshot(
        &self,
        market_ticker: &str,
        snapshot: &LiquiditySnapshot,
    ) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO snapshots
                (ticker, ts, best_bid, best_ask, mid, spread,
                 total_bid_depth, total_ask_depth, open_interest)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(market_ticker)
        .bind(snapshot.ts.to_rfc3339())
        .bind(snapshot.best_bid)
        .bind(snapshot.best_ask)
        .bind(snapshot.mid)
        .bind(snapshot.spread)
        .bind(snapshot.total_bid_depth as i64)
        .bind(snapshot.total_ask_depth as i64)
        .bind(snapshot.open_interest)
        .execute(&mut *tx)
        .await?;

        let snapshot_id = result.last_insert_rowid();

        for (side, levels) in [("bid", &snapshot.book.bids), ("ask", &snapshot.book.asks)] {
            for (price, quantity) in levels {
                sqlx::query(
                    r#"
                    INSERT INTO depth_levels (snapshot_id, side, price, quantity)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(snapshot_id)
                .bind(side)
                .bind(*price)
                .bind(*quantity as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(snapshot_id)
    }
}
