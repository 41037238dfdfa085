// Adaptive polling scheduler.
//
// One instance owns the tracked set and drives the whole
// discover -> fetch -> unify -> assemble -> persist cycle. All mutation of
// the tracked set happens on this single control flow; collections inside a
// pass run sequentially. Failed collections leave a gap in the series and
// the deadline still advances on the plain cadence - no retry-sooner, no
// backoff.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::market_data::adapters::{CollectionError, MarketClient};
use crate::market_data::book::unify_ledgers;
use crate::market_data::snapshot::LiquiditySnapshot;
use crate::persist::SnapshotStore;

use super::phase::{Cadence, MarketPhase};
use super::tracker::TrackedMarket;

/// Floor for the inter-tick sleep so a deadline in the past never turns
/// into a zero or negative suspension.
const MIN_SLEEP: std::time::Duration = std::time::Duration::from_secs(1);

pub struct Scheduler {
    client: Arc<dyn MarketClient>,
    store: Arc<dyn SnapshotStore>,
    cadence: Cadence,
    /// How often `run_forever` re-syncs the tracked set against discovery,
    /// and how long it idles when nothing is tracked.
    refresh_interval: Duration,
    markets: HashMap<String, TrackedMarket>,
}

impl Scheduler {
    pub fn new(
        client: Arc<dyn MarketClient>,
        store: Arc<dyn SnapshotStore>,
        cadence: Cadence,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            cadence,
            refresh_interval,
            markets: HashMap::new(),
        }
    }

    pub fn tracked_len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn tracked_markets(&self) -> impl Iterator<Item = &TrackedMarket> {
        self.markets.values()
    }

    /// Sync the tracked set against the venue's discovery listing.
    ///
    /// New events are registered with the store and scheduled one interval
    /// out; events the venue no longer reports are dropped along with any
    /// in-flight schedule. Events present on both sides keep their current
    /// deadline untouched. A failed discovery call leaves the whole set
    /// unchanged - a stale schedule beats a cleared one.
    #[instrument(skip(self))]
    pub async fn reconcile(&mut self, now: DateTime<Utc>) {
        let discovered = match self.client.discover_markets().await {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "market discovery failed; keeping tracked set");
                return;
            }
        };

        let mut seen: HashSet<String> = HashSet::new();

        for d in &discovered {
            seen.insert(d.event_ticker.clone());
            if self.markets.contains_key(&d.event_ticker) {
                continue;
            }

            let tracked = match TrackedMarket::from_discovery(d, now, &self.cadence) {
                Ok(t) => t,
                Err(e) => {
                    // retried on the next pass; the venue often fills the
                    // close time in later
                    warn!(event = %d.event_ticker, error = %e, "excluding market with bad schedule");
                    continue;
                }
            };

            if let Err(e) = self.store.register_market(&tracked.record()).await {
                warn!(event = %tracked.event_ticker, error = %e,
                      "failed to register market; will retry next refresh");
                continue;
            }

            info!(
                event = %tracked.event_ticker,
                matchup = %tracked.matchup(),
                close = %tracked.close_time,
                phase = %tracked.phase(now, &self.cadence),
                "tracking new market"
            );
            self.markets.insert(tracked.event_ticker.clone(), tracked);
        }

        self.markets.retain(|ticker, market| {
            if seen.contains(ticker) {
                true
            } else {
                info!(event = %ticker, matchup = %market.matchup(),
                      "dropping market no longer reported by discovery");
                false
            }
        });

        metrics::gauge!("liqtrack_tracked_markets").set(self.markets.len() as f64);
    }

    /// Collect every market whose deadline has passed, soonest-due first.
    ///
    /// Success or failure, each served market's deadline advances to
    /// `now + interval(phase(now))`; a failure is logged, skipped for this
    /// tick and never stops the pass.
    #[instrument(skip(self))]
    pub async fn dispatch_due(&mut self, now: DateTime<Utc>) {
        let mut due: Vec<(DateTime<Utc>, String)> = self
            .markets
            .values()
            .filter(|m| m.next_due <= now)
            .map(|m| (m.next_due, m.event_ticker.clone()))
            .collect();
        due.sort();

        for (_, event) in due {
            let Some(market) = self.markets.get(&event) else {
                continue;
            };
            let market_ticker = market.market_ticker.clone();
            let matchup = market.matchup();
            let phase = market.phase(now, &self.cadence);
            let interval = self.cadence.interval(phase);

            match self.collect_one(&market_ticker, now).await {
                Ok(snapshot) => {
                    metrics::counter!("liqtrack_snapshots_total").increment(1);
                    info!(
                        phase = %phase,
                        matchup = %matchup,
                        bid = ?snapshot.best_bid,
                        ask = ?snapshot.best_ask,
                        spread = ?snapshot.spread,
                        next_in_secs = interval.num_seconds(),
                        "collected snapshot"
                    );
                }
                Err(e) => {
                    metrics::counter!("liqtrack_collection_failures_total").increment(1);
                    error!(matchup = %matchup, market = %market_ticker, error = %e,
                           "collection failed; skipping this tick");
                }
            }

            if let Some(market) = self.markets.get_mut(&event) {
                market.update_next_due(now, &self.cadence);
            }
        }
    }

    /// One full collection cycle for a single market.
    async fn collect_one(
        &self,
        market_ticker: &str,
        now: DateTime<Utc>,
    ) -> Result<LiquiditySnapshot, CollectionError> {
        let raw = self.client.fetch_orderbook(market_ticker).await?;
        let book = unify_ledgers(&raw.yes, &raw.no);

        let info = self.client.fetch_market_info(market_ticker).await?;

        let snapshot = LiquiditySnapshot::assemble(book, info.open_interest, now);
        self.store.save_snapshot(market_ticker, &snapshot).await?;

        Ok(snapshot)
    }

    /// Earliest deadline across the tracked set.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.markets.values().map(|m| m.next_due).min()
    }

    /// Single collection pass over everything currently due. No
    /// reconciliation.
    pub async fn run_once(&mut self, now: DateTime<Utc>) {
        self.dispatch_due(now).await;
    }

    /// Main loop: refresh the tracked set on a fixed cadence, serve due
    /// markets, then sleep exactly until the next deadline (floored at
    /// [`MIN_SLEEP`]). The sleep is also capped at the next refresh so
    /// discovery keeps its own cadence even when every tracked market is
    /// on the slow far interval. With nothing tracked, idle one refresh
    /// interval and try discovery again.
    pub async fn run_forever(&mut self) {
        info!("starting adaptive scheduler");

        let idle_sleep = self
            .refresh_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(900));
        let mut last_refresh: Option<DateTime<Utc>> = None;

        loop {
            let now = Utc::now();

            if last_refresh.map_or(true, |t| now - t >= self.refresh_interval) {
                debug!("refreshing tracked market set");
                self.reconcile(now).await;
                last_refresh = Some(now);

                if self.markets.is_empty() {
                    info!(sleep_secs = idle_sleep.as_secs(), "no active markets; idling");
                    tokio::time::sleep(idle_sleep).await;
                    continue;
                }
            }

            self.dispatch_due(Utc::now()).await;

            let Some(deadline) = self.next_deadline() else {
                info!(sleep_secs = idle_sleep.as_secs(), "no markets remaining; idling");
                tokio::time::sleep(idle_sleep).await;
                continue;
            };

            let next_refresh = last_refresh.map(|t| t + self.refresh_interval);
            let wake_at = match next_refresh {
                Some(refresh) => deadline.min(refresh),
                None => deadline,
            };
            let wait = (wake_at - Utc::now())
                .to_std()
                .unwrap_or_default()
                .max(MIN_SLEEP);

            let census = self.phase_census(Utc::now());
            debug!(
                live = census.live,
                near = census.near,
                far = census.far,
                sleep_secs = wait.as_secs(),
                "sleeping until next due market"
            );

            tokio::time::sleep(wait).await;
        }
    }

    fn phase_census(&self, now: DateTime<Utc>) -> PhaseCensus {
        let mut census = PhaseCensus::default();
        for market in self.markets.values() {
            match market.phase(now, &self.cadence) {
                MarketPhase::Far => census.far += 1,
                MarketPhase::Near => census.near += 1,
                MarketPhase::Live => census.live += 1,
            }
        }
        census
    }
}

#[derive(Debug, Default)]
struct PhaseCensus {
    far: usize,
    near: usize,
    live: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::market_data::adapters::{
        DiscoveredMarket, DiscoveryError, MarketInfo, RawOrderbook,
    };
    use crate::persist::{MarketRecord, StoreError, StoreResult};

    struct FakeClient {
        discovered: Mutex<Vec<DiscoveredMarket>>,
        fail_discovery: AtomicBool,
        fail_quotes: Mutex<HashSet<String>>,
        fail_info: AtomicBool,
    }

    impl FakeClient {
        fn new(discovered: Vec<DiscoveredMarket>) -> Self {
            Self {
                discovered: Mutex::new(discovered),
                fail_discovery: AtomicBool::new(false),
                fail_quotes: Mutex::new(HashSet::new()),
                fail_info: AtomicBool::new(false),
            }
        }

        fn set_discovered(&self, discovered: Vec<DiscoveredMarket>) {
            *self.discovered.lock().unwrap() = discovered;
        }
    }

    #[async_trait::async_trait]
    impl MarketClient for FakeClient {
        async fn discover_markets(&self) -> Result<Vec<DiscoveredMarket>, DiscoveryError> {
            if self.fail_discovery.load(Ordering::SeqCst) {
                return Err(DiscoveryError::Decode("listing unavailable".to_string()));
            }
            Ok(self.discovered.lock().unwrap().clone())
        }

        async fn fetch_orderbook(&self, market_ticker: &str) -> Result<RawOrderbook, CollectionError> {
            if self.fail_quotes.lock().unwrap().contains(market_ticker) {
                return Err(CollectionError::Decode("orderbook unavailable".to_string()));
            }
            Ok(RawOrderbook {
                yes: vec![(40, 10)],
                no: vec![(60, 5)],
            })
        }

        async fn fetch_market_info(&self, _market_ticker: &str) -> Result<MarketInfo, CollectionError> {
            if self.fail_info.load(Ordering::SeqCst) {
                return Err(CollectionError::Decode("market info unavailable".to_string()));
            }
            Ok(MarketInfo { open_interest: Some(1200) })
        }
    }

    #[derive(Default)]
    struct FakeStore {
        registered: Mutex<Vec<String>>,
        saved: Mutex<Vec<(String, LiquiditySnapshot)>>,
        fail_register: AtomicBool,
    }

    #[async_trait::async_trait]
    impl SnapshotStore for FakeStore {
        async fn register_market(&self, record: &MarketRecord) -> StoreResult<()> {
            if self.fail_register.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::RowNotFound));
            }
            self.registered.lock().unwrap().push(record.event_ticker.clone());
            Ok(())
        }

        async fn save_snapshot(
            &self,
            market_ticker: &str,
            snapshot: &LiquiditySnapshot,
        ) -> StoreResult<i64> {
            let mut saved = self.saved.lock().unwrap();
            saved.push((market_ticker.to_string(), snapshot.clone()));
            Ok(saved.len() as i64)
        }
    }

    fn cadence() -> Cadence {
        Cadence {
            far_interval: Duration::minutes(60),
            near_interval: Duration::minutes(15),
            live_interval: Duration::minutes(1),
            near_threshold: Duration::hours(24),
            event_duration: Duration::seconds((3.5 * 3600.0) as i64),
        }
    }

    fn t(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn discovered(event: &str, close_time: Option<&str>) -> DiscoveredMarket {
        DiscoveredMarket {
            event_ticker: event.to_string(),
            market_ticker: format!("{event}-AW"),
            home: "HM".to_string(),
            away: "AW".to_string(),
            close_time: close_time.map(str::to_string),
        }
    }

    fn scheduler(client: Arc<FakeClient>, store: Arc<FakeStore>) -> Scheduler {
        Scheduler::new(client, store, cadence(), Duration::minutes(15))
    }

    // Far-out close time relative to the t0 used below.
    const FAR_CLOSE: &str = "2026-03-01T00:00:00Z";

    #[tokio::test]
    async fn reconcile_adds_and_removes_but_preserves_schedules() {
        let client = Arc::new(FakeClient::new(vec![
            discovered("EVT-A", Some(FAR_CLOSE)),
            discovered("EVT-B", Some(FAR_CLOSE)),
        ]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client.clone(), store.clone());

        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;
        assert_eq!(sched.tracked_len(), 2);
        let b_due = sched.markets["EVT-B"].next_due;
        assert_eq!(b_due, t0 + Duration::minutes(60));

        client.set_discovered(vec![
            discovered("EVT-B", Some(FAR_CLOSE)),
            discovered("EVT-C", Some(FAR_CLOSE)),
        ]);
        let t1 = t0 + Duration::minutes(5);
        sched.reconcile(t1).await;

        assert!(!sched.markets.contains_key("EVT-A"));
        assert_eq!(sched.markets["EVT-B"].next_due, b_due);
        assert_eq!(sched.markets["EVT-C"].next_due, t1 + Duration::minutes(60));
        assert_eq!(
            store.registered.lock().unwrap().as_slice(),
            ["EVT-A", "EVT-B", "EVT-C"]
        );
    }

    #[tokio::test]
    async fn discovery_failure_leaves_tracked_set_untouched() {
        let client = Arc::new(FakeClient::new(vec![discovered("EVT-A", Some(FAR_CLOSE))]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client.clone(), store);

        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;
        let due = sched.markets["EVT-A"].next_due;

        client.fail_discovery.store(true, Ordering::SeqCst);
        sched.reconcile(t0 + Duration::minutes(5)).await;

        assert_eq!(sched.tracked_len(), 1);
        assert_eq!(sched.markets["EVT-A"].next_due, due);
    }

    #[tokio::test]
    async fn bad_close_times_are_excluded_not_fatal() {
        let client = Arc::new(FakeClient::new(vec![
            discovered("EVT-NONE", None),
            discovered("EVT-GARBLED", Some("whenever")),
            discovered("EVT-OK", Some(FAR_CLOSE)),
        ]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client, store);

        sched.reconcile(t("2026-01-10T00:00:00Z")).await;

        assert_eq!(sched.tracked_len(), 1);
        assert!(sched.markets.contains_key("EVT-OK"));
    }

    #[tokio::test]
    async fn register_failure_defers_tracking_to_next_pass() {
        let client = Arc::new(FakeClient::new(vec![discovered("EVT-A", Some(FAR_CLOSE))]));
        let store = Arc::new(FakeStore::default());
        store.fail_register.store(true, Ordering::SeqCst);
        let mut sched = scheduler(client, store.clone());

        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;
        assert_eq!(sched.tracked_len(), 0);

        store.fail_register.store(false, Ordering::SeqCst);
        sched.reconcile(t0 + Duration::minutes(15)).await;
        assert_eq!(sched.tracked_len(), 1);
    }

    #[tokio::test]
    async fn dispatch_serves_only_due_markets() {
        let client = Arc::new(FakeClient::new(vec![discovered("EVT-A", Some(FAR_CLOSE))]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client, store.clone());

        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;
        let due = sched.markets["EVT-A"].next_due;

        sched.dispatch_due(t0 + Duration::minutes(1)).await;
        assert!(store.saved.lock().unwrap().is_empty());
        assert_eq!(sched.markets["EVT-A"].next_due, due);
    }

    #[tokio::test]
    async fn dispatch_collects_persists_and_reschedules() {
        let client = Arc::new(FakeClient::new(vec![discovered("EVT-A", Some(FAR_CLOSE))]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client, store.clone());

        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;

        let tick = t0 + Duration::minutes(61);
        sched.dispatch_due(tick).await;

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        let (ticker, snap) = &saved[0];
        assert_eq!(ticker, "EVT-A-AW");
        assert_eq!(snap.best_bid, Some(40));
        assert_eq!(snap.best_ask, Some(40)); // no bid at 60 flips to an ask at 40
        assert_eq!(snap.open_interest, Some(1200));
        assert_eq!(snap.ts, tick);

        assert_eq!(sched.markets["EVT-A"].next_due, tick + Duration::minutes(60));
    }

    #[tokio::test]
    async fn collection_failure_advances_deadline_and_pass_continues() {
        let client = Arc::new(FakeClient::new(vec![
            discovered("EVT-A", Some(FAR_CLOSE)),
            discovered("EVT-B", Some(FAR_CLOSE)),
        ]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client.clone(), store.clone());

        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;
        client.fail_quotes.lock().unwrap().insert("EVT-A-AW".to_string());

        let tick = t0 + Duration::minutes(61);
        sched.dispatch_due(tick).await;

        // B was still served after A failed
        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "EVT-B-AW");

        // the failed market stays tracked and keeps the plain cadence -
        // schedule gaps are deliberate, there is no retry-sooner path
        assert_eq!(sched.markets["EVT-A"].next_due, tick + Duration::minutes(60));
        assert_eq!(sched.markets["EVT-B"].next_due, tick + Duration::minutes(60));
    }

    #[tokio::test]
    async fn metadata_failure_also_skips_the_tick() {
        let client = Arc::new(FakeClient::new(vec![discovered("EVT-A", Some(FAR_CLOSE))]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client.clone(), store.clone());

        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;
        client.fail_info.store(true, Ordering::SeqCst);

        let tick = t0 + Duration::minutes(61);
        sched.dispatch_due(tick).await;

        assert!(store.saved.lock().unwrap().is_empty());
        assert_eq!(sched.markets["EVT-A"].next_due, tick + Duration::minutes(60));
    }

    #[tokio::test]
    async fn next_deadline_is_the_minimum_or_none() {
        let client = Arc::new(FakeClient::new(vec![]));
        let store = Arc::new(FakeStore::default());
        let mut sched = scheduler(client.clone(), store);

        assert_eq!(sched.next_deadline(), None);

        client.set_discovered(vec![
            discovered("EVT-FAR", Some(FAR_CLOSE)),
            // closes soon: live cadence, so it is due first
            discovered("EVT-SOON", Some("2026-01-10T01:00:00Z")),
        ]);
        let t0 = t("2026-01-10T00:00:00Z");
        sched.reconcile(t0).await;

        assert_eq!(sched.next_deadline(), Some(t0 + Duration::minutes(1)));
    }
}
