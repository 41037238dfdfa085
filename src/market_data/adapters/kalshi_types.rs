// Source: Kalshi trade API v2
// (GET /markets, GET /markets/{ticker}, GET /markets/{ticker}/orderbook)

/// One page of the paginated market listing.
#[derive(Debug, serde::Deserialize)]
pub struct MarketsPage {
    pub markets: Vec<ApiMarket>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ApiMarket {
    pub ticker: String,
    pub event_ticker: String,
    #[serde(default)]
    pub expected_expiration_time: Option<String>,
    #[serde(default)]
    pub open_interest: Option<i64>,
    // the venue sends many more fields; we ignore the rest
}

#[derive(Debug, serde::Deserialize)]
pub struct MarketResponse {
    pub market: ApiMarket,
}

#[derive(Debug, serde::Deserialize)]
pub struct OrderbookResponse {
    pub orderbook: ApiOrderbook,
}

/// Raw book: `[[price_cents, quantity], ...]` per side, either side may be
/// null when empty.
#[derive(Debug, serde::Deserialize)]
pub struct ApiOrderbook {
    #[serde(default)]
    pub yes: Option<Vec<(i64, u64)>>,
    #[serde(default)]
    pub no: Option<Vec<(i64, u64)>>,
}
