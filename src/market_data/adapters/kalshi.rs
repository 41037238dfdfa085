// Kalshi REST adapter. No authentication is required for read-only market
// data; every request carries the client-level timeout so a hung call
// surfaces as an error instead of stalling the scheduler.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::kalshi_types::{ApiMarket, MarketResponse, MarketsPage, OrderbookResponse};
use super::{CollectionError, DiscoveredMarket, DiscoveryError, MarketClient, MarketInfo, RawOrderbook};

pub struct KalshiClient {
    base_url: String,
    series_ticker: String,
    client: Client,
}

impl KalshiClient {
    /// Build a client for one market series. `timeout` bounds every call.
    pub fn new(
        base_url: impl Into<String>,
        series_ticker: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            series_ticker: series_ticker.into(),
            client,
        })
    }

    /// Fetch every open market in the series, following pagination cursors.
    async fn list_open_markets(&self) -> Result<Vec<ApiMarket>, DiscoveryError> {
        let url = format!("{}/markets", self.base_url);
        let mut markets = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("series_ticker", self.series_ticker.clone()),
                ("status", "open".to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self.client.get(&url).query(&query).send().await?;
            if !response.status().is_success() {
                return Err(DiscoveryError::Api {
                    status: response.status().as_u16(),
                    url: url.clone(),
                });
            }

            let page: MarketsPage = response
                .json()
                .await
                .map_err(|e| DiscoveryError::Decode(e.to_string()))?;

            markets.extend(page.markets);
            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        debug!(series = %self.series_ticker, count = markets.len(), "listed open markets");
        Ok(markets)
    }
}

#[async_trait::async_trait]
impl MarketClient for KalshiClient {
    async fn discover_markets(&self) -> Result<Vec<DiscoveredMarket>, DiscoveryError> {
        let markets = self.list_open_markets().await?;

        // Markets within one event are mirrors of each other; track the
        // first one the listing reports per event.
        let mut seen = HashSet::new();
        let mut discovered = Vec::new();

        for market in markets {
            if !seen.insert(market.event_ticker.clone()) {
                continue;
            }

            let Some((away, home)) = parse_event_ticker(&market.event_ticker) else {
                warn!(event = %market.event_ticker, "skipping unparseable event ticker");
                continue;
            };

            discovered.push(DiscoveredMarket {
                event_ticker: market.event_ticker,
                market_ticker: market.ticker,
                home,
                away,
                close_time: market.expected_expiration_time,
            });
        }

        Ok(discovered)
    }

    async fn fetch_orderbook(&self, market_ticker: &str) -> Result<RawOrderbook, CollectionError> {
        let url = format!("{}/markets/{}/orderbook", self.base_url, market_ticker);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CollectionError::Api {
                status: response.status().as_u16(),
                url,
            });
        }

        let body: OrderbookResponse = response
            .json()
            .await
            .map_err(|e| CollectionError::Decode(e.to_string()))?;

        Ok(RawOrderbook {
            yes: body.orderbook.yes.unwrap_or_default(),
            no: body.orderbook.no.unwrap_or_default(),
        })
    }

    async fn fetch_market_info(&self, market_ticker: &str) -> Result<MarketInfo, CollectionError> {
        let url = format!("{}/markets/{}", self.base_url, market_ticker);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CollectionError::Api {
                status: response.status().as_u16(),
                url,
            });
        }

        let body: MarketResponse = response
            .json()
            .await
            .map_err(|e| CollectionError::Decode(e.to_string()))?;

        Ok(MarketInfo {
            open_interest: body.market.open_interest,
        })
    }
}

/// Split an event ticker like `KXNFLGAME-26JAN10GBCHI` into the two
/// participant codes `(away, home)`.
///
/// The suffix is a 7-char date followed by the concatenated 2-3 char codes.
/// A 5-char tail is ambiguous (2+3 or 3+2); we assume 2+3, the common case.
fn parse_event_ticker(event_ticker: &str) -> Option<(String, String)> {
    let (_series, suffix) = event_ticker.split_once('-')?;
    if suffix.contains('-') || !suffix.is_ascii() || suffix.len() <= 7 {
        return None;
    }

    let teams = &suffix[7..];
    let split_at = match teams.len() {
        0..=3 => return None,
        4 | 5 => 2,
        6 => 3,
        n => n / 2,
    };

    let (away, home) = teams.split_at(split_at);
    Some((away.to_string(), home.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_team_codes_by_tail_length() {
        assert_eq!(
            parse_event_ticker("KXNFLGAME-26JAN10GBCHI"),
            Some(("GB".to_string(), "CHI".to_string()))
        );
        assert_eq!(
            parse_event_ticker("KXNFLGAME-26JAN10NENY"),
            Some(("NE".to_string(), "NY".to_string()))
        );
        assert_eq!(
            parse_event_ticker("KXNFLGAME-26JAN10MIADET"),
            Some(("MIA".to_string(), "DET".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_tickers() {
        assert_eq!(parse_event_ticker("KXNFLGAME"), None);
        assert_eq!(parse_event_ticker("KXNFLGAME-26JAN10"), None);
        assert_eq!(parse_event_ticker("KXNFLGAME-26JAN10GB"), None);
        assert_eq!(parse_event_ticker("A-B-C"), None);
    }

    #[test]
    fn client_construction_applies_timeout() {
        let client = KalshiClient::new(
            "https://api.example.com/trade-api/v2",
            "KXNFLGAME",
            Duration::from_secs(10),
        );
        assert!(client.is_ok());
    }
}
