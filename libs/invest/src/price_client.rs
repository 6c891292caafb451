use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{error, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::InvestError;
use crate::quotation::Quotation;

const MARKET_DATA_SERVICE: &str = "tinkoff.public.invest.api.contract.v1.MarketDataService";

/// Extra attempts after the first failed fetch.
const RETRY_ATTEMPTS: usize = 2;

/// "Latest price" means the close of the last bar in a trailing 24-hour
/// window of one-minute candles.
const WINDOW_HOURS: i64 = 24;
const CANDLE_INTERVAL: &str = "CANDLE_INTERVAL_1_MIN";

#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub open: Quotation,
    #[serde(default)]
    pub high: Quotation,
    #[serde(default)]
    pub low: Quotation,
    #[serde(default)]
    pub close: Quotation,
    #[serde(rename = "isComplete", default)]
    pub is_complete: bool,
}

#[derive(Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    candles: Vec<Candle>,
}

/// Most recent price observation for a resolved instrument.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `Ok(None)` when there is no price to report: empty candle series, or
    /// transport kept failing past the retry budget.
    async fn latest_price(&self, figi: &str) -> Result<Option<Quotation>, InvestError>;
}

pub struct PriceClient {
    client: Client,
    base_api: String,
    token: String,
}

impl PriceClient {
    pub fn new(base_api: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_api: base_api.into(),
            token: token.into(),
        }
    }

    /// Fetches the candle series, retrying transient transport failures.
    /// Callers see a complete series or a terminal error, never a partial one.
    pub async fn fetch_candles(&self, figi: &str) -> Result<Vec<Candle>, InvestError> {
        let mut attempt = 0;
        loop {
            match self.try_fetch(figi).await {
                Ok(candles) => return Ok(candles),
                Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                    attempt += 1;
                    warn!("fetch_candles: transient failure figi={figi} attempt={attempt} err={e:?}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch(&self, figi: &str) -> Result<Vec<Candle>, InvestError> {
        let to = Utc::now();
        let from = to - Duration::hours(WINDOW_HOURS);

        let url = format!(
            "{}/{}/GetCandles",
            self.base_api.trim_end_matches('/'),
            MARKET_DATA_SERVICE
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({
                "figi": figi,
                "from": from.to_rfc3339(),
                "to": to.to_rfc3339(),
                "interval": CANDLE_INTERVAL,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InvestError::Api {
                endpoint: "GetCandles".to_string(),
                status: response.status(),
            });
        }

        let parsed: CandlesResponse = response.json().await?;
        Ok(parsed.candles)
    }
}

#[async_trait]
impl QuoteSource for PriceClient {
    async fn latest_price(&self, figi: &str) -> Result<Option<Quotation>, InvestError> {
        let candles = match self.fetch_candles(figi).await {
            Ok(candles) => candles,
            Err(e) if e.is_transient() => {
                error!("latest_price: transport failed after {RETRY_ATTEMPTS} retries figi={figi} err={e:?}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if candles.is_empty() {
            warn!("latest_price: empty candle series figi={figi}");
        }

        Ok(last_close(&candles))
    }
}

/// Closing price of the most recent bar in the series.
fn last_close(candles: &[Candle]) -> Option<Quotation> {
    candles.last().map(|c| c.close)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: Quotation) -> Candle {
        Candle {
            time: None,
            open: close,
            high: close,
            low: close,
            close,
            is_complete: true,
        }
    }

    #[test]
    fn picks_the_most_recent_close() {
        let series = vec![
            candle(Quotation::new(100, 500_000_000)),
            candle(Quotation::new(101, 250_000_000)),
        ];

        assert_eq!(last_close(&series), Some(Quotation::new(101, 250_000_000)));
    }

    #[test]
    fn empty_series_has_no_price() {
        assert_eq!(last_close(&[]), None);
    }

    #[test]
    fn parses_candles_payload() {
        let raw = r#"{"candles":[{"open":{"units":"100","nano":500000000},"close":{"units":"101","nano":250000000},"high":{"units":"101","nano":500000000},"low":{"units":"100"},"volume":"153","time":"2024-05-01T10:00:00Z","isComplete":true}]}"#;
        let parsed: CandlesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candles.len(), 1);
        assert_eq!(parsed.candles[0].close, Quotation::new(101, 250_000_000));
        assert!(parsed.candles[0].is_complete);
    }

    #[test]
    fn parses_empty_payload() {
        let parsed: CandlesResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candles.is_empty());
    }

    #[tokio::test]
    async fn retries_exhausted_yield_unavailable() {
        // Port 9 (discard) refuses the connection, so every attempt fails
        // with a transient transport error. After the retry budget the
        // caller gets a terminal Unavailable, not an Err.
        let client = PriceClient::new("http://127.0.0.1:9", "token");
        let price = client.latest_price("BBG004730N88").await.unwrap();
        assert_eq!(price, None);
    }

    #[tokio::test]
    async fn transient_failure_surfaces_as_error_from_fetch_candles() {
        let client = PriceClient::new("http://127.0.0.1:9", "token");
        let err = client.fetch_candles("BBG004730N88").await.unwrap_err();
        assert!(err.is_transient());
    }
}
