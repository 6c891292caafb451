use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::InvestError;

pub const DEFAULT_BASE_URL: &str = "https://invest-public-api.tinkoff.ru/rest";

const INSTRUMENTS_SERVICE: &str = "tinkoff.public.invest.api.contract.v1.InstrumentsService";

/// Categories in resolution order. A ticker listed in more than one category
/// resolves to the earliest one here.
pub const SCAN_ORDER: [InstrumentKind; 5] = [
    InstrumentKind::Share,
    InstrumentKind::Bond,
    InstrumentKind::Etf,
    InstrumentKind::Currency,
    InstrumentKind::Future,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstrumentKind {
    #[default]
    Share,
    Bond,
    Etf,
    Currency,
    Future,
}

impl InstrumentKind {
    fn endpoint(self) -> &'static str {
        match self {
            InstrumentKind::Share => "Shares",
            InstrumentKind::Bond => "Bonds",
            InstrumentKind::Etf => "Etfs",
            InstrumentKind::Currency => "Currencies",
            InstrumentKind::Future => "Futures",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentKind::Share => "share",
            InstrumentKind::Bond => "bond",
            InstrumentKind::Etf => "etf",
            InstrumentKind::Currency => "currency",
            InstrumentKind::Future => "future",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    pub figi: String,
    pub ticker: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip)]
    pub kind: InstrumentKind,
}

#[derive(Deserialize)]
struct InstrumentsResponse {
    #[serde(default)]
    instruments: Vec<Instrument>,
}

/// Ticker lookup across every instrument category of the directory service.
#[async_trait]
pub trait InstrumentDirectory: Send + Sync {
    /// Exact-match lookup; `Ok(None)` when no category lists the ticker.
    async fn resolve(&self, ticker: &str) -> Result<Option<Instrument>, InvestError>;
}

pub struct InstrumentClient {
    client: Client,
    base_api: String,
    token: String,
}

impl InstrumentClient {
    pub fn new(base_api: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_api: base_api.into(),
            token: token.into(),
        }
    }

    async fn fetch_category(&self, kind: InstrumentKind) -> Result<Vec<Instrument>, InvestError> {
        let url = format!(
            "{}/{}/{}",
            self.base_api.trim_end_matches('/'),
            INSTRUMENTS_SERVICE,
            kind.endpoint()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "instrumentStatus": "INSTRUMENT_STATUS_ALL" }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InvestError::Api {
                endpoint: kind.endpoint().to_string(),
                status: response.status(),
            });
        }

        let mut parsed: InstrumentsResponse = response.json().await?;
        for instrument in &mut parsed.instruments {
            instrument.kind = kind;
        }

        Ok(parsed.instruments)
    }
}

#[async_trait]
impl InstrumentDirectory for InstrumentClient {
    async fn resolve(&self, ticker: &str) -> Result<Option<Instrument>, InvestError> {
        // The whole directory is re-fetched on every call; nothing is cached,
        // so results are never stale.
        let mut directory = Vec::new();
        for kind in SCAN_ORDER {
            let batch = self.fetch_category(kind).await?;
            debug!(
                "resolve: loaded category={} count={}",
                kind.as_str(),
                batch.len()
            );
            directory.extend(batch);
        }

        match first_match(directory, ticker) {
            Some(instrument) => {
                info!(
                    "resolve: matched ticker={} figi={} category={}",
                    ticker,
                    instrument.figi,
                    instrument.kind.as_str()
                );
                Ok(Some(instrument))
            }
            None => {
                error!("resolve: ticker not found in any category ticker={ticker}");
                Ok(None)
            }
        }
    }
}

/// First case-sensitive exact match in an already scan-ordered directory.
fn first_match(directory: Vec<Instrument>, ticker: &str) -> Option<Instrument> {
    directory.into_iter().find(|i| i.ticker == ticker)
}
