use std::collections::HashMap;
use std::sync::Arc;

use invest::{InstrumentDirectory, QuoteSource, WatchlistStore};
use log::{debug, error, info};
use tokio::sync::Mutex;

const STORE_FAILURE_REPLY: &str = "Something went wrong on our side. Try again in a moment.";

/// Which input the next plain message from a user is expected to carry.
/// A user with no entry in the map is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    TickerForQuote,
    TickerForAdd,
    TickerForDelete,
}

/// What to do when a command arms a new prompt while another is still
/// pending. Current policy: the new prompt silently replaces the old one.
fn resolve_rearm(_prev: Awaiting, next: Awaiting) -> Awaiting {
    next
}

/// Per-user conversation state machine. Commands arm a prompt; the next text
/// message consumes it unconditionally, so the user is idle again after every
/// exchange regardless of outcome.
pub struct Controller {
    directory: Arc<dyn InstrumentDirectory>,
    quotes: Arc<dyn QuoteSource>,
    watchlist: WatchlistStore,
    pending: Mutex<HashMap<i64, Awaiting>>,
}

impl Controller {
    pub fn new(
        directory: Arc<dyn InstrumentDirectory>,
        quotes: Arc<dyn QuoteSource>,
        watchlist: WatchlistStore,
    ) -> Self {
        Self {
            directory,
            quotes,
            watchlist,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub async fn start_quote(&self, user_id: i64) -> &'static str {
        self.arm(user_id, Awaiting::TickerForQuote).await;
        "Which ticker? Send me the symbol (e.g. SBER)."
    }

    pub async fn start_add(&self, user_id: i64) -> &'static str {
        self.arm(user_id, Awaiting::TickerForAdd).await;
        "Which ticker should I add to your favorites?"
    }

    pub async fn start_delete(&self, user_id: i64) -> &'static str {
        self.arm(user_id, Awaiting::TickerForDelete).await;
        "Which ticker should I remove from your favorites?"
    }

    async fn arm(&self, user_id: i64, next: Awaiting) {
        let mut pending = self.pending.lock().await;
        let armed = match pending.remove(&user_id) {
            Some(prev) => {
                debug!("controller: rearm user_id={user_id} prev={prev:?} next={next:?}");
                resolve_rearm(prev, next)
            }
            None => next,
        };
        pending.insert(user_id, armed);
    }

    /// Routes a plain text message. `None` means the user was idle and the
    /// message is someone else's to interpret.
    pub async fn handle_text(
        &self,
        user_id: i64,
        username: Option<&str>,
        text: &str,
    ) -> Option<String> {
        // Take the state before any I/O so a racing second message from the
        // same user finds the slot already empty.
        let awaiting = self.pending.lock().await.remove(&user_id)?;
        let ticker = text.trim().to_uppercase();

        info!("controller: consuming user_id={user_id} awaiting={awaiting:?} ticker={ticker}");

        Some(match awaiting {
            Awaiting::TickerForQuote => self.quote_reply(&ticker).await,
            Awaiting::TickerForAdd => self.add_reply(user_id, username, &ticker).await,
            Awaiting::TickerForDelete => self.delete_reply(user_id, &ticker).await,
        })
    }

    async fn quote_reply(&self, ticker: &str) -> String {
        let instrument = match self.directory.resolve(ticker).await {
            Ok(Some(instrument)) => instrument,
            Ok(None) => return format!("I couldn't find ticker {ticker} in any instrument category."),
            Err(e) => {
                error!("quote: resolve failed ticker={ticker} err={e:?}");
                return format!("I couldn't find ticker {ticker} in any instrument category.");
            }
        };

        match self.quotes.latest_price(&instrument.figi).await {
            Ok(Some(price)) => format!(
                "{}: {} {}",
                instrument.ticker,
                price,
                instrument.currency.to_uppercase()
            ),
            Ok(None) => format!("No recent price data for {ticker}. Try again later."),
            Err(e) => {
                error!("quote: price fetch failed figi={} err={e:?}", instrument.figi);
                format!("No recent price data for {ticker}. Try again later.")
            }
        }
    }

    async fn add_reply(&self, user_id: i64, username: Option<&str>, ticker: &str) -> String {
        let instrument = match self.directory.resolve(ticker).await {
            Ok(Some(instrument)) => instrument,
            Ok(None) => return format!("I couldn't find ticker {ticker}, nothing was added."),
            Err(e) => {
                error!("add: resolve failed user_id={user_id} ticker={ticker} err={e:?}");
                return format!("I couldn't find ticker {ticker}, nothing was added.");
            }
        };

        match self
            .watchlist
            .add_favorite(user_id, username, &instrument.ticker, &instrument.figi)
            .await
        {
            Ok(()) => {
                info!("add: saved user_id={user_id} ticker={ticker} figi={}", instrument.figi);
                format!("{ticker} added to your favorites.")
            }
            Err(e) => {
                error!("add: store failed user_id={user_id} ticker={ticker} err={e:?}");
                STORE_FAILURE_REPLY.to_string()
            }
        }
    }

    async fn delete_reply(&self, user_id: i64, ticker: &str) -> String {
        match self.watchlist.remove_favorite(user_id, ticker).await {
            Ok(true) => {
                info!("delete: removed user_id={user_id} ticker={ticker}");
                format!("{ticker} removed from your favorites.")
            }
            Ok(false) => format!("{ticker} is not in your favorites."),
            Err(e) => {
                error!("delete: store failed user_id={user_id} ticker={ticker} err={e:?}");
                STORE_FAILURE_REPLY.to_string()
            }
        }
    }

    pub async fn list_favorites(&self, user_id: i64) -> String {
        match self.watchlist.list_favorites(user_id).await {
            Ok(favorites) if favorites.is_empty() => {
                "You have no favorites yet. Use /addfavorite to save one.".to_string()
            }
            Ok(favorites) => {
                let mut out = String::from("Your favorites:");
                for favorite in favorites {
                    out.push_str(&format!("\n• {} ({})", favorite.ticker, favorite.figi));
                }
                out
            }
            Err(e) => {
                error!("list: store failed user_id={user_id} err={e:?}");
                STORE_FAILURE_REPLY.to_string()
            }
        }
    }
}
