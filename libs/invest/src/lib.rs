mod errors;
mod instrument_client;
mod price_client;
mod quotation;
mod watchlist_store;

pub use errors::InvestError;
pub use instrument_client::{
    DEFAULT_BASE_URL, Instrument, InstrumentClient, InstrumentDirectory, InstrumentKind, SCAN_ORDER,
};
pub use price_client::{Candle, PriceClient, QuoteSource};
pub use quotation::Quotation;
pub use watchlist_store::{Favorite, WatchlistStore};
