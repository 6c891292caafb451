use std::sync::Arc;

use anyhow::Result;
use bot::{
    command::{self, Command},
    config::Config,
    controller::Controller,
};
use invest::{InstrumentClient, PriceClient, WatchlistStore};
use log::info;
use teloxide::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let watchlist = WatchlistStore::connect(&config.database_url).await?;
    info!("watchlist store ready at {}", config.database_url);

    let directory = Arc::new(InstrumentClient::new(
        &config.invest_base_url,
        &config.invest_token,
    ));
    let quotes = Arc::new(PriceClient::new(
        &config.invest_base_url,
        &config.invest_token,
    ));

    let controller = Arc::new(Controller::new(directory, quotes, watchlist));

    let bot = Bot::new(&config.telegram_token);

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command::handle_command),
        )
        .branch(dptree::endpoint(command::handle_text));

    info!("starting dispatcher");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("shutdown complete");
    Ok(())
}
