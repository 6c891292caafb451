use std::env::var;

#[derive(Clone)]
pub struct Config {
    pub telegram_token: String,
    pub invest_token: String,
    pub invest_base_url: String,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            telegram_token: var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN not set"),
            invest_token: var("INVEST_API_TOKEN").expect("INVEST_API_TOKEN not set"),
            invest_base_url: var("INVEST_API_BASE_URL")
                .unwrap_or_else(|_| invest::DEFAULT_BASE_URL.to_string()),
            database_url: var("DATABASE_URL").unwrap_or_else(|_| "sqlite://users.db".to_string()),
        }
    }
}
