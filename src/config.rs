use std::env;
use std::path::PathBuf;

use lazy_static::lazy_static;

pub const MAX_MESSAGE_LENGTH: usize = 4096;
pub const MAX_SEARCH_LENGTH: usize = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome message placeholder";
pub const WELCOME_SETTING_KEY: &str = "welcome_message";

lazy_static! {
    static ref ADMIN_IDS: Vec<i64> = parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default());
    static ref PAGE_SIZE: i64 = env::var("PAGE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);
}

/// Loads `.env` and validates that the bot cannot start without a token and
/// at least one admin. Must run before the lazy statics are first read.
pub fn load_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    if env::var("TELOXIDE_TOKEN").is_err() {
        anyhow::bail!("TELOXIDE_TOKEN is not set");
    }
    if parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default()).is_empty() {
        anyhow::bail!("ADMIN_IDS is not set or contains no valid ids");
    }
    Ok(())
}

pub fn admin_ids() -> &'static [i64] {
    &ADMIN_IDS
}

pub fn page_size() -> i64 {
    *PAGE_SIZE
}

pub fn get_database_path() -> PathBuf {
    PathBuf::from(env::var("DB_PATH").unwrap_or_else(|_| "bot.db".to_string()))
}

pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',').filter_map(|s| s.trim().parse().ok()).collect()
}
