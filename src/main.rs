use std::sync::Arc;

use anyhow::Error;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dptree;
use teloxide::prelude::*;

use crate::commands::Command;
use crate::database::DatabasePool;
use crate::handlers::{AdminState, callback_handler, command_handler, text_handler};

mod commands;
mod config;
mod database;
mod handlers;
mod roles;

#[tokio::main]
async fn main() -> Result<(), Error> {
    use log::LevelFilter;
    use std::io::Write;

    let log_level = match std::env::var("LOG_LEVEL").unwrap_or_default().to_uppercase().as_str() {
        "ERROR" => LevelFilter::Error,
        "DEBUG" => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .filter(None, log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    log::info!("Starting community bot...");

    if let Err(e) = config::load_environment() {
        log::error!("Failed to load environment: {}", e);
        return Err(e);
    }

    let db_path = config::get_database_path();
    if let Err(e) = database::init_database(&db_path) {
        log::error!("Failed to initialize the database: {}", e);
        return Err(e);
    }
    log::info!("Database initialized at {:?}", db_path);

    // 3 simultaneous database connections
    let db_pool = Arc::new(DatabasePool::new(db_path, 3));

    let bot = Bot::from_env();

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<AdminState>, AdminState>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command_handler),
                )
                .endpoint(text_handler),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<AdminState>, AdminState>()
                .endpoint(callback_handler),
        );

    log::info!("Starting to dispatch updates...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![db_pool, InMemStorage::<AdminState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot shutdown complete");
    Ok(())
}
