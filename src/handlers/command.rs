use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::commands::Command;
use crate::config;
use crate::database::DatabasePool;
use crate::handlers::admin::is_admin;
use crate::handlers::admin_panel::send_admin_panel;
use crate::handlers::ui;

/// Every observed message refreshes the sender's profile row. A storage
/// hiccup here is logged but never blocks handling the message itself.
pub async fn remember_sender(db_pool: &Arc<DatabasePool>, msg: &Message) {
    if let Some(user) = msg.from.as_ref().filter(|u| !u.is_bot) {
        let result = db_pool
            .upsert_user(
                user.id.0 as i64,
                user.username.clone(),
                user.full_name(),
            )
            .await;
        if let Err(e) = result {
            log::error!("Failed to upsert user {}: {}", user.id, e);
        }
    }
}

/// Current welcome text, falling back to the seeded default if the setting
/// is missing or storage is down.
pub async fn load_welcome(db_pool: &Arc<DatabasePool>) -> String {
    match db_pool.get_setting(config::WELCOME_SETTING_KEY).await {
        Ok(Some(text)) => text,
        Ok(None) => config::DEFAULT_WELCOME_MESSAGE.to_string(),
        Err(e) => {
            log::error!("Failed to load welcome message: {}", e);
            config::DEFAULT_WELCOME_MESSAGE.to_string()
        }
    }
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    db_pool: Arc<DatabasePool>,
) -> Result<(), anyhow::Error> {
    remember_sender(&db_pool, &msg).await;

    match cmd {
        Command::Start => {
            let welcome = load_welcome(&db_pool).await;
            bot.send_message(msg.chat.id, welcome)
                .reply_markup(ui::start_keyboard())
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::Admin => {
            // Silently ignored for everyone else.
            if is_admin(&msg) {
                send_admin_panel(&bot, msg.chat.id, &db_pool).await?;
            }
        }
    }

    Ok(())
}
