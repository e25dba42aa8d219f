use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::config::{self, MAX_MESSAGE_LENGTH};
use crate::database::DatabasePool;
use crate::handlers::admin::is_admin;
use crate::handlers::broadcast::render_broadcast_html;
use crate::handlers::command::remember_sender;
use crate::handlers::state::{AdminDialogue, AdminState};
use crate::handlers::ui;
use crate::handlers::users::format_user_line;

/// Accepts prompt input only when it is non-blank and within the Telegram
/// message limit.
pub fn acceptable_prompt_text(text: Option<&str>) -> Option<&str> {
    let text = text?;
    if text.trim().is_empty() || text.chars().count() > MAX_MESSAGE_LENGTH {
        return None;
    }
    Some(text)
}

/// Routes plain text messages through the admin conversation state. Invalid
/// input re-prompts and leaves the state untouched; storage failures do the
/// same so the admin can simply retry.
pub async fn text_handler(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    db_pool: Arc<DatabasePool>,
) -> Result<(), anyhow::Error> {
    remember_sender(&db_pool, &msg).await;

    if !is_admin(&msg) {
        return Ok(());
    }

    let state = dialogue.get().await?.unwrap_or_default();
    match state {
        AdminState::SearchingUser => {
            let Some(query) = acceptable_prompt_text(msg.text()) else {
                bot.send_message(msg.chat.id, "❌ Invalid query. Please try again.")
                    .await?;
                return Ok(());
            };

            match db_pool.search_users(query).await {
                Ok(users) => {
                    let text = if users.is_empty() {
                        "❌ No users matched your query.".to_string()
                    } else {
                        let mut text = "🔍 Search results:\n\n".to_string();
                        for user in &users {
                            text.push_str(&format_user_line(user));
                            text.push('\n');
                        }
                        text
                    };
                    bot.send_message(msg.chat.id, text)
                        .reply_markup(ui::admin_panel_keyboard())
                        .await?;
                    dialogue.exit().await?;
                }
                Err(e) => {
                    log::error!("User search failed: {}", e);
                    bot.send_message(msg.chat.id, "❌ Search failed, please try again.")
                        .await?;
                }
            }
        }
        AdminState::EditingWelcome => {
            let Some(new_text) = acceptable_prompt_text(msg.text()) else {
                bot.send_message(
                    msg.chat.id,
                    "❌ Invalid message. It cannot be empty or too long.",
                )
                .await?;
                return Ok(());
            };

            match db_pool
                .set_setting(config::WELCOME_SETTING_KEY, new_text)
                .await
            {
                Ok(()) => {
                    bot.send_message(msg.chat.id, "✅ Welcome message updated!")
                        .await?;
                    dialogue.exit().await?;
                }
                Err(e) => {
                    log::error!("Failed to store welcome message: {}", e);
                    bot.send_message(
                        msg.chat.id,
                        "❌ Failed to update the welcome message, please try again.",
                    )
                    .await?;
                }
            }
        }
        AdminState::BroadcastComposing { filter } => {
            let Some(body) = acceptable_prompt_text(msg.text()) else {
                bot.send_message(
                    msg.chat.id,
                    "❌ Invalid message. It cannot be empty or too long.",
                )
                .await?;
                return Ok(());
            };
            // Recipients get this body with ParseMode::Html, so it has to be
            // valid HTML: formatting entities become tags, stray '<'/'&' get
            // escaped rather than failing every delivery.
            let body = render_broadcast_html(body, msg.entities().unwrap_or(&[]));

            let recipients = match db_pool.count_users(filter).await {
                Ok(count) => count,
                Err(e) => {
                    log::error!("Failed to count broadcast recipients: {}", e);
                    bot.send_message(
                        msg.chat.id,
                        "❌ Could not prepare the broadcast, please try again.",
                    )
                    .await?;
                    return Ok(());
                }
            };

            let confirm_text = format!(
                "📢 Broadcast confirmation\n\nRecipient role: {}\nRecipients: {}\n\nMessage:\n\n{}",
                filter, recipients, body
            );
            // Preview with the same parse mode the recipients will see.
            bot.send_message(msg.chat.id, confirm_text)
                .parse_mode(ParseMode::Html)
                .reply_markup(ui::broadcast_confirm_keyboard())
                .await?;
            dialogue
                .update(AdminState::BroadcastConfirming {
                    filter,
                    message: body,
                })
                .await?;
        }
        // Idle admins chatting, or states waiting on a button press.
        AdminState::Idle
        | AdminState::BroadcastSelectingRole
        | AdminState::BroadcastConfirming { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_blank() {
        assert_eq!(acceptable_prompt_text(None), None);
        assert_eq!(acceptable_prompt_text(Some("")), None);
        assert_eq!(acceptable_prompt_text(Some("   \n\t")), None);
    }

    #[test]
    fn test_rejects_over_length() {
        let too_long = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert_eq!(acceptable_prompt_text(Some(&too_long)), None);

        let at_limit = "x".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(acceptable_prompt_text(Some(&at_limit)), Some(at_limit.as_str()));
    }

    #[test]
    fn test_accepts_ordinary_text() {
        assert_eq!(acceptable_prompt_text(Some("Exam tomorrow")), Some("Exam tomorrow"));
    }
}
