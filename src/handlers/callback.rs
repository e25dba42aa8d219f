use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ParseMode};

use crate::database::DatabasePool;
use crate::handlers::actions::CallbackAction;
use crate::handlers::admin::is_admin_id;
use crate::handlers::admin_panel::edit_to_admin_panel;
use crate::handlers::broadcast::{report_text, run_broadcast};
use crate::handlers::command::load_welcome;
use crate::handlers::state::{AdminDialogue, AdminState};
use crate::handlers::ui;
use crate::handlers::users::load_page;

const CONTACTS_TEXT: &str = "📞 Contacts\n\n\
    📧 Email: info@university.edu\n\
    📱 Phone: +380 XX XXX XX XX\n\
    🌐 Website: www.university.edu\n\n\
    Office hours:\n\
    Mon-Fri: 9:00 - 18:00\n\
    Sat-Sun: closed";

const INFO_TEXT: &str = "This bot helps manage the university community.";

pub async fn callback_handler(
    bot: Bot,
    dialogue: AdminDialogue,
    q: CallbackQuery,
    db_pool: Arc<DatabasePool>,
) -> Result<(), anyhow::Error> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    log::info!("Received callback query with data: {}", data);

    let Some(action) = CallbackAction::decode(data) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    // Button presses count as activity too.
    if let Err(e) = db_pool
        .upsert_user(
            q.from.id.0 as i64,
            q.from.username.clone(),
            q.from.full_name(),
        )
        .await
    {
        log::error!("Failed to upsert user {}: {}", q.from.id, e);
    }

    let Some(message) = q.message.as_ref().and_then(|m| m.regular_message()).cloned() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    // Public actions first; everything past this block is admin-only and a
    // non-admin press is acknowledged without effect.
    match &action {
        CallbackAction::Info => {
            bot.edit_message_text(message.chat.id, message.id, INFO_TEXT)
                .reply_markup(ui::back_to_start_keyboard())
                .await?;
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
        CallbackAction::Contacts => {
            bot.edit_message_text(message.chat.id, message.id, CONTACTS_TEXT)
                .reply_markup(ui::back_to_start_keyboard())
                .await?;
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
        CallbackAction::BackToStart => {
            let welcome = load_welcome(&db_pool).await;
            bot.edit_message_text(message.chat.id, message.id, welcome)
                .reply_markup(ui::start_keyboard())
                .await?;
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
        CallbackAction::Noop => {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
        _ => {}
    }

    if !is_admin_id(q.from.id.0 as i64) {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    }

    match action {
        CallbackAction::AdminPanel => {
            dialogue.exit().await?;
            edit_to_admin_panel(&bot, &message, &db_pool).await?;
            bot.answer_callback_query(q.id).await?;
        }
        CallbackAction::ManageUsers { page, filter } => {
            match load_page(&db_pool, page, filter).await {
                Ok(list) => {
                    bot.edit_message_text(message.chat.id, message.id, list.render_text())
                        .reply_markup(ui::user_list_keyboard(&list))
                        .await?;
                    bot.answer_callback_query(q.id).await?;
                }
                Err(e) => {
                    log::error!("Failed to load user list: {}", e);
                    bot.answer_callback_query(q.id)
                        .text("❌ Failed to load users.")
                        .show_alert(true)
                        .await?;
                }
            }
        }
        CallbackAction::SetRole {
            user_id,
            role,
            page,
            filter,
        } => {
            match db_pool.set_role(user_id, role).await {
                Ok(()) => {
                    let note = match role {
                        Some(role) => format!("✅ Role for {} set to {}", user_id, role),
                        None => format!("✅ Role for {} cleared", user_id),
                    };
                    bot.answer_callback_query(q.id).text(note).await?;

                    // Redraw the same page so the change is visible in place.
                    if let Ok(list) = load_page(&db_pool, page, filter).await {
                        let _ = bot
                            .edit_message_text(message.chat.id, message.id, list.render_text())
                            .reply_markup(ui::user_list_keyboard(&list))
                            .await;
                    }
                }
                Err(e) => {
                    log::error!("Failed to set role for {}: {}", user_id, e);
                    bot.answer_callback_query(q.id)
                        .text("❌ Failed to set role.")
                        .show_alert(true)
                        .await?;
                }
            }
        }
        CallbackAction::SearchUser => {
            dialogue.update(AdminState::SearchingUser).await?;
            bot.edit_message_text(
                message.chat.id,
                message.id,
                "🔍 Enter a user id or part of their name/username:",
            )
            .await?;
            bot.answer_callback_query(q.id).await?;
        }
        CallbackAction::EditWelcome => {
            dialogue.update(AdminState::EditingWelcome).await?;
            bot.edit_message_text(
                message.chat.id,
                message.id,
                "✏️ Enter the new welcome message:",
            )
            .await?;
            bot.answer_callback_query(q.id).await?;
        }
        CallbackAction::Broadcast => {
            dialogue.update(AdminState::BroadcastSelectingRole).await?;
            bot.edit_message_text(
                message.chat.id,
                message.id,
                "📢 Choose which role should receive the message:",
            )
            .reply_markup(ui::broadcast_roles_keyboard())
            .await?;
            bot.answer_callback_query(q.id).await?;
        }
        CallbackAction::BroadcastRole(filter) => {
            // Only meaningful while a role is being chosen; a stale button
            // press is acknowledged and dropped.
            if !matches!(dialogue.get().await?, Some(AdminState::BroadcastSelectingRole)) {
                bot.answer_callback_query(q.id).await?;
                return Ok(());
            }
            dialogue
                .update(AdminState::BroadcastComposing { filter })
                .await?;
            bot.edit_message_text(
                message.chat.id,
                message.id,
                format!(
                    "✅ Selected role: {}\n\n💬 Now enter the message to send. HTML is supported.",
                    filter
                ),
            )
            .await?;
            bot.answer_callback_query(q.id).await?;
        }
        CallbackAction::BroadcastConfirm => {
            let Some(AdminState::BroadcastConfirming { filter, message: body }) =
                dialogue.get().await?
            else {
                bot.answer_callback_query(q.id).await?;
                return Ok(());
            };

            bot.answer_callback_query(q.id)
                .text("🚀 Starting broadcast...")
                .await?;
            bot.edit_message_text(message.chat.id, message.id, "⏳ Sending broadcast...")
                .await?;

            let admin_id = q.from.id.0 as i64;
            let outcome = run_broadcast(&db_pool, admin_id, filter, &body, |user_id| {
                let bot = bot.clone();
                let body = body.clone();
                async move {
                    bot.send_message(ChatId(user_id), body)
                        .parse_mode(ParseMode::Html)
                        .await?;
                    Ok(())
                }
            })
            .await;
            match outcome {
                Ok((sent, failed)) => {
                    bot.edit_message_text(message.chat.id, message.id, report_text(sent, failed))
                        .await?;
                }
                Err(e) => {
                    log::error!("Broadcast by {} failed: {}", admin_id, e);
                    bot.edit_message_text(
                        message.chat.id,
                        message.id,
                        "❌ Broadcast failed, please try again.",
                    )
                    .await?;
                }
            }
            dialogue.exit().await?;
        }
        CallbackAction::BroadcastCancel => {
            dialogue.exit().await?;
            bot.edit_message_text(message.chat.id, message.id, "❌ Broadcast cancelled.")
                .await?;
            bot.answer_callback_query(q.id).await?;
        }
        // Public actions already handled above.
        CallbackAction::Info
        | CallbackAction::Contacts
        | CallbackAction::BackToStart
        | CallbackAction::Noop => {}
    }

    Ok(())
}
