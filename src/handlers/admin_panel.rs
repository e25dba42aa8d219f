use std::sync::Arc;

use teloxide::prelude::*;

use crate::database::{DatabasePool, RoleStats};
use crate::handlers::ui;
use crate::roles::Role;

fn role_emoji(role: Role) -> &'static str {
    match role {
        Role::Student => "🎓",
        Role::Applicant => "📚",
        Role::Lecturer => "🧑‍🏫",
        Role::Parent => "👪",
    }
}

pub fn panel_text(stats: &RoleStats) -> String {
    let mut text = format!("⚙️ Admin panel\n\n👤 Total users: {}\n", stats.total);
    for role in Role::ALL {
        text.push_str(&format!(
            "{} {}s: {}\n",
            role_emoji(role),
            role,
            stats.count_for(role)
        ));
    }
    text
}

/// Sends the panel as a fresh message (the /admin command path).
pub async fn send_admin_panel(
    bot: &Bot,
    chat_id: ChatId,
    db_pool: &Arc<DatabasePool>,
) -> anyhow::Result<()> {
    let stats = db_pool.role_stats().await?;
    bot.send_message(chat_id, panel_text(&stats))
        .reply_markup(ui::admin_panel_keyboard())
        .await?;
    log::info!("Admin {} opened the admin panel", chat_id.0);
    Ok(())
}

/// Redraws the panel in place (refresh / back-to-panel callbacks).
pub async fn edit_to_admin_panel(
    bot: &Bot,
    msg: &Message,
    db_pool: &Arc<DatabasePool>,
) -> anyhow::Result<()> {
    let stats = db_pool.role_stats().await?;
    // Telegram rejects edits that change nothing; a refresh with identical
    // stats is not an error worth surfacing.
    if let Err(e) = bot
        .edit_message_text(msg.chat.id, msg.id, panel_text(&stats))
        .reply_markup(ui::admin_panel_keyboard())
        .await
    {
        log::debug!("Panel refresh edit skipped: {}", e);
    }
    Ok(())
}
