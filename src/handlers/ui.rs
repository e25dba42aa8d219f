use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::handlers::actions::CallbackAction;
use crate::handlers::users::UserListPage;
use crate::roles::{Role, RoleFilter};

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), action.encode())
}

pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("ℹ️ Info", CallbackAction::Info)],
        vec![button("📞 Contacts", CallbackAction::Contacts)],
    ])
}

pub fn back_to_start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("⬅️ Back", CallbackAction::BackToStart)]])
}

pub fn admin_panel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("✏️ Edit welcome message", CallbackAction::EditWelcome)],
        vec![button(
            "👤 Manage users",
            CallbackAction::ManageUsers {
                page: 0,
                filter: RoleFilter::All,
            },
        )],
        vec![button("🔍 Find user", CallbackAction::SearchUser)],
        vec![button("📤 Send broadcast", CallbackAction::Broadcast)],
        vec![button("🔄 Refresh", CallbackAction::AdminPanel)],
    ])
}

pub fn broadcast_roles_keyboard() -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button(
        "📢 All users",
        CallbackAction::BroadcastRole(RoleFilter::All),
    )]];
    for role in Role::ALL {
        rows.push(vec![button(
            format!("🎓 {}", role),
            CallbackAction::BroadcastRole(RoleFilter::Only(role)),
        )]);
    }
    rows.push(vec![button("❌ Cancel", CallbackAction::BroadcastCancel)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn broadcast_confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("✅ Confirm and send", CallbackAction::BroadcastConfirm)],
        vec![button("❌ Cancel", CallbackAction::BroadcastCancel)],
    ])
}

/// Per-user role controls, navigation, filter tabs and a back button for one
/// page of the user list.
pub fn user_list_keyboard(page: &UserListPage) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();

    for user in &page.users {
        let mut role_row = Vec::new();
        for role in Role::ALL {
            let marker = if user.role == Some(role) { "✅ " } else { "" };
            role_row.push(button(
                format!("{}{}", marker, role),
                CallbackAction::SetRole {
                    user_id: user.id,
                    role: Some(role),
                    page: page.page,
                    filter: page.filter,
                },
            ));
        }
        rows.push(role_row);
        rows.push(vec![button(
            "❌ Clear role",
            CallbackAction::SetRole {
                user_id: user.id,
                role: None,
                page: page.page,
                filter: page.filter,
            },
        )]);
        rows.push(vec![button("—".repeat(20), CallbackAction::Noop)]);
    }

    let mut nav = Vec::new();
    if page.has_prev() {
        nav.push(button(
            "◀️ Previous",
            CallbackAction::ManageUsers {
                page: page.page - 1,
                filter: page.filter,
            },
        ));
    }
    if page.has_next() {
        nav.push(button(
            "▶️ Next",
            CallbackAction::ManageUsers {
                page: page.page + 1,
                filter: page.filter,
            },
        ));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }

    let mut tabs = vec![button(
        format!(
            "{}All",
            if page.filter == RoleFilter::All { "🔹 " } else { "" }
        ),
        CallbackAction::ManageUsers {
            page: 0,
            filter: RoleFilter::All,
        },
    )];
    for role in Role::ALL {
        let active = page.filter == RoleFilter::Only(role);
        let short: String = role.to_string().chars().take(3).collect();
        tabs.push(button(
            format!("{}{}", if active { "🔹 " } else { "" }, short),
            CallbackAction::ManageUsers {
                page: 0,
                filter: RoleFilter::Only(role),
            },
        ));
    }
    rows.push(tabs);

    rows.push(vec![button("⬅️ Back", CallbackAction::AdminPanel)]);
    InlineKeyboardMarkup::new(rows)
}
