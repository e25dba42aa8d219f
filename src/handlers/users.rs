use std::sync::Arc;

use crate::config;
use crate::database::{DatabasePool, UserRow};
use crate::roles::RoleFilter;

/// One page of the user-management list: the window of users, the position
/// within the full filtered set, and everything the keyboard needs to
/// render navigation.
#[derive(Debug, Clone)]
pub struct UserListPage {
    pub page: i64,
    pub filter: RoleFilter,
    pub users: Vec<UserRow>,
    pub total_users: i64,
    pub page_size: i64,
}

impl UserListPage {
    pub fn total_pages(&self) -> i64 {
        ((self.total_users + self.page_size - 1) / self.page_size).max(1)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        (self.page + 1) * self.page_size < self.total_users
    }

    pub fn render_text(&self) -> String {
        if self.users.is_empty() {
            return "No users found for this filter.".to_string();
        }

        let mut text = format!(
            "👤 User management (page {}/{})\n\n",
            self.page + 1,
            self.total_pages()
        );
        for user in &self.users {
            text.push_str(&format_user_line(user));
            text.push('\n');
        }
        text
    }
}

pub fn format_user_line(user: &UserRow) -> String {
    let mut line = format!("▪️ {} (ID: {})", user.full_name, user.id);
    if let Some(username) = &user.username {
        line.push_str(&format!(" (@{})", username));
    }
    match user.role {
        Some(role) => line.push_str(&format!(" | Role: {}", role)),
        None => line.push_str(" | Role: not set"),
    }
    line
}

pub async fn load_page(
    db_pool: &Arc<DatabasePool>,
    page: i64,
    filter: RoleFilter,
) -> anyhow::Result<UserListPage> {
    let page_size = config::page_size();
    let users = db_pool.list_users(page * page_size, page_size, filter).await?;
    let total_users = db_pool.count_users(filter).await?;

    Ok(UserListPage {
        page,
        filter,
        users,
        total_users,
        page_size,
    })
}
