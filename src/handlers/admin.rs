use teloxide::prelude::*;

use crate::config;

pub fn is_admin_id(user_id: i64) -> bool {
    config::admin_ids().contains(&user_id)
}

/// Admin checks go by the sending user, not the chat.
pub fn is_admin(msg: &Message) -> bool {
    msg.from
        .as_ref()
        .map(|user| is_admin_id(user.id.0 as i64))
        .unwrap_or(false)
}
