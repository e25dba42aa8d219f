use crate::roles::{Role, RoleFilter};

/// Everything an inline button can ask for, decoded from the callback
/// payload in one place instead of string-splitting in each handler.
/// Unknown payloads decode to `None` and are acknowledged without effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Info,
    Contacts,
    BackToStart,
    AdminPanel,
    ManageUsers {
        page: i64,
        filter: RoleFilter,
    },
    SetRole {
        user_id: i64,
        role: Option<Role>,
        page: i64,
        filter: RoleFilter,
    },
    SearchUser,
    EditWelcome,
    Broadcast,
    BroadcastRole(RoleFilter),
    BroadcastConfirm,
    BroadcastCancel,
    Noop,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Info => "info".into(),
            CallbackAction::Contacts => "contacts".into(),
            CallbackAction::BackToStart => "start".into(),
            CallbackAction::AdminPanel => "admin".into(),
            CallbackAction::ManageUsers { page, filter } => {
                format!("users:{}:{}", page, filter.code())
            }
            CallbackAction::SetRole {
                user_id,
                role,
                page,
                filter,
            } => format!(
                "setrole:{}:{}:{}:{}",
                user_id,
                role.map(|r| r.code()).unwrap_or("clear"),
                page,
                filter.code()
            ),
            CallbackAction::SearchUser => "search".into(),
            CallbackAction::EditWelcome => "welcome".into(),
            CallbackAction::Broadcast => "bcast".into(),
            CallbackAction::BroadcastRole(filter) => format!("bcast_role:{}", filter.code()),
            CallbackAction::BroadcastConfirm => "bcast_confirm".into(),
            CallbackAction::BroadcastCancel => "bcast_cancel".into(),
            CallbackAction::Noop => "noop".into(),
        }
    }

    pub fn decode(data: &str) -> Option<CallbackAction> {
        match data {
            "info" => return Some(CallbackAction::Info),
            "contacts" => return Some(CallbackAction::Contacts),
            "start" => return Some(CallbackAction::BackToStart),
            "admin" => return Some(CallbackAction::AdminPanel),
            "search" => return Some(CallbackAction::SearchUser),
            "welcome" => return Some(CallbackAction::EditWelcome),
            "bcast" => return Some(CallbackAction::Broadcast),
            "bcast_confirm" => return Some(CallbackAction::BroadcastConfirm),
            "bcast_cancel" => return Some(CallbackAction::BroadcastCancel),
            "noop" => return Some(CallbackAction::Noop),
            _ => {}
        }

        let mut parts = data.split(':');
        match parts.next()? {
            "users" => {
                let page: i64 = parts.next()?.parse().ok()?;
                let filter = RoleFilter::from_code(parts.next()?)?;
                if page < 0 || parts.next().is_some() {
                    return None;
                }
                Some(CallbackAction::ManageUsers { page, filter })
            }
            "setrole" => {
                let user_id: i64 = parts.next()?.parse().ok()?;
                let role = match parts.next()? {
                    "clear" => None,
                    code => Some(Role::from_code(code)?),
                };
                let page: i64 = parts.next()?.parse().ok()?;
                let filter = RoleFilter::from_code(parts.next()?)?;
                if page < 0 || parts.next().is_some() {
                    return None;
                }
                Some(CallbackAction::SetRole {
                    user_id,
                    role,
                    page,
                    filter,
                })
            }
            "bcast_role" => {
                let filter = RoleFilter::from_code(parts.next()?)?;
                if parts.next().is_some() {
                    return None;
                }
                Some(CallbackAction::BroadcastRole(filter))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_manage_users() {
        assert_eq!(
            CallbackAction::decode("users:2:student"),
            Some(CallbackAction::ManageUsers {
                page: 2,
                filter: RoleFilter::Only(Role::Student),
            })
        );
        assert_eq!(
            CallbackAction::decode("users:0:all"),
            Some(CallbackAction::ManageUsers {
                page: 0,
                filter: RoleFilter::All,
            })
        );
    }

    #[test]
    fn test_decode_set_role() {
        assert_eq!(
            CallbackAction::decode("setrole:42:lecturer:1:all"),
            Some(CallbackAction::SetRole {
                user_id: 42,
                role: Some(Role::Lecturer),
                page: 1,
                filter: RoleFilter::All,
            })
        );
        assert_eq!(
            CallbackAction::decode("setrole:42:clear:0:student"),
            Some(CallbackAction::SetRole {
                user_id: 42,
                role: None,
                page: 0,
                filter: RoleFilter::Only(Role::Student),
            })
        );
    }

    #[test]
    fn test_invalid_role_is_rejected_at_decode() {
        assert_eq!(CallbackAction::decode("setrole:42:NotARole:0:all"), None);
        assert_eq!(CallbackAction::decode("bcast_role:NotARole"), None);
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert_eq!(CallbackAction::decode(""), None);
        assert_eq!(CallbackAction::decode("users:-1:all"), None);
        assert_eq!(CallbackAction::decode("users:abc:all"), None);
        assert_eq!(CallbackAction::decode("users:0:all:extra"), None);
        assert_eq!(CallbackAction::decode("setrole:42:student:0"), None);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let actions = [
            CallbackAction::AdminPanel,
            CallbackAction::ManageUsers {
                page: 3,
                filter: RoleFilter::Only(Role::Parent),
            },
            CallbackAction::SetRole {
                user_id: 77,
                role: None,
                page: 1,
                filter: RoleFilter::All,
            },
            CallbackAction::BroadcastRole(RoleFilter::Only(Role::Applicant)),
        ];
        for action in actions {
            assert_eq!(CallbackAction::decode(&action.encode()), Some(action));
        }
    }
}
