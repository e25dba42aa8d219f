use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::roles::RoleFilter;

/// Per-admin conversation state, keyed by chat id through the dialogue
/// storage. Held in memory only: a restart drops in-flight admin
/// conversations, which is acceptable for these short single-operator flows.
#[derive(Clone, Default, Debug)]
pub enum AdminState {
    #[default]
    Idle,
    SearchingUser,
    EditingWelcome,
    BroadcastSelectingRole,
    BroadcastComposing {
        filter: RoleFilter,
    },
    BroadcastConfirming {
        filter: RoleFilter,
        message: String,
    },
}

pub type AdminDialogue = Dialogue<AdminState, InMemStorage<AdminState>>;
