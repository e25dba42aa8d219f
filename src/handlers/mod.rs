pub mod actions;
pub mod admin;
pub mod admin_panel;
pub mod broadcast;
pub mod callback;
pub mod command;
pub mod state;
pub mod text;
pub mod ui;
pub mod users;

pub use callback::callback_handler;
pub use command::command_handler;
pub use state::{AdminDialogue, AdminState};
pub use text::text_handler;
