//! Shared vocabulary between the sketch-server collaborator, the host
//! editor, and the core subsystem: browser-originated events, server
//! lifecycle states, and the command identifiers the host binds.

mod commands;
mod event;
mod server_state;

pub use commands::OPEN_BROWSER_COMMAND;
pub use commands::SHOW_SCRIPT_OUTPUT_COMMAND;
pub use commands::START_COMMAND;
pub use commands::STOP_COMMAND;
pub use event::BrowserEvent;
pub use event::ConnectionEvent;
pub use event::ConnectionKind;
pub use event::ConsoleEvent;
pub use event::ConsoleMethod;
pub use event::DocumentEvent;
pub use event::ErrorEvent;
pub use server_state::ServerState;
