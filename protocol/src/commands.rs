//! Command identifiers the host editor binds for this subsystem. Status bar
//! items and lens annotations reference these ids; the host resolves them to
//! concrete UI commands at registration time.

pub const START_COMMAND: &str = "sketchbook.start";
pub const STOP_COMMAND: &str = "sketchbook.stop";
pub const OPEN_BROWSER_COMMAND: &str = "sketchbook.openBrowser";
pub const SHOW_SCRIPT_OUTPUT_COMMAND: &str = "sketchbook.showScriptOutput";
