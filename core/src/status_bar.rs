//! Persistent status bar presentation of the server lifecycle.

use std::sync::Arc;

use sketchbook_protocol::OPEN_BROWSER_COMMAND;
use sketchbook_protocol::START_COMMAND;
use sketchbook_protocol::STOP_COMMAND;
use sketchbook_protocol::ServerState;

use crate::host::SettingsSource;
use crate::host::StatusItem;

/// Drives the two status bar slots: one for the server lifecycle, one for
/// opening the sketch in a browser while the server runs.
pub struct StatusBarManager {
    server_item: Box<dyn StatusItem>,
    browser_item: Box<dyn StatusItem>,
    settings: Arc<dyn SettingsSource>,
}

impl StatusBarManager {
    pub fn new(
        server_item: Box<dyn StatusItem>,
        browser_item: Box<dyn StatusItem>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        browser_item.set_text("$(ports-open-browser-icon)Sketch Browser");
        browser_item.set_command(OPEN_BROWSER_COMMAND);
        Self {
            server_item,
            browser_item,
            settings,
        }
    }

    /// Refresh both items for `state`. `url` is the server's base URL and is
    /// only consulted while the server is running.
    pub fn update(&self, state: ServerState, url: Option<&str>) {
        let settings = self.settings.current();
        match state {
            ServerState::Running => {
                self.server_item.set_text("$(extensions-star-full)Sketch Server");
                self.server_item.set_tooltip("Stop the sketch server");
                self.server_item.set_command(STOP_COMMAND);
                if let Some(url) = url {
                    self.browser_item.set_tooltip(&format!(
                        "Open {url} in the {} browser",
                        settings.browser
                    ));
                }
            }
            ServerState::Stopped => {
                self.server_item.set_text("$(extensions-star-empty)Sketch Server");
                self.server_item.set_tooltip("Click to start the sketch server");
                self.server_item.set_command(START_COMMAND);
            }
            ServerState::Starting => {
                self.server_item.set_text("$(extensions-star-full~spin)Sketch Server");
                self.server_item.set_tooltip("The sketch server is starting…");
            }
            ServerState::Stopping => {
                self.server_item.set_text("$(extensions-star-empty~spin)Sketch Server");
                self.server_item.set_tooltip("The sketch server is stopping");
            }
        }

        if settings.status_bar.browser_item && state == ServerState::Running {
            self.browser_item.show();
        } else {
            self.browser_item.hide();
        }
        if settings.status_bar.server_item {
            self.server_item.show();
        } else {
            self.server_item.hide();
        }
    }
}
