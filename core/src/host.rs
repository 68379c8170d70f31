use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::Settings;
use crate::open_browser::BrowserApp;

/// Append-only text surface the console relay writes to (the host's output
/// pane). Implementations must tolerate calls after the server stopped.
pub trait OutputChannel: Send + Sync {
    fn clear(&self);
    fn append_line(&self, text: &str);
    fn append(&self, text: &str);
    /// Reveal the surface. `preserve_focus` keeps the active editor focused.
    fn show(&self, preserve_focus: bool);
}

/// One status bar slot; the status bar manager drives two of these.
pub trait StatusItem: Send + Sync {
    fn set_text(&self, text: &str);
    fn set_tooltip(&self, tooltip: &str);
    fn set_command(&self, command: &str);
    fn show(&self);
    fn hide(&self);
}

/// A transient status message shown by the host, dismissed when dropped.
pub trait StatusMessage: Send {}

/// Interactive affordances and message surfaces of the host editor.
#[async_trait]
pub trait HostUi: Send + Sync {
    /// Single-choice picker. `None` means the user dismissed it, which
    /// short-circuits the calling operation.
    async fn pick(&self, placeholder: &str, items: &[String]) -> Option<String>;
    /// Surface a persistent, user-visible error message.
    fn show_error(&self, message: &str);
    /// Surface a transient status message; dropping the guard dismisses it.
    fn status_message(&self, text: &str) -> Box<dyn StatusMessage>;
    /// Open `url` in the editor's embedded viewer pane, beside the editor.
    fn open_integrated(&self, url: &str);
}

/// Workspace roots available for serving: absolute directories on the local
/// filesystem. Empty means no workspace is open.
pub trait WorkspaceHost: Send + Sync {
    fn workspace_roots(&self) -> Vec<PathBuf>;
}

/// Handle on a spawned browser-launch process.
#[async_trait]
pub trait BrowserLaunch: Send {
    /// Wait for the launch process to exit. `None` means no exit status is
    /// observable, which callers treat as a successful launch.
    async fn exit_status(self: Box<Self>) -> anyhow::Result<Option<i32>>;
}

/// Launches a URL in a browser. `None` for `app` targets the platform's
/// system default.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, url: &str, app: Option<BrowserApp>)
    -> anyhow::Result<Box<dyn BrowserLaunch>>;
}

/// Source of configuration snapshots, consulted at point of use so host-side
/// settings edits apply without restarting anything.
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> Settings;
}

/// A fixed settings value is its own source. Convenient for tests and for
/// hosts without live configuration.
impl SettingsSource for Settings {
    fn current(&self) -> Settings {
        self.clone()
    }
}
