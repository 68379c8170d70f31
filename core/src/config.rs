use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sketchbook_protocol::ConsoleMethod;

/// Which browser the open-browser command targets when no per-call override
/// is given. `default` is accepted as a legacy spelling of `system`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserChoice {
    #[default]
    Integrated,
    #[serde(alias = "default")]
    System,
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl BrowserChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integrated => "integrated",
            Self::System => "system",
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
        }
    }
}

impl fmt::Display for BrowserChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity threshold for auto-revealing the console output surface,
/// ordered `error < warn < log < info < debug < always` (lower reveals more
/// eagerly). `always` reveals every message, `never` reveals none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoShowLevel {
    Always,
    Error,
    Warn,
    Log,
    Info,
    Debug,
    Never,
}

impl AutoShowLevel {
    fn rank(self) -> Option<u8> {
        match self {
            Self::Error => Some(0),
            Self::Warn => Some(1),
            Self::Log => Some(2),
            Self::Info => Some(3),
            Self::Debug => Some(4),
            Self::Always => Some(5),
            Self::Never => None,
        }
    }

    /// Whether a message produced by `method` crosses this threshold.
    pub fn reveals(self, method: ConsoleMethod) -> bool {
        let Some(threshold) = self.rank() else {
            return false;
        };
        match method_rank(method) {
            Some(rank) => rank <= threshold,
            None => false,
        }
    }
}

fn method_rank(method: ConsoleMethod) -> Option<u8> {
    match method {
        ConsoleMethod::Error => Some(0),
        ConsoleMethod::Warn => Some(1),
        ConsoleMethod::Log => Some(2),
        ConsoleMethod::Info => Some(3),
        ConsoleMethod::Debug => Some(4),
        // control message, not output; never triggers a reveal
        ConsoleMethod::Clear => None,
    }
}

/// Snapshot of the host-side configuration for this subsystem.
///
/// Components fetch a fresh snapshot at point of use (via
/// [`crate::host::SettingsSource`]), so edits made in the host's settings UI
/// take effect without restarting the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub browser: BrowserChoice,
    pub console: ConsoleSettings,
    pub status_bar: StatusBarSettings,
    pub editor: EditorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsoleSettings {
    /// Reveal threshold while the integrated viewer is the target browser.
    pub integrated_browser_auto_show: AutoShowLevel,
    /// Reveal threshold while an external browser is the target.
    pub external_browser_auto_show: AutoShowLevel,
    /// Clear the output log when a sketch page reloads.
    pub clear_on_reload: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            integrated_browser_auto_show: AutoShowLevel::Info,
            external_browser_auto_show: AutoShowLevel::Error,
            clear_on_reload: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusBarSettings {
    pub server_item: bool,
    pub browser_item: bool,
}

impl Default for StatusBarSettings {
    fn default() -> Self {
        Self {
            server_item: true,
            browser_item: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSettings {
    /// Show aggregated console messages as inline lens annotations.
    pub info_lens: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self { info_lens: true }
    }
}
