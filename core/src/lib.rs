mod config;
pub mod console;
mod error;
mod host;
mod open_browser;
mod rate_tracker;
mod server;
mod server_manager;
mod status_bar;

pub use config::AutoShowLevel;
pub use config::BrowserChoice;
pub use config::ConsoleSettings;
pub use config::EditorSettings;
pub use config::Settings;
pub use config::StatusBarSettings;
pub use console::ConsoleRelayHandle;
pub use console::LensAnnotation;
pub use error::OpenBrowserError;
pub use host::BrowserLaunch;
pub use host::BrowserLauncher;
pub use host::HostUi;
pub use host::OutputChannel;
pub use host::SettingsSource;
pub use host::StatusItem;
pub use host::StatusMessage;
pub use host::WorkspaceHost;
pub use open_browser::BrowserApp;
pub use open_browser::BrowserRequest;
pub use server::ServerFactory;
pub use server::SketchServer;
pub use server_manager::HostServices;
pub use server_manager::ServerManagerHandle;
