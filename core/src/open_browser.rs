//! Resolution and launching of the browser an open-browser call targets.
//!
//! The configured browser choice and an optional per-call override collapse
//! into a [`LaunchPlan`]; external launches watch the launcher process for a
//! bounded interval and fall back to the system default browser once when a
//! named browser fails.

use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::config::BrowserChoice;
use crate::error::OpenBrowserError;
use crate::host::BrowserLauncher;
use crate::host::HostUi;

/// Named external browsers the launcher can address directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserApp {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl BrowserApp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
        }
    }
}

/// Per-call override carried by an open-browser command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserRequest {
    /// Force the integrated viewer for this call.
    Integrated,
    /// Force an external browser. A configured `integrated` choice maps to
    /// the system default.
    External,
}

/// Where one open-browser call actually goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPlan {
    Integrated,
    /// `None` targets the platform's system default browser.
    External(Option<BrowserApp>),
}

pub fn resolve_browser(
    request: Option<BrowserRequest>,
    configured: BrowserChoice,
) -> LaunchPlan {
    match request {
        Some(BrowserRequest::Integrated) => LaunchPlan::Integrated,
        Some(BrowserRequest::External) => LaunchPlan::External(external_app(configured)),
        None => match configured {
            BrowserChoice::Integrated => LaunchPlan::Integrated,
            other => LaunchPlan::External(external_app(other)),
        },
    }
}

fn external_app(choice: BrowserChoice) -> Option<BrowserApp> {
    match choice {
        BrowserChoice::Integrated | BrowserChoice::System => None,
        BrowserChoice::Chrome => Some(BrowserApp::Chrome),
        BrowserChoice::Edge => Some(BrowserApp::Edge),
        BrowserChoice::Firefox => Some(BrowserApp::Firefox),
        BrowserChoice::Safari => Some(BrowserApp::Safari),
    }
}

/// Upper bound on waiting for the launcher process to report an exit status.
/// Past this the browser is assumed to have come up and we stop watching.
const LAUNCH_EXIT_WAIT: Duration = Duration::from_secs(5);

/// Open `url` in an external browser, retrying once against the system
/// default when a named browser fails. A transient status message covers the
/// retry. The error of a failed final attempt is returned for the caller to
/// surface; the server keeps running either way.
pub async fn launch_external(
    host: &dyn HostUi,
    launcher: &dyn BrowserLauncher,
    url: &str,
    app: Option<BrowserApp>,
) -> Result<(), OpenBrowserError> {
    let Err(error) = attempt(launcher, url, app).await else {
        return Ok(());
    };
    let Some(app) = app else {
        warn!("system browser launch failed: {error:#}");
        return Err(OpenBrowserError::SystemBrowser);
    };

    warn!(
        "{} browser launch failed ({error:#}), retrying with the system default",
        app.name()
    );
    let _retry_notice = host.status_message(&format!(
        "The {} browser failed to open. Retrying with the default system browser.",
        app.name()
    ));
    if let Err(retry_error) = attempt(launcher, url, None).await {
        warn!("system browser retry failed: {retry_error:#}");
        return Err(OpenBrowserError::browser(app.name()));
    }
    Ok(())
}

async fn attempt(
    launcher: &dyn BrowserLauncher,
    url: &str,
    app: Option<BrowserApp>,
) -> anyhow::Result<()> {
    let launch = launcher.open(url, app).await?;
    match timeout(LAUNCH_EXIT_WAIT, launch.exit_status()).await {
        // No exit status within the wait bound; assume the browser is up.
        Err(_) => Ok(()),
        Ok(Ok(None)) | Ok(Ok(Some(0))) => Ok(()),
        Ok(Ok(Some(code))) => anyhow::bail!("browser launcher exited with status {code}"),
        Ok(Err(error)) => Err(error),
    }
}
