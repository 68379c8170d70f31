use thiserror::Error;

/// Terminal failures of an open-in-browser attempt. The display strings are
/// user facing; the lifecycle manager surfaces them verbatim.
#[derive(Debug, Error)]
pub enum OpenBrowserError {
    #[error("The {name} browser failed to open. It may not be available on your system.")]
    Browser { name: String },
    #[error("The default system browser failed to open.")]
    SystemBrowser,
}

impl OpenBrowserError {
    pub(crate) fn browser(name: &str) -> Self {
        Self::Browser {
            name: name.to_owned(),
        }
    }
}
