use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Console method names the instrumentation script reports from a sketch
/// page. `clear` is a control message rather than output; the relay treats
/// it specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMethod {
    Clear,
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for ConsoleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `console.*` call observed in the running sketch.
///
/// `args` carries the arguments that survived JSON serialization;
/// `arg_strings` carries the page-side string rendering of each argument at
/// the matching index. The rendering is preferred for display when present,
/// since functions, DOM nodes and cyclic values only survive as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEvent {
    pub method: ConsoleMethod,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub arg_strings: Vec<Option<String>>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub col: Option<u32>,
    pub client_id: String,
}

/// An uncaught error or unhandled rejection reported by the sketch page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    pub client_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Opened,
    Closed,
}

/// The instrumentation websocket for one browser tab connected or dropped.
/// An `Opened` event with an unchanged file is how a page reload announces
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEvent {
    #[serde(rename = "type")]
    pub kind: ConnectionKind,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub client_id: String,
}

/// Page visibility changed. `visibility_state == false` means the tab was
/// hidden or navigated away, which invalidates its lens annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEvent {
    pub visibility_state: bool,
    pub client_id: String,
}

/// Events emitted by the sketch server on behalf of connected browser
/// sessions. This is a closed set; every consumer matches exhaustively so a
/// new event kind is a compile-checked change at each consumption site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BrowserEvent {
    Console(ConsoleEvent),
    Error(ErrorEvent),
    Connection(ConnectionEvent),
    Document(DocumentEvent),
}

impl BrowserEvent {
    /// Session the event is attributed to.
    pub fn client_id(&self) -> &str {
        match self {
            Self::Console(ev) => &ev.client_id,
            Self::Error(ev) => &ev.client_id,
            Self::Connection(ev) => &ev.client_id,
            Self::Document(ev) => &ev.client_id,
        }
    }

    /// Source file the event is attributed to, when the page reported one.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Console(ev) => ev.file.as_deref(),
            Self::Error(ev) => ev.file.as_deref(),
            Self::Connection(ev) => ev.file.as_deref(),
            Self::Document(_) => None,
        }
    }
}
