//! Aggregation of console and error messages into per-line annotations.
//!
//! Each `(file, clientId, line)` location keeps a bounded history of its most
//! recent messages plus a lifetime count, and renders to a single annotation.
//! Change notification is adaptively debounced so a chatty sketch cannot
//! force an annotation refresh on every message.

use std::collections::HashMap;
use std::collections::VecDeque;

use sketchbook_protocol::BrowserEvent;
use sketchbook_protocol::ConsoleMethod;
use sketchbook_protocol::SHOW_SCRIPT_OUTPUT_COMMAND;
use tokio::sync::watch;
use tokio::time::Duration;
use tokio::time::Instant;

use crate::console::format::format_console_args;
use crate::rate_tracker::RateTracker;

const RATE_WINDOW: Duration = Duration::from_millis(1000);
const HIGH_RATE_THRESHOLD: usize = 15;
const LOW_RATE_THRESHOLD: usize = 3;

/// Delay between a coalesced change and its notification. The pump arms a
/// one-shot timer with this while [`MessageLens::is_coalescing`] holds.
pub(crate) const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(200);

/// Most recent messages retained per location.
const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LensKey {
    file: String,
    client_id: String,
    line: u32,
}

/// One retained message, distilled to what the renderings need.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LensEntry {
    Console {
        method: ConsoleMethod,
        rendering: String,
    },
    Error {
        message: String,
        stack: Option<String>,
    },
}

impl LensEntry {
    fn line_rendering(&self) -> &str {
        match self {
            Self::Console { rendering, .. } => rendering,
            Self::Error { message, .. } => message,
        }
    }
}

#[derive(Debug)]
struct LensRecord {
    col: u32,
    /// Newest first.
    history: VecDeque<LensEntry>,
    lifetime_count: usize,
}

impl LensRecord {
    fn new(col: u32) -> Self {
        Self {
            col,
            history: VecDeque::new(),
            lifetime_count: 0,
        }
    }

    fn push(&mut self, entry: LensEntry) {
        self.history.push_front(entry);
        if self.history.len() > MAX_HISTORY {
            self.history.pop_back();
        }
        self.lifetime_count += 1;
    }

    fn title(&self) -> String {
        let Some(newest) = self.history.front() else {
            return String::new();
        };
        let mut title = match newest {
            LensEntry::Console { method, rendering } => format!("console.{method}: {rendering}"),
            LensEntry::Error { message, .. } => message.clone(),
        };
        if self.lifetime_count > 1 {
            title.push_str(&format!(" (+{} more)", self.lifetime_count - 1));
        }
        title
    }

    fn tooltip(&self) -> String {
        if let Some(LensEntry::Error { message, stack }) = self.history.front() {
            return match stack {
                Some(stack) if !stack.is_empty() => stack.clone(),
                _ => message.clone(),
            };
        }
        let mut tooltip = self
            .history
            .iter()
            .map(|entry| entry.line_rendering().to_owned())
            .collect::<Vec<_>>()
            .join("\n");
        if self.lifetime_count > self.history.len() {
            let hidden = self.lifetime_count - self.history.len();
            tooltip.push_str(&format!("\n+{hidden} more"));
        }
        tooltip
    }
}

/// One inline annotation: a position, its derived texts, and the command the
/// host invokes when the annotation is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LensAnnotation {
    pub line: u32,
    pub col: u32,
    pub title: String,
    pub tooltip: String,
    pub command: &'static str,
}

/// The aggregator. Mutated only by the relay pump; queried by the host
/// through [`crate::console::ConsoleRelayHandle`].
#[derive(Debug)]
pub struct MessageLens {
    records: HashMap<LensKey, LensRecord>,
    rate: RateTracker,
    pending_update: bool,
    timer_armed: bool,
    changes: watch::Sender<u64>,
}

impl MessageLens {
    pub fn new() -> Self {
        Self::with_tuning(RATE_WINDOW, HIGH_RATE_THRESHOLD, LOW_RATE_THRESHOLD)
    }

    /// Tuning hook so tests can trip the thresholds with few events.
    pub(crate) fn with_tuning(
        window: Duration,
        high_threshold: usize,
        low_threshold: usize,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            records: HashMap::new(),
            rate: RateTracker::new(window, high_threshold, low_threshold),
            pending_update: false,
            timer_armed: false,
            changes,
        }
    }

    /// Stream of change notifications; the value is a monotonic version.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Record `event` against its `(file, clientId, line)` location. Events
    /// without a file and line, and lifecycle events, are ignored.
    pub fn add_message(&mut self, event: &BrowserEvent, now: Instant) {
        let (file, client_id, line, col, entry) = match event {
            BrowserEvent::Console(console) => {
                let (Some(file), Some(line)) = (console.file.as_deref(), console.line) else {
                    return;
                };
                (
                    file,
                    console.client_id.as_str(),
                    line,
                    console.col.unwrap_or(0),
                    LensEntry::Console {
                        method: console.method,
                        rendering: format_console_args(&console.args, &console.arg_strings),
                    },
                )
            }
            BrowserEvent::Error(error) => {
                let (Some(file), Some(line)) = (error.file.as_deref(), error.line) else {
                    return;
                };
                (
                    file,
                    error.client_id.as_str(),
                    line,
                    0,
                    LensEntry::Error {
                        message: error.message.clone(),
                        stack: error.stack.clone(),
                    },
                )
            }
            BrowserEvent::Connection(_) | BrowserEvent::Document(_) => return,
        };

        let key = LensKey {
            file: file.to_owned(),
            client_id: client_id.to_owned(),
            line,
        };
        self.records
            .entry(key)
            .or_insert_with(|| LensRecord::new(col))
            .push(entry);
        self.fire_change(now);
    }

    /// Remove every record whose file matches `file` or whose client matches
    /// `client_id`. Notifies listeners when anything was removed.
    pub fn remove_messages(&mut self, file: Option<&str>, client_id: Option<&str>, now: Instant) {
        let before = self.records.len();
        self.records.retain(|key, _| {
            let file_matches = file.is_some_and(|file| key.file == file);
            let client_matches = client_id.is_some_and(|client_id| key.client_id == client_id);
            !(file_matches || client_matches)
        });
        if self.records.len() != before {
            self.fire_change(now);
        }
    }

    /// Annotations for every record in `file`, ordered by position.
    pub fn annotations_for_file(&self, file: &str) -> Vec<LensAnnotation> {
        let mut annotations: Vec<LensAnnotation> = self
            .records
            .iter()
            .filter(|(key, _)| key.file == file)
            .map(|(key, record)| LensAnnotation {
                line: key.line,
                col: record.col,
                title: record.title(),
                tooltip: record.tooltip(),
                command: SHOW_SCRIPT_OUTPUT_COMMAND,
            })
            .collect();
        annotations.sort_by(|a, b| (a.line, a.col).cmp(&(b.line, b.col)));
        annotations
    }

    /// Whether a coalesced notification is waiting on the debounce timer.
    pub fn is_coalescing(&self) -> bool {
        self.timer_armed
    }

    /// Deliver a coalesced notification, if one is pending. Called by the
    /// pump when the debounce timer fires and once at shutdown.
    pub fn flush_pending(&mut self) {
        self.timer_armed = false;
        if self.pending_update {
            self.pending_update = false;
            self.notify();
        }
    }

    fn fire_change(&mut self, now: Instant) {
        let was_high = self.rate.is_high_rate();
        self.rate.record(now);
        if was_high && !self.rate.is_high_rate() {
            // Dropped below the low threshold: release anything held back.
            self.timer_armed = false;
            if self.pending_update {
                self.pending_update = false;
                self.notify();
            }
        }
        if self.rate.is_high_rate() {
            self.pending_update = true;
            self.timer_armed = true;
        } else {
            self.notify();
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}
