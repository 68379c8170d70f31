//! Relay from a server's browser event stream to the host output surface.
//!
//! One pump task per server lifetime drains the event stream, writes rendered
//! lines to the output channel with banner and reload demarcation, forwards
//! qualifying events to the [`MessageLens`], and throttles output into batched
//! writes while the message rate is high.

use std::sync::Arc;

use sketchbook_protocol::BrowserEvent;
use sketchbook_protocol::ConnectionEvent;
use sketchbook_protocol::ConnectionKind;
use sketchbook_protocol::ConsoleEvent;
use sketchbook_protocol::ConsoleMethod;
use sketchbook_protocol::DocumentEvent;
use sketchbook_protocol::ErrorEvent;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio::time::Instant;
use tokio::time::interval_at;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::AutoShowLevel;
use crate::config::BrowserChoice;
use crate::console::format::format_console_args;
use crate::console::format::pad_center;
use crate::console::lens::DEBOUNCE_INTERVAL;
use crate::console::lens::LensAnnotation;
use crate::console::lens::MessageLens;
use crate::host::OutputChannel;
use crate::host::SettingsSource;
use crate::rate_tracker::RateTracker;

const RATE_WINDOW: Duration = Duration::from_millis(1000);
const HIGH_RATE_THRESHOLD: usize = 20;
const LOW_RATE_THRESHOLD: usize = 5;
/// Cadence of batched writes while the relay is batching.
const BATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Width of banner and reload divider lines.
const RULE_WIDTH: usize = 80;
const RELOAD_LABEL: &str = "[RELOAD]";

/// Attach a relay to a server's event stream and start its pump. One relay
/// per server lifetime; the receiver stays with the pump until it exits.
pub fn subscribe(
    events: UnboundedReceiver<BrowserEvent>,
    output: Arc<dyn OutputChannel>,
    settings: Arc<dyn SettingsSource>,
) -> ConsoleRelayHandle {
    subscribe_with_tuning(
        events,
        output,
        settings,
        RATE_WINDOW,
        HIGH_RATE_THRESHOLD,
        LOW_RATE_THRESHOLD,
    )
}

pub(crate) fn subscribe_with_tuning(
    events: UnboundedReceiver<BrowserEvent>,
    output: Arc<dyn OutputChannel>,
    settings: Arc<dyn SettingsSource>,
    window: Duration,
    high_threshold: usize,
    low_threshold: usize,
) -> ConsoleRelayHandle {
    let lens = MessageLens::new();
    let annotations_changed = lens.subscribe();
    let lens = Arc::new(Mutex::new(lens));
    let core = RelayCore {
        output,
        settings: Arc::clone(&settings),
        lens: Arc::clone(&lens),
        current_file: None,
        banner: None,
        messages_since_clear: 0,
        rate: RateTracker::new(window, high_threshold, low_threshold),
        batching: false,
        buffer: Vec::new(),
    };
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(core, events, cancel.clone()));
    ConsoleRelayHandle {
        lens,
        annotations_changed,
        settings,
        cancel,
        task,
    }
}

/// Owner's handle on a running relay: query annotations, watch for changes,
/// shut the pump down.
pub struct ConsoleRelayHandle {
    lens: Arc<Mutex<MessageLens>>,
    annotations_changed: watch::Receiver<u64>,
    settings: Arc<dyn SettingsSource>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsoleRelayHandle {
    /// Change stream for annotations; the value is a monotonic version.
    pub fn annotations_changed(&self) -> watch::Receiver<u64> {
        self.annotations_changed.clone()
    }

    /// Annotations for `file`, empty while the info lens setting is off.
    pub async fn annotations_for_file(&self, file: &str) -> Vec<LensAnnotation> {
        if !self.settings.current().editor.info_lens {
            return Vec::new();
        }
        self.lens.lock().await.annotations_for_file(file)
    }

    /// Stop the pump. Buffered output and any coalesced annotation
    /// notification are flushed on the way out.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(error) = self.task.await {
            debug!("console relay pump ended abnormally: {error}");
        }
    }
}

struct RelayCore {
    output: Arc<dyn OutputChannel>,
    settings: Arc<dyn SettingsSource>,
    lens: Arc<Mutex<MessageLens>>,
    /// File of the most recent banner, shown or pending.
    current_file: Option<String>,
    /// Banner armed by a file or session change, written ahead of the next
    /// output line.
    banner: Option<String>,
    messages_since_clear: usize,
    rate: RateTracker,
    batching: bool,
    buffer: Vec<String>,
}

async fn run(
    mut core: RelayCore,
    mut events: UnboundedReceiver<BrowserEvent>,
    cancel: CancellationToken,
) {
    let mut flush_ticker = interval_at(Instant::now() + BATCH_INTERVAL, BATCH_INTERVAL);
    let mut lens_deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    // The server dropped its sender; the relay is done.
                    break;
                };
                let was_batching = core.batching;
                core.handle_event(event, Instant::now()).await;
                if core.batching && !was_batching {
                    flush_ticker = interval_at(Instant::now() + BATCH_INTERVAL, BATCH_INTERVAL);
                }
                lens_deadline = next_lens_deadline(&core, lens_deadline).await;
            }
            _ = flush_ticker.tick(), if core.batching => {
                core.flush_buffer();
            }
            _ = sleep_until(lens_deadline.unwrap_or_else(Instant::now)), if lens_deadline.is_some() => {
                core.lens.lock().await.flush_pending();
                lens_deadline = None;
            }
        }
    }
    core.flush_buffer();
    core.lens.lock().await.flush_pending();
    debug!("console relay pump exited");
}

/// One-shot deadline for delivering a coalesced annotation notification.
/// Kept while the lens stays coalescing, cleared as soon as it is not.
async fn next_lens_deadline(core: &RelayCore, current: Option<Instant>) -> Option<Instant> {
    if !core.lens.lock().await.is_coalescing() {
        return None;
    }
    match current {
        Some(deadline) => Some(deadline),
        None => Some(Instant::now() + DEBOUNCE_INTERVAL),
    }
}

impl RelayCore {
    async fn handle_event(&mut self, event: BrowserEvent, now: Instant) {
        match event {
            BrowserEvent::Console(console) => self.on_console(console, now).await,
            BrowserEvent::Error(error) => self.on_error(error, now).await,
            BrowserEvent::Connection(connection) => self.on_connection(connection, now).await,
            BrowserEvent::Document(document) => self.on_document(document, now).await,
        }
    }

    async fn on_console(&mut self, event: ConsoleEvent, now: Instant) {
        if event.method == ConsoleMethod::Clear {
            self.clear();
            self.lens
                .lock()
                .await
                .remove_messages(None, Some(&event.client_id), now);
            return;
        }
        self.set_file(event.file.as_deref());
        self.maybe_show(event.method);
        let line = format!(
            "[{}] {}",
            event.method.as_str().to_uppercase(),
            format_console_args(&event.args, &event.arg_strings)
        );
        self.append_line(line, now);
        if event.file.is_some() && event.line.is_some() && !event.args.is_empty() {
            self.lens
                .lock()
                .await
                .add_message(&BrowserEvent::Console(event), now);
        }
    }

    async fn on_error(&mut self, event: ErrorEvent, now: Instant) {
        self.set_file(event.file.as_deref());
        self.maybe_show(ConsoleMethod::Error);
        let mut composed = String::from("Error");
        if let Some(line) = event.line {
            composed.push_str(&format!(" at line {line}"));
        }
        if let Some(location) = event.file.as_deref().or(event.url.as_deref()) {
            composed.push_str(&format!(" of {location}"));
        }
        composed.push_str(&format!(": {}", event.message));
        let line = match event.stack.as_deref() {
            Some(stack) if !stack.is_empty() => stack.to_owned(),
            _ => composed,
        };
        self.append_line(line, now);
        if event.file.is_some() && event.line.is_some() {
            self.lens
                .lock()
                .await
                .add_message(&BrowserEvent::Error(event), now);
        }
    }

    async fn on_connection(&mut self, event: ConnectionEvent, now: Instant) {
        if event.kind != ConnectionKind::Opened {
            return;
        }
        if let Some(file) = event.file.as_deref() {
            self.lens.lock().await.remove_messages(Some(file), None, now);
        }
        let banner_armed = self.set_file(event.file.as_deref());
        if !banner_armed && self.messages_since_clear > 0 {
            // Same sketch reconnecting: mark the reload instead of repeating
            // the banner. Written directly, not through the throttled path.
            self.output
                .append_line(&pad_center(RELOAD_LABEL, RULE_WIDTH, '-'));
        }
        self.messages_since_clear = 0;
        if self.settings.current().console.clear_on_reload {
            self.clear();
        }
        // A reload is always surfaced, whatever the severity threshold.
        self.output.show(true);
    }

    async fn on_document(&mut self, event: DocumentEvent, now: Instant) {
        if !event.visibility_state {
            self.lens
                .lock()
                .await
                .remove_messages(None, Some(&event.client_id), now);
        }
    }

    /// Arm a banner when `file` differs from the current file, or when
    /// nothing has been written since the last clear. Returns whether a
    /// banner was armed.
    fn set_file(&mut self, file: Option<&str>) -> bool {
        if self.current_file.as_deref() == file && self.messages_since_clear > 0 {
            return false;
        }
        self.current_file = file.map(str::to_owned);
        let label = match file {
            Some(file) => format!(" ({file}) "),
            None => String::new(),
        };
        self.banner = Some(pad_center(&label, RULE_WIDTH, '='));
        self.messages_since_clear = 0;
        true
    }

    fn maybe_show(&self, method: ConsoleMethod) {
        if self.auto_show_threshold().reveals(method) {
            self.output.show(true);
        }
    }

    fn auto_show_threshold(&self) -> AutoShowLevel {
        let settings = self.settings.current();
        if settings.browser == BrowserChoice::Integrated {
            settings.console.integrated_browser_auto_show
        } else {
            settings.console.external_browser_auto_show
        }
    }

    fn append_line(&mut self, line: String, now: Instant) {
        self.update_rate(now);
        if self.batching {
            self.buffer.push(line);
        } else {
            if let Some(banner) = self.banner.take() {
                self.output.append_line(&banner);
            }
            self.output.append_line(&line);
        }
        self.messages_since_clear += 1;
    }

    fn update_rate(&mut self, now: Instant) {
        let was_high = self.rate.is_high_rate();
        self.rate.record(now);
        let high = self.rate.is_high_rate();
        if !was_high && high {
            self.batching = true;
        } else if was_high && !high {
            self.batching = false;
            self.flush_buffer();
        }
    }

    /// Write everything buffered as one batched append, banner first, and
    /// reveal the surface once per flush.
    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        if let Some(banner) = self.banner.take() {
            self.output.append_line(&banner);
        }
        let mut batch = self.buffer.join("\n");
        batch.push('\n');
        self.output.append(&batch);
        self.output.show(true);
        self.buffer.clear();
    }

    fn clear(&mut self) {
        self.output.clear();
        self.banner = None;
        self.messages_since_clear = 0;
        self.rate.reset();
        self.buffer.clear();
        self.batching = false;
    }
}
