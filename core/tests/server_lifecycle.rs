use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use sketchbook_core::BrowserApp;
use sketchbook_core::BrowserChoice;
use sketchbook_core::BrowserLaunch;
use sketchbook_core::BrowserLauncher;
use sketchbook_core::HostServices;
use sketchbook_core::HostUi;
use sketchbook_core::OutputChannel;
use sketchbook_core::ServerFactory;
use sketchbook_core::ServerManagerHandle;
use sketchbook_core::Settings;
use sketchbook_core::SketchServer;
use sketchbook_core::StatusItem;
use sketchbook_core::StatusMessage;
use sketchbook_core::WorkspaceHost;
use sketchbook_protocol::BrowserEvent;
use sketchbook_protocol::ConsoleEvent;
use sketchbook_protocol::ConsoleMethod;
use sketchbook_protocol::ServerState;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::time::Duration;
use tokio::time::advance;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

const SERVER_URL: &str = "http://127.0.0.1:3000";

struct FakeServer {
    root: PathBuf,
    started: bool,
    fail_start: bool,
    fail_close: bool,
    events: Option<UnboundedReceiver<BrowserEvent>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl SketchServer for FakeServer {
    async fn start(&mut self) -> anyhow::Result<()> {
        if self.fail_start {
            anyhow::bail!("address already in use");
        }
        self.started = true;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.started = false;
        if self.fail_close {
            anyhow::bail!("listener refused to close");
        }
        Ok(())
    }

    fn url(&self) -> Option<String> {
        self.started.then(|| SERVER_URL.to_owned())
    }

    fn file_path_to_url(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        Some(format!("{SERVER_URL}/{}", rel.display()))
    }

    fn take_event_stream(&mut self) -> Option<UnboundedReceiver<BrowserEvent>> {
        self.events.take()
    }
}

/// Builds [`FakeServer`]s and keeps their event senders so tests can emit
/// browser events into whatever the manager wired up.
#[derive(Default)]
struct FakeFactory {
    /// When set, `create` blocks until the gate is notified. Lets a test
    /// observe the manager mid-start.
    gate: Option<Arc<Notify>>,
    /// The next N creations fail outright.
    failing_creates: AtomicUsize,
    /// The next N created servers fail their `start`.
    failing_starts: AtomicUsize,
    fail_close: AtomicBool,
    creates: Mutex<Vec<PathBuf>>,
    event_senders: Mutex<Vec<UnboundedSender<BrowserEvent>>>,
    closes: Arc<AtomicUsize>,
}

impl FakeFactory {
    fn created_roots(&self) -> Vec<PathBuf> {
        self.creates.lock().expect("creates lock").clone()
    }

    fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn event_sender(&self, index: usize) -> UnboundedSender<BrowserEvent> {
        self.event_senders.lock().expect("senders lock")[index].clone()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ServerFactory for FakeFactory {
    async fn create(&self, root: &Path) -> anyhow::Result<Box<dyn SketchServer>> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.creates
            .lock()
            .expect("creates lock")
            .push(root.to_path_buf());
        if take_one(&self.failing_creates) {
            anyhow::bail!("served root is missing");
        }
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.event_senders.lock().expect("senders lock").push(tx);
        Ok(Box::new(FakeServer {
            root: root.to_path_buf(),
            started: false,
            fail_start: take_one(&self.failing_starts),
            fail_close: self.fail_close.load(Ordering::SeqCst),
            events: Some(rx),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct StatusGuard {
    active: Arc<AtomicUsize>,
}

impl StatusMessage for StatusGuard {}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingHost {
    picks: Mutex<VecDeque<Option<String>>>,
    pick_calls: AtomicUsize,
    errors: Mutex<Vec<String>>,
    statuses: Mutex<Vec<String>>,
    active_statuses: Arc<AtomicUsize>,
    integrated_opens: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn script_pick(&self, choice: Option<String>) {
        self.picks.lock().expect("picks lock").push_back(choice);
    }

    fn pick_count(&self) -> usize {
        self.pick_calls.load(Ordering::SeqCst)
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("errors lock").clone()
    }

    fn statuses(&self) -> Vec<String> {
        self.statuses.lock().expect("statuses lock").clone()
    }

    fn active_status_count(&self) -> usize {
        self.active_statuses.load(Ordering::SeqCst)
    }

    fn integrated_opens(&self) -> Vec<String> {
        self.integrated_opens.lock().expect("opens lock").clone()
    }
}

#[async_trait]
impl HostUi for RecordingHost {
    async fn pick(&self, _placeholder: &str, _items: &[String]) -> Option<String> {
        self.pick_calls.fetch_add(1, Ordering::SeqCst);
        self.picks
            .lock()
            .expect("picks lock")
            .pop_front()
            .unwrap_or(None)
    }

    fn show_error(&self, message: &str) {
        self.errors
            .lock()
            .expect("errors lock")
            .push(message.to_owned());
    }

    fn status_message(&self, text: &str) -> Box<dyn StatusMessage> {
        self.statuses
            .lock()
            .expect("statuses lock")
            .push(text.to_owned());
        self.active_statuses.fetch_add(1, Ordering::SeqCst);
        Box::new(StatusGuard {
            active: Arc::clone(&self.active_statuses),
        })
    }

    fn open_integrated(&self, url: &str) {
        self.integrated_opens
            .lock()
            .expect("opens lock")
            .push(url.to_owned());
    }
}

struct FakeLaunch {
    exit: Option<i32>,
}

#[async_trait]
impl BrowserLaunch for FakeLaunch {
    async fn exit_status(self: Box<Self>) -> anyhow::Result<Option<i32>> {
        Ok(self.exit)
    }
}

#[derive(Default)]
struct FakeLauncher {
    exits: Mutex<VecDeque<Option<i32>>>,
    calls: Mutex<Vec<(String, Option<BrowserApp>)>>,
}

impl FakeLauncher {
    fn script_exits(&self, exits: impl IntoIterator<Item = Option<i32>>) {
        self.exits.lock().expect("exits lock").extend(exits);
    }

    fn calls(&self) -> Vec<(String, Option<BrowserApp>)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn open(
        &self,
        url: &str,
        app: Option<BrowserApp>,
    ) -> anyhow::Result<Box<dyn BrowserLaunch>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((url.to_owned(), app));
        // Unscripted launches succeed.
        let exit = self
            .exits
            .lock()
            .expect("exits lock")
            .pop_front()
            .unwrap_or(Some(0));
        Ok(Box::new(FakeLaunch { exit }))
    }
}

struct FakeWorkspace {
    roots: Vec<PathBuf>,
}

impl WorkspaceHost for FakeWorkspace {
    fn workspace_roots(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}

struct NullStatusItem;

impl StatusItem for NullStatusItem {
    fn set_text(&self, _text: &str) {}
    fn set_tooltip(&self, _tooltip: &str) {}
    fn set_command(&self, _command: &str) {}
    fn show(&self) {}
    fn hide(&self) {}
}

#[derive(Default)]
struct RecordingOutput {
    lines: Mutex<Vec<String>>,
}

impl RecordingOutput {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lines lock").clone()
    }
}

impl OutputChannel for RecordingOutput {
    fn clear(&self) {
        self.lines.lock().expect("lines lock").clear();
    }

    fn append_line(&self, text: &str) {
        self.lines
            .lock()
            .expect("lines lock")
            .push(text.to_owned());
    }

    fn append(&self, text: &str) {
        let mut lines = self.lines.lock().expect("lines lock");
        lines.extend(text.lines().map(str::to_owned));
    }

    fn show(&self, _preserve_focus: bool) {}
}

/// Captures formatted tracing output for assertions.
#[derive(Clone, Default)]
struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().expect("log buffer lock")).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .expect("log buffer lock")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> LogBuffer {
        self.clone()
    }
}

struct Harness {
    manager: ServerManagerHandle,
    factory: Arc<FakeFactory>,
    host: Arc<RecordingHost>,
    launcher: Arc<FakeLauncher>,
    output: Arc<RecordingOutput>,
    roots: Vec<PathBuf>,
    _workspace_dirs: Vec<TempDir>,
}

impl Harness {
    fn new(root_count: usize, settings: Settings) -> Self {
        Self::with_factory(FakeFactory::default(), root_count, settings)
    }

    fn with_factory(factory: FakeFactory, root_count: usize, settings: Settings) -> Self {
        let workspace_dirs: Vec<TempDir> = (0..root_count)
            .map(|_| tempfile::tempdir().expect("workspace dir"))
            .collect();
        let roots: Vec<PathBuf> = workspace_dirs
            .iter()
            .map(|dir| dir.path().to_path_buf())
            .collect();
        let factory = Arc::new(factory);
        let host = Arc::new(RecordingHost::default());
        let launcher = Arc::new(FakeLauncher::default());
        let output = Arc::new(RecordingOutput::default());
        let manager = ServerManagerHandle::spawn(HostServices {
            factory: Arc::clone(&factory) as Arc<dyn ServerFactory>,
            workspace: Arc::new(FakeWorkspace {
                roots: roots.clone(),
            }),
            ui: Arc::clone(&host) as Arc<dyn HostUi>,
            launcher: Arc::clone(&launcher) as Arc<dyn BrowserLauncher>,
            output: Arc::clone(&output) as Arc<dyn OutputChannel>,
            settings: Arc::new(settings),
            server_status_item: Box::new(NullStatusItem),
            browser_status_item: Box::new(NullStatusItem),
        });
        Self {
            manager,
            factory,
            host,
            launcher,
            output,
            roots,
            _workspace_dirs: workspace_dirs,
        }
    }

    async fn wait_for(&self, target: ServerState) {
        wait_for_state(&mut self.manager.state_stream(), target).await;
    }
}

async fn wait_for_state(stream: &mut watch::Receiver<ServerState>, target: ServerState) {
    timeout(Duration::from_secs(5), async {
        while *stream.borrow_and_update() != target {
            stream.changed().await.expect("manager state stream closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("server never reached the {target} state"));
}

/// Let spawned tasks finish everything already queued. Paused-clock runs
/// auto-advance through this sleep once every task is idle.
async fn drain() {
    sleep(Duration::from_millis(1)).await;
}

fn console_log(text: &str, file: &str) -> BrowserEvent {
    BrowserEvent::Console(ConsoleEvent {
        method: ConsoleMethod::Log,
        args: vec![json!(text)],
        arg_strings: vec![None],
        file: Some(file.to_owned()),
        url: None,
        line: Some(3),
        col: None,
        client_id: "tab-1".to_owned(),
    })
}

#[tokio::test(start_paused = true)]
async fn start_brings_the_server_to_running() {
    let harness = Harness::new(1, Settings::default());

    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    drain().await;

    assert_eq!(harness.factory.created_roots(), harness.roots);
    assert_eq!(
        harness.host.statuses(),
        vec![
            format!(
                "Starting the sketch server at {}",
                harness.roots[0].display()
            ),
            format!("The sketch server is running at {SERVER_URL}"),
        ]
    );
    assert_eq!(harness.host.errors(), Vec::<String>::new());
    // The default browser choice opens the integrated viewer on the base url.
    assert_eq!(harness.host.integrated_opens(), vec![SERVER_URL.to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_starts_create_one_server() {
    let harness = Harness::new(1, Settings::default());

    harness.manager.start(None, None);
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    drain().await;

    assert_eq!(harness.factory.created_roots().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_stops_close_the_server_once() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;

    harness.manager.stop();
    harness.manager.stop();
    harness.wait_for(ServerState::Stopped).await;
    drain().await;

    assert_eq!(harness.factory.close_count(), 1);
    // The full status log proves a single Running to Stopping to Stopped
    // pass: one shutdown notice, one completion notice.
    assert_eq!(
        harness.host.statuses(),
        vec![
            format!(
                "Starting the sketch server at {}",
                harness.roots[0].display()
            ),
            format!("The sketch server is running at {SERVER_URL}"),
            "Shutting down the sketch server…".to_owned(),
            "The sketch server is no longer running.".to_owned(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn stop_returns_to_stopped_and_closes_the_server() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;

    harness.manager.stop();
    harness.wait_for(ServerState::Stopped).await;
    drain().await;

    assert_eq!(harness.factory.close_count(), 1);
    let statuses = harness.host.statuses();
    assert!(statuses.contains(&"Shutting down the sketch server…".to_owned()));
    assert!(statuses.contains(&"The sketch server is no longer running.".to_owned()));
    assert_eq!(harness.host.errors(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn stop_while_stopped_is_a_no_op() {
    let harness = Harness::new(1, Settings::default());

    harness.manager.stop();
    drain().await;

    assert_eq!(harness.manager.state(), ServerState::Stopped);
    assert_eq!(harness.factory.close_count(), 0);
    assert_eq!(harness.host.statuses(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn stop_during_startup_is_dropped_not_deferred() {
    let gate = Arc::new(Notify::new());
    let factory = FakeFactory {
        gate: Some(Arc::clone(&gate)),
        ..FakeFactory::default()
    };
    let harness = Harness::with_factory(factory, 1, Settings::default());

    harness.manager.start(None, None);
    harness.wait_for(ServerState::Starting).await;
    harness.manager.stop();

    gate.notify_one();
    harness.wait_for(ServerState::Running).await;
    drain().await;

    assert_eq!(harness.manager.state(), ServerState::Running);
    assert_eq!(harness.factory.close_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_failure_reports_and_recovers() {
    let harness = Harness::new(1, Settings::default());
    harness.factory.failing_starts.store(1, Ordering::SeqCst);

    harness.manager.start(None, None);
    drain().await;

    assert_eq!(harness.manager.state(), ServerState::Stopped);
    let errors = harness.host.errors();
    assert_eq!(errors.len(), 1, "got {errors:?}");
    assert!(errors[0].starts_with("The sketch server failed to start:"));
    assert!(errors[0].contains("address already in use"));

    // The failure leaves nothing wedged; the next start succeeds.
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    assert_eq!(harness.factory.created_roots().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_failure_still_comes_to_rest_stopped() {
    let harness = Harness::new(1, Settings::default());
    harness.factory.fail_close.store(true, Ordering::SeqCst);
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;

    harness.manager.stop();
    harness.wait_for(ServerState::Stopped).await;
    drain().await;

    let errors = harness.host.errors();
    assert_eq!(errors.len(), 1, "got {errors:?}");
    assert!(errors[0].starts_with("The sketch server failed to stop:"));
    assert!(
        !harness
            .host
            .statuses()
            .contains(&"The sketch server is no longer running.".to_owned())
    );
}

#[tokio::test(start_paused = true)]
async fn multi_root_start_serves_the_picked_folder() {
    let harness = Harness::new(3, Settings::default());
    harness
        .host
        .script_pick(Some(harness.roots[1].display().to_string()));

    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;

    assert_eq!(harness.factory.created_roots(), vec![harness.roots[1].clone()]);
}

#[tokio::test(start_paused = true)]
async fn dismissing_the_picker_aborts_silently() {
    let harness = Harness::new(2, Settings::default());
    harness.host.script_pick(None);

    harness.manager.start(None, None);
    drain().await;

    assert_eq!(harness.manager.state(), ServerState::Stopped);
    assert!(harness.factory.created_roots().is_empty());
    assert_eq!(harness.host.errors(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn start_without_a_workspace_aborts_silently() {
    let harness = Harness::new(0, Settings::default());

    harness.manager.start(None, None);
    drain().await;

    assert_eq!(harness.manager.state(), ServerState::Stopped);
    assert!(harness.factory.created_roots().is_empty());
    assert_eq!(harness.host.errors(), Vec::<String>::new());
    assert_eq!(harness.host.pick_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_named_browser_falls_back_to_the_system_default() {
    let settings = Settings {
        browser: BrowserChoice::Chrome,
        ..Settings::default()
    };
    let harness = Harness::new(1, settings);
    harness.launcher.script_exits([Some(1), Some(0)]);

    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    drain().await;

    assert_eq!(
        harness.launcher.calls(),
        vec![
            (SERVER_URL.to_owned(), Some(BrowserApp::Chrome)),
            (SERVER_URL.to_owned(), None),
        ]
    );
    assert!(harness.host.statuses().contains(
        &"The chrome browser failed to open. Retrying with the default system browser."
            .to_owned()
    ));
    assert_eq!(harness.host.errors(), Vec::<String>::new());
    assert!(harness.host.integrated_opens().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_browser_fallback_surfaces_an_error() {
    let settings = Settings {
        browser: BrowserChoice::Firefox,
        ..Settings::default()
    };
    let harness = Harness::new(1, settings);
    harness.launcher.script_exits([Some(1), Some(1)]);

    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    drain().await;

    assert_eq!(
        harness.host.errors(),
        vec![
            "The firefox browser failed to open. It may not be available on your system."
                .to_owned()
        ]
    );
    assert_eq!(harness.manager.state(), ServerState::Running);
}

#[tokio::test(start_paused = true)]
async fn open_browser_maps_files_to_served_urls() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    drain().await;

    harness
        .manager
        .open_browser(Some(harness.roots[0].join("sketch.js")), None);
    drain().await;

    let opens = harness.host.integrated_opens();
    assert_eq!(opens.len(), 2, "the base url from startup, then the sketch");
    assert_eq!(opens[1], format!("{SERVER_URL}/sketch.js"));
}

#[tokio::test(start_paused = true)]
async fn open_browser_outside_the_served_root_reports() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    drain().await;

    let outside = PathBuf::from("/elsewhere/sketch.js");
    harness.manager.open_browser(Some(outside.clone()), None);
    drain().await;

    assert_eq!(
        harness.host.errors(),
        vec![format!(
            "{} is not in a directory that is served by the sketch server.",
            outside.display()
        )]
    );
    assert_eq!(
        harness.host.integrated_opens().len(),
        1,
        "only the open from startup"
    );
}

#[tokio::test(start_paused = true)]
async fn open_browser_command_starts_a_stopped_server() {
    let harness = Harness::new(1, Settings::default());

    harness.manager.start_or_open_browser(None, None);
    harness.wait_for(ServerState::Running).await;

    assert_eq!(harness.factory.created_roots().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn browser_console_reaches_output_and_annotations() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;

    let events = harness.factory.event_sender(0);
    events.send(console_log("hello sketch", "sketch.js")).expect("send event");
    drain().await;

    assert!(
        harness
            .output
            .lines()
            .contains(&"[LOG] hello sketch".to_owned()),
        "console output missing: {:?}",
        harness.output.lines()
    );
    let annotations = harness.manager.annotations_for_file("sketch.js").await;
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].title, "console.log: hello sketch");
    assert!(harness.manager.annotations_changed().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn stopping_tears_down_the_console_relay() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;

    let events = harness.factory.event_sender(0);
    events.send(console_log("hello", "sketch.js")).expect("send event");
    drain().await;
    assert_eq!(harness.manager.annotations_for_file("sketch.js").await.len(), 1);

    harness.manager.stop();
    harness.wait_for(ServerState::Stopped).await;
    drain().await;

    assert!(harness.manager.annotations_changed().await.is_none());
    assert!(
        harness
            .manager
            .annotations_for_file("sketch.js")
            .await
            .is_empty()
    );
}

#[tokio::test(start_paused = true)]
async fn lifecycle_status_messages_dismiss_after_a_linger() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    drain().await;

    assert_eq!(
        harness.host.active_status_count(),
        1,
        "the running notice lingers"
    );

    advance(Duration::from_secs(11)).await;
    drain().await;

    assert_eq!(harness.host.active_status_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn state_transitions_are_logged() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .finish();
    // Thread-local default: the current-thread runtime polls the manager
    // task on this thread, so its events land in the buffer.
    let _default = tracing::subscriber::set_default(subscriber);

    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;
    harness.manager.stop();
    harness.wait_for(ServerState::Stopped).await;
    drain().await;

    let contents = logs.contents();
    for state in ["starting", "running", "stopping", "stopped"] {
        assert!(
            contents.contains(&format!("server state changed state={state}")),
            "missing the {state} transition in {contents:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn manager_shutdown_closes_a_running_server() {
    let harness = Harness::new(1, Settings::default());
    harness.manager.start(None, None);
    harness.wait_for(ServerState::Running).await;

    harness.manager.shutdown().await;

    assert_eq!(harness.factory.close_count(), 1);
    assert_eq!(harness.host.errors(), Vec::<String>::new());
}
