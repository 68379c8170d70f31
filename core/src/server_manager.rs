//! Lifecycle of the singleton sketch server.
//!
//! A manager actor owns the server handle and serializes every lifecycle
//! operation over a command queue, which stands in for the host's
//! single-threaded event loop: no two guarded operations can interleave
//! mid-body. Guards run twice, once at submission so a command issued during
//! a suspended operation is dropped rather than deferred, and once at
//! execution against the state the actor actually reached.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use sketchbook_protocol::ServerState;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::console;
use crate::console::ConsoleRelayHandle;
use crate::console::LensAnnotation;
use crate::host::BrowserLauncher;
use crate::host::HostUi;
use crate::host::OutputChannel;
use crate::host::SettingsSource;
use crate::host::StatusItem;
use crate::host::WorkspaceHost;
use crate::open_browser::BrowserRequest;
use crate::open_browser::LaunchPlan;
use crate::open_browser::launch_external;
use crate::open_browser::resolve_browser;
use crate::server::ServerFactory;
use crate::server::SketchServer;
use crate::status_bar::StatusBarManager;

/// How long lifecycle status messages linger before they are dismissed.
const STATUS_MESSAGE_LINGER: Duration = Duration::from_secs(10);

/// Everything the manager needs from the host, bundled so composition roots
/// and tests build it in one place.
pub struct HostServices {
    pub factory: Arc<dyn ServerFactory>,
    pub workspace: Arc<dyn WorkspaceHost>,
    pub ui: Arc<dyn HostUi>,
    pub launcher: Arc<dyn BrowserLauncher>,
    pub output: Arc<dyn OutputChannel>,
    pub settings: Arc<dyn SettingsSource>,
    pub server_status_item: Box<dyn StatusItem>,
    pub browser_status_item: Box<dyn StatusItem>,
}

enum ManagerCommand {
    Start {
        file: Option<PathBuf>,
        browser: Option<BrowserRequest>,
    },
    Stop,
    OpenBrowser {
        file: Option<PathBuf>,
        browser: Option<BrowserRequest>,
    },
    Shutdown,
}

/// Owner's handle on the manager actor. Lifecycle submissions are fire and
/// forget; outcomes surface through the state stream and the host UI.
pub struct ServerManagerHandle {
    commands: UnboundedSender<ManagerCommand>,
    state: watch::Receiver<ServerState>,
    relay: Arc<Mutex<Option<ConsoleRelayHandle>>>,
    task: JoinHandle<()>,
}

impl ServerManagerHandle {
    pub fn spawn(services: HostServices) -> Self {
        let (commands, queue) = unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ServerState::Stopped);
        let relay = Arc::new(Mutex::new(None));
        let status_bar = StatusBarManager::new(
            services.server_status_item,
            services.browser_status_item,
            Arc::clone(&services.settings),
        );
        status_bar.update(ServerState::Stopped, None);
        let actor = ManagerActor {
            state: state_tx,
            server: None,
            relay: Arc::clone(&relay),
            status_bar,
            factory: services.factory,
            workspace: services.workspace,
            ui: services.ui,
            launcher: services.launcher,
            output: services.output,
            settings: services.settings,
            dismissals: Vec::new(),
        };
        let task = tokio::spawn(actor.run(queue));
        Self {
            commands,
            state: state_rx,
            relay,
            task,
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Stream of lifecycle states, starting from the current one.
    pub fn state_stream(&self) -> watch::Receiver<ServerState> {
        self.state.clone()
    }

    /// Start the server, then open `file` (or the served root). A call while
    /// the server is not stopped is a silent no-op.
    pub fn start(&self, file: Option<PathBuf>, browser: Option<BrowserRequest>) {
        if self.state() != ServerState::Stopped {
            return;
        }
        let _ = self.commands.send(ManagerCommand::Start { file, browser });
    }

    /// Stop the server. A call while it is not running is a silent no-op.
    pub fn stop(&self) {
        if self.state() != ServerState::Running {
            return;
        }
        let _ = self.commands.send(ManagerCommand::Stop);
    }

    /// Open `file` (or the served root) in the resolved browser. A call
    /// while the server is not running is a silent no-op.
    pub fn open_browser(&self, file: Option<PathBuf>, browser: Option<BrowserRequest>) {
        if self.state() != ServerState::Running {
            return;
        }
        let _ = self
            .commands
            .send(ManagerCommand::OpenBrowser { file, browser });
    }

    /// Dispatch for the open-browser command: starts the server when it is
    /// stopped, opens a browser when it is running, and does nothing during
    /// a transition.
    pub fn start_or_open_browser(&self, file: Option<PathBuf>, browser: Option<BrowserRequest>) {
        match self.state() {
            ServerState::Stopped => self.start(file, browser),
            ServerState::Running => self.open_browser(file, browser),
            ServerState::Starting | ServerState::Stopping => {}
        }
    }

    /// Annotations for `file` from the current server's console relay.
    /// Empty while no server is running.
    pub async fn annotations_for_file(&self, file: &str) -> Vec<LensAnnotation> {
        match self.relay.lock().await.as_ref() {
            Some(relay) => relay.annotations_for_file(file).await,
            None => Vec::new(),
        }
    }

    /// Change stream for the current server's annotations, if any. Streams
    /// do not survive a server restart; callers re-subscribe on start.
    pub async fn annotations_changed(&self) -> Option<watch::Receiver<u64>> {
        self.relay
            .lock()
            .await
            .as_ref()
            .map(ConsoleRelayHandle::annotations_changed)
    }

    /// Stop the actor, closing any running server on the way out. Commands
    /// already queued are processed first.
    pub async fn shutdown(self) {
        let _ = self.commands.send(ManagerCommand::Shutdown);
        if let Err(error) = self.task.await {
            debug!("server manager task ended abnormally: {error}");
        }
    }
}

struct ManagerActor {
    state: watch::Sender<ServerState>,
    server: Option<Box<dyn SketchServer>>,
    relay: Arc<Mutex<Option<ConsoleRelayHandle>>>,
    status_bar: StatusBarManager,
    factory: Arc<dyn ServerFactory>,
    workspace: Arc<dyn WorkspaceHost>,
    ui: Arc<dyn HostUi>,
    launcher: Arc<dyn BrowserLauncher>,
    output: Arc<dyn OutputChannel>,
    settings: Arc<dyn SettingsSource>,
    /// Auto-dismiss timers for lingering status messages.
    dismissals: Vec<JoinHandle<()>>,
}

impl ManagerActor {
    async fn run(mut self, mut queue: UnboundedReceiver<ManagerCommand>) {
        while let Some(command) = queue.recv().await {
            match command {
                ManagerCommand::Start { file, browser } => self.start(file, browser).await,
                ManagerCommand::Stop => self.stop().await,
                ManagerCommand::OpenBrowser { file, browser } => {
                    self.open_browser(file.as_deref(), browser).await;
                }
                ManagerCommand::Shutdown => break,
            }
        }
        self.dispose().await;
    }

    fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ServerState) {
        self.state.send_replace(state);
        info!(state = %state, "server state changed");
        let url = self.server.as_ref().and_then(|server| server.url());
        self.status_bar.update(state, url.as_deref());
    }

    async fn start(&mut self, file: Option<PathBuf>, browser: Option<BrowserRequest>) {
        if self.state() != ServerState::Stopped {
            return;
        }
        self.set_state(ServerState::Starting);

        let Some(root) = self.resolve_root().await else {
            // No workspace to serve, or the user dismissed the picker.
            self.set_state(ServerState::Stopped);
            return;
        };

        // No two live handles: close any leftover before starting anew.
        if let Some(mut stale) = self.server.take() {
            if let Err(error) = stale.close().await {
                warn!("failed to close leftover server: {error:#}");
            }
        }
        if let Some(relay) = self.relay.lock().await.take() {
            relay.shutdown().await;
        }

        let starting_notice = self
            .ui
            .status_message(&format!("Starting the sketch server at {}", root.display()));

        let started = async {
            let mut server = self.factory.create(&root).await?;
            server.start().await?;
            Ok::<_, anyhow::Error>(server)
        }
        .await;

        let mut server = match started {
            Ok(server) => server,
            Err(error) => {
                drop(starting_notice);
                self.set_state(ServerState::Stopped);
                self.ui
                    .show_error(&format!("The sketch server failed to start: {error:#}"));
                return;
            }
        };

        match server.take_event_stream() {
            Some(events) => {
                let relay = console::subscribe(
                    events,
                    Arc::clone(&self.output),
                    Arc::clone(&self.settings),
                );
                *self.relay.lock().await = Some(relay);
            }
            None => warn!("server offered no event stream, console stays silent"),
        }

        let url = server.url();
        self.server = Some(server);
        self.set_state(ServerState::Running);

        drop(starting_notice);
        if let Some(url) = url.as_deref() {
            self.transient_status(format!("The sketch server is running at {url}"));
        }

        self.open_browser(file.as_deref(), browser).await;
    }

    async fn stop(&mut self) {
        if self.state() != ServerState::Running {
            return;
        }
        let Some(mut server) = self.server.take() else {
            return;
        };
        self.set_state(ServerState::Stopping);

        let shutting_notice = self.ui.status_message("Shutting down the sketch server…");
        let closed = server.close().await;
        drop(server);
        if let Some(relay) = self.relay.lock().await.take() {
            relay.shutdown().await;
        }
        self.set_state(ServerState::Stopped);

        drop(shutting_notice);
        match closed {
            Ok(()) => {
                self.transient_status("The sketch server is no longer running.".to_owned());
            }
            Err(error) => {
                // The handle is discarded either way; the state machine must
                // come to rest even if the underlying process leaked.
                self.ui
                    .show_error(&format!("The sketch server failed to stop: {error:#}"));
            }
        }
    }

    async fn open_browser(&self, file: Option<&Path>, browser: Option<BrowserRequest>) {
        let Some(server) = self.server.as_ref() else {
            return;
        };
        let Some(base_url) = server.url() else {
            return;
        };
        let target = match file {
            Some(file) => match server.file_path_to_url(file) {
                Some(url) => url,
                None => {
                    self.ui.show_error(&format!(
                        "{} is not in a directory that is served by the sketch server.",
                        file.display()
                    ));
                    return;
                }
            },
            None => base_url,
        };

        match resolve_browser(browser, self.settings.current().browser) {
            LaunchPlan::Integrated => self.ui.open_integrated(&target),
            LaunchPlan::External(app) => {
                let launched =
                    launch_external(self.ui.as_ref(), self.launcher.as_ref(), &target, app).await;
                if let Err(error) = launched {
                    self.ui.show_error(&error.to_string());
                }
            }
        }
    }

    async fn resolve_root(&self) -> Option<PathBuf> {
        let roots = self.workspace.workspace_roots();
        match roots.len() {
            0 => None,
            1 => roots.into_iter().next(),
            _ => {
                let items: Vec<String> = roots
                    .iter()
                    .map(|root| root.display().to_string())
                    .collect();
                let picked = self.ui.pick("Select a folder to serve", &items).await?;
                Some(PathBuf::from(picked))
            }
        }
    }

    /// Show a status message and dismiss it after [`STATUS_MESSAGE_LINGER`].
    fn transient_status(&mut self, text: String) {
        let message = self.ui.status_message(&text);
        self.dismissals.retain(|timer| !timer.is_finished());
        self.dismissals.push(tokio::spawn(async move {
            sleep(STATUS_MESSAGE_LINGER).await;
            drop(message);
        }));
    }

    async fn dispose(&mut self) {
        for timer in self.dismissals.drain(..) {
            timer.abort();
        }
        if let Some(mut server) = self.server.take() {
            if let Err(error) = server.close().await {
                warn!("failed to close server during shutdown: {error:#}");
            }
        }
        if let Some(relay) = self.relay.lock().await.take() {
            relay.shutdown().await;
        }
        self.set_state(ServerState::Stopped);
    }
}
