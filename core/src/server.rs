use std::path::Path;

use async_trait::async_trait;
use sketchbook_protocol::BrowserEvent;
use tokio::sync::mpsc::UnboundedReceiver;

/// A sketch server bound to one root directory.
///
/// Exclusively owned by the lifecycle manager: created through a
/// [`ServerFactory`], started once, observed, and closed once. Events are
/// delivered in emission order over an unbounded channel.
#[async_trait]
pub trait SketchServer: Send + Sync {
    /// Begin listening. [`SketchServer::url`] is defined once this resolves.
    async fn start(&mut self) -> anyhow::Result<()>;

    /// Shut the server down and release its listener.
    async fn close(&mut self) -> anyhow::Result<()>;

    /// Base URL of the server, `None` until it is listening.
    fn url(&self) -> Option<String>;

    /// Map an absolute file path to a served URL. `None` when the path lies
    /// outside the served root.
    fn file_path_to_url(&self, path: &Path) -> Option<String>;

    /// Take the browser event stream. Yields `Some` exactly once; the stream
    /// is handed to a single console relay for this server's lifetime, so a
    /// second subscription cannot be constructed.
    fn take_event_stream(&mut self) -> Option<UnboundedReceiver<BrowserEvent>>;
}

/// Builds unstarted server handles. The host wires the real implementation;
/// tests substitute fakes.
#[async_trait]
pub trait ServerFactory: Send + Sync {
    async fn create(&self, root: &Path) -> anyhow::Result<Box<dyn SketchServer>>;
}
