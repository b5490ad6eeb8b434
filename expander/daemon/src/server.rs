//! Event Bridge Server
//!
//! Accepts connections on a Unix socket and feeds the view events they carry
//! into the [`EventBus`] the expander is subscribed to.
//!
//! # Protocol
//!
//! Newline-delimited JSON in both directions. Each non-empty line from the
//! client is one view event:
//!
//! ```json
//! {"type": "loaded-protyle-static", "detail": {"protyle": {"block": {"id": "..."}}}}
//! ```
//!
//! and is answered with exactly one ack line:
//!
//! ```json
//! {"accepted": true, "dispatched": 3}
//! {"accepted": false, "error": "unknown variant `click-editorcontent`, ..."}
//! ```
//!
//! `dispatched` is the number of listeners the event reached. Handler
//! results are never reported back; the tracker's work happens in the
//! background.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use expander_core::{EventBus, ViewEvent};

/// How often the accept loop checks the shutdown flag
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Unix socket server bridging host events onto the bus
pub struct EventBridgeServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    /// Bus events are emitted on
    bus: EventBus,
    /// Active connection handlers
    connections: JoinSet<()>,
    /// Connection counter for log spans
    next_conn_id: u64,
}

impl EventBridgeServer {
    /// Create a server for `socket_path` emitting on `bus`
    pub fn new(socket_path: PathBuf, bus: EventBus) -> Self {
        Self {
            socket_path,
            bus,
            connections: JoinSet::new(),
            next_conn_id: 0,
        }
    }

    /// Prepare the socket path (create directory, remove stale socket)
    fn prepare_socket(&self) -> Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create socket directory: {parent:?}"))?;
                info!(path = ?parent, "Created socket directory");
            }
        }

        if self.socket_path.exists() {
            warn!(path = ?self.socket_path, "Removing stale socket file");
            fs::remove_file(&self.socket_path).with_context(|| {
                format!("Failed to remove stale socket: {:?}", self.socket_path)
            })?;
        }

        Ok(())
    }

    /// Accept connections until `shutdown` is set
    ///
    /// Open connections are closed when the loop stops.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<()> {
        self.prepare_socket()?;

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind to {:?}", self.socket_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.socket_path, perms)
                .with_context(|| format!("Failed to restrict {:?}", self.socket_path))?;
        }

        info!(path = ?self.socket_path, "Listening for view events");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested, stopping accept loop");
                break;
            }

            while let Some(finished) = self.connections.try_join_next() {
                if let Err(e) = finished {
                    if e.is_panic() {
                        error!(error = %e, "Connection handler panicked");
                    }
                }
            }

            let accept_result =
                tokio::time::timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await;

            let stream = match accept_result {
                Ok(Ok((stream, _addr))) => stream,
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                    continue;
                }
                Err(_) => continue,
            };

            self.next_conn_id += 1;
            let conn_id = self.next_conn_id;
            info!(
                conn_id,
                active_connections = self.connections.len() + 1,
                "New connection accepted"
            );

            let bus = self.bus.clone();
            self.connections.spawn(
                async move {
                    if let Err(e) = handle_connection(stream, bus).await {
                        warn!(error = %e, "Connection closed with error");
                    }
                }
                .instrument(tracing::info_span!("connection", conn_id)),
            );
        }

        let open = self.connections.len();
        self.connections.shutdown().await;
        info!(closed = open, "Event bridge stopped");
        Ok(())
    }
}

/// Serve one connection until the client closes it
///
/// # Errors
///
/// Returns an error if reading from or writing to the stream fails.
pub async fn handle_connection<S>(stream: S, bus: EventBus) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read event line")? {
        if line.trim().is_empty() {
            continue;
        }

        let mut ack = dispatch_line(&bus, &line).to_string();
        ack.push('\n');
        write_half
            .write_all(ack.as_bytes())
            .await
            .context("Failed to write ack")?;
    }

    debug!("Client disconnected (EOF)");
    Ok(())
}

/// Parse one event line, emit it and build the ack
fn dispatch_line(bus: &EventBus, line: &str) -> serde_json::Value {
    match ViewEvent::from_json_line(line) {
        Ok(event) => {
            let dispatched = bus.emit(&event);
            debug!(kind = %event.kind, dispatched, "Event dispatched");
            json!({ "accepted": true, "dispatched": dispatched })
        }
        Err(e) => {
            warn!(error = %e, "Rejected malformed event line");
            json!({ "accepted": false, "error": e.to_string() })
        }
    }
}
