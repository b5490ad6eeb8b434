//! Expander Daemon - Event Bridge for the SiYuan Adaptive Expander
//!
//! Runs the expander out of process. The host side forwards its editor view
//! events over a Unix socket; the daemon dispatches them to the expander,
//! which folds and unfolds blocks through the SiYuan kernel HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (kernel at http://127.0.0.1:6806)
//! expander-daemon
//!
//! # Custom socket path and kernel token
//! expander-daemon --socket-path /tmp/expander.sock --token "$SIYUAN_API_TOKEN"
//!
//! # Log every event through the debug probe
//! expander-daemon --debug --debug-path detail.protyle.block.id
//!
//! # Exercise the bridge without touching a kernel
//! expander-daemon --dry-run
//!
//! # Verbose logging
//! RUST_LOG=debug expander-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: stop accepting, deactivate the expander, let
//!   in-flight handlers finish, remove the socket

mod server;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use expander_core::{
    default_config_path, load_config_from_path, ConfigOverrides, EventBus, ExpanderConfig,
    ExpanderPlugin, Frontend, InMemoryGateway,
};
use server::EventBridgeServer;

/// Expander Daemon - bridges SiYuan view events to the adaptive expander
#[derive(Parser, Debug)]
#[command(name = "expander-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Unix socket path the host connects to
    #[arg(short = 's', long, env = "EXPANDER_SOCKET", value_name = "PATH")]
    socket_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "EXPANDER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// SiYuan kernel base URL
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// SiYuan API token
    #[arg(long, env = "SIYUAN_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Subscribe the debug probe
    #[arg(long)]
    debug: bool,

    /// Dot-separated event field the debug probe logs
    #[arg(long, value_name = "PATH")]
    debug_path: Option<String>,

    /// Host front-end (desktop, desktop-window, mobile, browser-desktop, browser-mobile)
    #[arg(long, value_name = "NAME")]
    frontend: Option<Frontend>,

    /// Keep fold state in memory instead of calling the kernel
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "EXPANDER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.api_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(ref token) = self.token {
            overrides = overrides.with_token(token.clone());
        }
        if self.debug {
            overrides = overrides.with_debug_enabled(true);
        }
        if let Some(ref path) = self.debug_path {
            overrides = overrides.with_debug_path(path.clone());
        }
        if let Some(frontend) = self.frontend {
            overrides = overrides.with_frontend(frontend);
        }
        overrides
    }
}

/// Get the default socket path
///
/// Uses `XDG_RUNTIME_DIR` if available, otherwise the system temp directory.
fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map_or_else(std::env::temp_dir, PathBuf::from)
        .join("adaptive-expander")
        .join("expander.sock")
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "expander_daemon={level},expander_core={level},expander={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Resolve configuration from file, environment and CLI
fn resolve_config(args: &Args) -> Result<ExpanderConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        base_url = %config.siyuan.base_url,
        frontend = %config.frontend,
        debug = config.debug.enabled,
        "Configuration resolved"
    );
    Ok(config)
}

fn build_plugin(config: &ExpanderConfig, dry_run: bool) -> Result<ExpanderPlugin> {
    if dry_run {
        warn!("Dry run: fold state is kept in memory, the kernel is never called");
        return Ok(ExpanderPlugin::with_gateway(
            Arc::new(InMemoryGateway::new()),
            config,
        ));
    }
    ExpanderPlugin::connect(config).context("Failed to create SiYuan client")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Expander daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    let config = resolve_config(&args)?;
    let socket_path = args.socket_path.clone().unwrap_or_else(default_socket_path);
    info!(socket_path = ?socket_path, "Socket path");

    let plugin = build_plugin(&config, args.dry_run)?;
    let bus = EventBus::new();
    plugin.activate(&bus);

    // Setup signal handlers
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    let shutdown_clone = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
        }
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let mut server = EventBridgeServer::new(socket_path.clone(), bus);
    let result = server.run(shutdown).await;

    // Cleanup
    info!("Shutting down...");
    plugin.shutdown().await;

    if socket_path.exists() {
        if let Err(e) = fs::remove_file(&socket_path) {
            warn!(error = %e, "Failed to remove socket file");
        }
    }

    match result {
        Ok(()) => {
            info!("Expander daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_become_overrides() {
        let args = Args::parse_from([
            "expander-daemon",
            "--api-url",
            "http://10.0.0.2:6806",
            "--debug",
            "--debug-path",
            "detail",
            "--frontend",
            "browser-mobile",
        ]);
        let overrides = args.overrides();

        assert_eq!(overrides.base_url.as_deref(), Some("http://10.0.0.2:6806"));
        assert_eq!(overrides.debug_enabled, Some(true));
        assert_eq!(overrides.debug_path.as_deref(), Some("detail"));
        assert_eq!(overrides.frontend, Some(Frontend::BrowserMobile));
    }

    #[test]
    fn test_unknown_frontend_is_rejected() {
        let result = Args::try_parse_from(["expander-daemon", "--frontend", "tablet"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_flag_absent_leaves_config_alone() {
        let args = Args::parse_from(["expander-daemon", "--dry-run"]);
        assert!(args.dry_run);
        assert_eq!(args.overrides().debug_enabled, None);
    }

    #[test]
    fn test_default_socket_path_name() {
        assert!(default_socket_path().ends_with("adaptive-expander/expander.sock"));
    }
}
