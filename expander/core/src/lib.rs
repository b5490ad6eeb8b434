//! Expander Core - Adaptive Fold/Unfold for SiYuan Editor Views
//!
//! When an editor view lands on a folded block, the expander unfolds it so
//! the content is visible. When the view moves on or closes, every block the
//! expander unfolded is folded back. Blocks the user unfolded by hand are
//! never touched.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Host (SiYuan)                             │
//! │   view events                         kernel HTTP API          │
//! └──────┬───────────────────────────────────────▲───────────────┘
//!        │ ViewEvent                             │ fold / unfold / attrs
//! ┌──────▼───────────────────────────────────────┼───────────────┐
//! │                    EXPANDER CORE              │               │
//! │  ┌──────────┐   ┌────────────────┐   ┌───────┴──────────┐    │
//! │  │ EventBus │──▶│ ExpanderPlugin │──▶│ ExpansionTracker │    │
//! │  └──────────┘   │ (listeners,    │   │ (pending queue)  │    │
//! │                 │  HandlerTasks) │   └───────┬──────────┘    │
//! │                 └────────────────┘           │               │
//! │                                     ┌────────▼──────────┐    │
//! │                                     │ Attribute/Command │    │
//! │                                     │ Gateways          │    │
//! │                                     └───────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ExpansionTracker`]: Decides what to unfold and what to fold back
//! - [`ExpanderPlugin`]: Subscribes the tracker's handlers to an [`EventBus`]
//! - [`ViewEvent`]: A view lifecycle notification from the host
//! - [`SiyuanGateway`]: Kernel HTTP API client
//! - [`ExpanderConfig`]: Layered configuration (file, environment, CLI)
//!
//! # Quick Start
//!
//! ```ignore
//! use expander_core::{load_config, EventBus, ExpanderPlugin, ViewEvent, ViewEventKind};
//!
//! let config = load_config()?;
//! let plugin = ExpanderPlugin::connect(&config)?;
//! let bus = EventBus::new();
//! plugin.activate(&bus);
//!
//! bus.emit(&ViewEvent::for_block(ViewEventKind::LoadedStatic, "20240101120000-abcdefg"));
//!
//! plugin.shutdown().await;
//! ```
//!
//! # Module Overview
//!
//! - [`block`]: Block identifiers and fold state
//! - [`events`]: View event kinds and payloads
//! - [`bus`]: Listener registry events are emitted on
//! - [`gateway`]: Host API abstraction (SiYuan, in-memory)
//! - [`tracker`]: The pending-recovery queue and its handlers
//! - [`tasks`]: Task group for in-flight handlers
//! - [`plugin`]: Activation and deactivation
//! - [`debug`]: Diagnostic event probe
//! - [`frontend`]: Host front-end detection
//! - [`config`]: TOML configuration loading

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod bus;
pub mod config;
pub mod debug;
pub mod error;
pub mod events;
pub mod frontend;
pub mod gateway;
pub mod plugin;
pub mod tasks;
pub mod tracker;

// Re-exports for convenience
pub use block::{BlockId, FoldState};
pub use bus::{EventBus, ViewEventListener};
pub use debug::{resolve_dot_path, DebugProbe};
pub use error::{GatewayError, TrackerError};
pub use events::{ViewEvent, ViewEventKind};
pub use frontend::Frontend;
pub use gateway::{
    Ack, AttributeGateway, CommandGateway, GatewayCall, InMemoryGateway, SiyuanGateway,
};
pub use plugin::ExpanderPlugin;
pub use tasks::HandlerTasks;
pub use tracker::{ExpandOutcome, ExpansionTracker, FoldReport, PendingQueue};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DebugConfig, ExpanderConfig, ExpanderToml, SiyuanConfig, TrackerConfig,
};
