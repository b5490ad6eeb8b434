//! View Events
//!
//! Lifecycle notifications the host emits for editor views (protyle
//! instances). The expander subscribes to four of them.
//!
//! # Wire Format
//!
//! Events travel as JSON objects carrying the host's event name and the raw
//! event detail:
//!
//! ```json
//! {"type": "switch-protyle", "detail": {"protyle": {"block": {"id": "2024..."}}}}
//! ```
//!
//! The detail is kept as untyped JSON. Only the block identifier at
//! `detail.protyle.block.id` is interpreted; the debug probe may read any
//! other field.

use serde::{Deserialize, Serialize};

use crate::block::BlockId;
use crate::error::TrackerError;

/// Kind of view lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewEventKind {
    /// View finished loading its static content
    #[serde(rename = "loaded-protyle-static")]
    LoadedStatic,
    /// View finished loading dynamically (scroll or lazy load)
    #[serde(rename = "loaded-protyle-dynamic")]
    LoadedDynamic,
    /// View switched to another document
    #[serde(rename = "switch-protyle")]
    Switched,
    /// View was torn down
    #[serde(rename = "destroy-protyle")]
    Destroyed,
}

impl ViewEventKind {
    /// All kinds, in registration order
    pub const ALL: [Self; 4] = [
        Self::LoadedStatic,
        Self::LoadedDynamic,
        Self::Switched,
        Self::Destroyed,
    ];

    /// Host event name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadedStatic => "loaded-protyle-static",
            Self::LoadedDynamic => "loaded-protyle-dynamic",
            Self::Switched => "switch-protyle",
            Self::Destroyed => "destroy-protyle",
        }
    }

    /// Parse a host event name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for ViewEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A view lifecycle notification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: ViewEventKind,
    /// Raw event detail from the host
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl ViewEvent {
    /// JSON pointer to the focused block identifier inside `detail`
    pub const BLOCK_ID_POINTER: &'static str = "/protyle/block/id";

    /// Create an event from a raw detail object
    #[must_use]
    pub fn new(kind: ViewEventKind, detail: serde_json::Value) -> Self {
        Self { kind, detail }
    }

    /// Create an event whose view is focused on `block_id`
    pub fn for_block(kind: ViewEventKind, block_id: impl Into<BlockId>) -> Self {
        let block_id = block_id.into();
        Self::new(
            kind,
            serde_json::json!({ "protyle": { "block": { "id": block_id } } }),
        )
    }

    /// Extract the focused block identifier
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MalformedEvent`] when the detail has no
    /// non-empty string at `protyle.block.id`.
    pub fn block_id(&self) -> Result<BlockId, TrackerError> {
        self.detail
            .pointer(Self::BLOCK_ID_POINTER)
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.is_empty())
            .map(BlockId::new)
            .ok_or_else(|| TrackerError::MalformedEvent {
                kind: self.kind,
                reason: "missing detail.protyle.block.id",
            })
    }

    /// Parse one newline-delimited JSON event
    ///
    /// # Errors
    ///
    /// Returns the serde error for invalid JSON or an unknown event name.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// Serialize to a single JSON line (without trailing newline)
    ///
    /// # Errors
    ///
    /// Returns the serde error if the detail cannot be serialized.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
