//! Debug Probe
//!
//! Diagnostic listener subscribed ahead of the tracker handlers when the
//! debug option is on. For every event it logs a call number, one selected
//! field of the event and the event's block id, all under the
//! `expander::debug` target.
//!
//! The field is chosen with a dot-separated path resolved against the
//! event's JSON form (`{"type": ..., "detail": ...}`). Resolution stops at
//! the first segment that does not exist, so an invalid or empty path logs
//! the deepest value that could be reached (the whole event at worst).

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::bus::ViewEventListener;
use crate::events::ViewEvent;

/// Resolve as much of a dot-separated path as exists in `root`
///
/// Returns the valid prefix (each segment written as `.segment`) and the
/// value it selects. Numeric segments index into arrays.
#[must_use]
pub fn resolve_dot_path<'a>(root: &'a Value, path: &str) -> (String, &'a Value) {
    let mut valid = String::new();
    let mut value = root;

    for segment in path.split('.') {
        let next = match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        let Some(next) = next else {
            break;
        };
        valid.push('.');
        valid.push_str(segment);
        value = next;
    }

    (valid, value)
}

/// Listener that logs events for diagnosis
pub struct DebugProbe {
    path: String,
    calls: AtomicU64,
}

impl DebugProbe {
    /// Create a probe logging the field selected by `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of events seen
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Configured dot path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ViewEventListener for DebugProbe {
    fn name(&self) -> &'static str {
        "debug-probe"
    }

    fn on_event(&self, event: &ViewEvent) {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(target: "expander::debug", call, kind = %event.kind, "Probe called");

        let json = match serde_json::to_value(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::info!(target: "expander::debug", call, error = %e, "Event not serializable");
                return;
            }
        };
        let (resolved, value) = resolve_dot_path(&json, &self.path);
        tracing::info!(
            target: "expander::debug",
            call,
            path = %format!("event{resolved}"),
            value = %value,
            "Selected event field"
        );

        match event.block_id() {
            Ok(id) => tracing::info!(target: "expander::debug", call, block_id = %id, "Event block id"),
            Err(_) => tracing::info!(target: "expander::debug", call, "Event has no block id"),
        }
    }
}
