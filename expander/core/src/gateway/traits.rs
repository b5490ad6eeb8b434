//! Gateway Traits
//!
//! The tracker talks to the host through two narrow interfaces: one that
//! reads a block's fold state and one that asks the host to fold or unfold a
//! block. Implementations handle transport details (HTTP, in-memory, ...).
//!
//! No ordering guarantee is assumed between calls: responses may complete in
//! any order relative to each other and to event delivery.

use async_trait::async_trait;

use crate::block::{BlockId, FoldState};
use crate::error::GatewayError;

/// Acknowledgement of a fold or unfold command
///
/// The tracker only cares that the command succeeded; the payload is kept
/// for logging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ack {
    /// Whatever the host returned alongside the acknowledgement
    pub payload: serde_json::Value,
}

impl Ack {
    /// Wrap a host payload
    #[must_use]
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }
}

/// Attribute query gateway
#[async_trait]
pub trait AttributeGateway: Send + Sync {
    /// Read the current fold state of a block
    async fn fold_state(&self, id: &BlockId) -> Result<FoldState, GatewayError>;
}

/// Fold/unfold command gateway
#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Ask the host to collapse a block
    async fn fold(&self, id: &BlockId) -> Result<Ack, GatewayError>;

    /// Ask the host to expand a block
    async fn unfold(&self, id: &BlockId) -> Result<Ack, GatewayError>;
}
