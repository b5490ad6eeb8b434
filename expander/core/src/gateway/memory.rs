//! In-Memory Gateway
//!
//! A gateway that keeps fold state in a set instead of asking a host. Every
//! call is recorded in order, which makes it the backing store for the
//! daemon's `--dry-run` mode and for tests.
//!
//! Failure injection:
//! - [`InMemoryGateway::fail_block`] makes every call for one block fail
//! - [`InMemoryGateway::set_offline`] makes every call fail
//!
//! Optional latency is applied before each call completes, so interleavings
//! of overlapping handlers can be exercised under a paused tokio clock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{Ack, AttributeGateway, CommandGateway};
use crate::block::{BlockId, FoldState};
use crate::error::GatewayError;

/// A recorded gateway call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    /// Fold state query
    FoldState(BlockId),
    /// Fold command
    Fold(BlockId),
    /// Unfold command
    Unfold(BlockId),
}

#[derive(Debug, Default)]
struct Inner {
    folded: HashSet<BlockId>,
    failing: HashSet<BlockId>,
    offline: bool,
    calls: Vec<GatewayCall>,
}

/// Gateway backed by an in-memory fold-state set
#[derive(Clone, Debug, Default)]
pub struct InMemoryGateway {
    inner: Arc<Mutex<Inner>>,
    latency: Duration,
}

impl InMemoryGateway {
    /// Create a gateway where no block is folded
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway where the given blocks start folded
    pub fn with_folded<I, B>(blocks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BlockId>,
    {
        let gateway = Self::new();
        gateway
            .inner
            .lock()
            .folded
            .extend(blocks.into_iter().map(Into::into));
        gateway
    }

    /// Delay every call by `latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the fold state of a block
    pub fn set_folded(&self, id: impl Into<BlockId>, folded: bool) {
        let id = id.into();
        let mut inner = self.inner.lock();
        if folded {
            inner.folded.insert(id);
        } else {
            inner.folded.remove(&id);
        }
    }

    /// Current fold state of a block
    #[must_use]
    pub fn is_folded(&self, id: &BlockId) -> bool {
        self.inner.lock().folded.contains(id)
    }

    /// Make every call for `id` fail
    pub fn fail_block(&self, id: impl Into<BlockId>) {
        self.inner.lock().failing.insert(id.into());
    }

    /// Make every call fail (or recover)
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// All calls so far, in the order they were issued
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner.lock().calls.clone()
    }

    /// Blocks that received a fold command, in order
    #[must_use]
    pub fn fold_requests(&self) -> Vec<BlockId> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Fold(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Blocks that received an unfold command, in order
    #[must_use]
    pub fn unfold_requests(&self) -> Vec<BlockId> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Unfold(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls (fold state is kept)
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Record a call and decide whether it fails
    fn record(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        let id = match &call {
            GatewayCall::FoldState(id) | GatewayCall::Fold(id) | GatewayCall::Unfold(id) => {
                id.clone()
            }
        };
        inner.calls.push(call);

        if inner.offline {
            return Err(GatewayError::Unavailable("gateway offline".to_string()));
        }
        if inner.failing.contains(&id) {
            return Err(GatewayError::Unavailable(format!("block {id} unreachable")));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl AttributeGateway for InMemoryGateway {
    async fn fold_state(&self, id: &BlockId) -> Result<FoldState, GatewayError> {
        self.record(GatewayCall::FoldState(id.clone()))?;
        self.simulate_latency().await;
        Ok(if self.is_folded(id) {
            FoldState::Folded
        } else {
            FoldState::Unfolded
        })
    }
}

#[async_trait]
impl CommandGateway for InMemoryGateway {
    async fn fold(&self, id: &BlockId) -> Result<Ack, GatewayError> {
        self.record(GatewayCall::Fold(id.clone()))?;
        self.simulate_latency().await;
        self.set_folded(id.clone(), true);
        Ok(Ack::default())
    }

    async fn unfold(&self, id: &BlockId) -> Result<Ack, GatewayError> {
        self.record(GatewayCall::Unfold(id.clone()))?;
        self.simulate_latency().await;
        self.set_folded(id.clone(), false);
        Ok(Ack::default())
    }
}
