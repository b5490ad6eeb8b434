//! Expansion Tracker
//!
//! Owns the pending-recovery queue: the blocks this extension unfolded and
//! must fold back later. Three handlers drive it:
//!
//! - [`ExpansionTracker::handle_view_loaded`]: if the focused block is
//!   folded, unfold it and (after a short delay) start tracking it
//! - [`ExpansionTracker::handle_view_switched`]: fold every tracked block
//!   except the one now in view
//! - [`ExpansionTracker::handle_view_destroyed`]: fold every tracked block
//!
//! # Per-Block State Machine
//!
//! ```text
//! untracked ──(folded + unfold acked + delay)──▶ pending
//!     ▲                                            │
//!     └───────(switch away / destroy: fold)────────┘
//! ```
//!
//! # Concurrency
//!
//! Handlers for different events interleave at every gateway call and at the
//! register delay. The queue lives behind a mutex that is only ever held for
//! a short synchronous section, never across an `.await`, so every handler
//! observes and leaves a consistent queue. Fold decisions update the queue
//! before the fold requests go out; the requests are then awaited together.
//!
//! The register delay keeps a freshly unfolded block out of the queue while
//! the reconciliation pass triggered by the same load event runs, so the
//! block is not folded straight back and the view does not flash.
//!
//! [`ExpansionTracker::clear`] starts a new generation. A load handler that
//! began before the clear never tracks its block afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;

use crate::block::BlockId;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::events::ViewEvent;
use crate::gateway::{AttributeGateway, CommandGateway};

/// Delay between an acknowledged unfold and tracking the block
pub const DEFAULT_REGISTER_DELAY: Duration = Duration::from_millis(100);

/// Ordered set of blocks awaiting re-fold
///
/// Insertion order is preserved and a block appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingQueue {
    ids: Vec<BlockId>,
}

impl PendingQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is tracked
    #[must_use]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.ids.contains(id)
    }

    /// Track `id` unless it already is
    ///
    /// Returns true if it was added.
    pub fn push_unique(&mut self, id: BlockId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Keep only `active` (if tracked) and return everything else, in order
    pub fn retain_only(&mut self, active: &BlockId) -> Vec<BlockId> {
        let (kept, released): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.ids).into_iter().partition(|id| id == active);
        self.ids = kept;
        released
    }

    /// Remove and return every tracked block, in order
    pub fn drain(&mut self) -> Vec<BlockId> {
        std::mem::take(&mut self.ids)
    }

    /// Number of tracked blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Tracked blocks, in order
    #[must_use]
    pub fn as_slice(&self) -> &[BlockId] {
        &self.ids
    }
}

/// What a load handler decided
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// Block was not folded; nothing done
    NotFolded,
    /// Block was unfolded and is now tracked
    Expanded(BlockId),
    /// Block was unfolded but was already tracked
    AlreadyTracked(BlockId),
    /// Block was unfolded but the queue was cleared meanwhile; not tracked
    Discarded(BlockId),
}

/// What a fold pass did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FoldReport {
    /// Blocks a fold was requested for, in queue order
    pub requested: Vec<BlockId>,
    /// Subset of `requested` whose fold request failed
    pub failed: Vec<BlockId>,
    /// Block still tracked after the pass, if any
    pub retained: Option<BlockId>,
}

impl FoldReport {
    /// Whether any fold was requested
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }
}

/// The expansion tracker
pub struct ExpansionTracker {
    attributes: Arc<dyn AttributeGateway>,
    commands: Arc<dyn CommandGateway>,
    pending: Mutex<PendingQueue>,
    /// Bumped by `clear`, under the `pending` lock
    generation: AtomicU64,
    register_delay: Duration,
}

impl ExpansionTracker {
    /// Create a tracker over the given gateways
    pub fn new(
        attributes: Arc<dyn AttributeGateway>,
        commands: Arc<dyn CommandGateway>,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            attributes,
            commands,
            pending: Mutex::new(PendingQueue::new()),
            generation: AtomicU64::new(0),
            register_delay: config.register_delay,
        }
    }

    /// Create a tracker over one gateway that serves both roles
    pub fn with_gateway<G>(gateway: Arc<G>, config: &TrackerConfig) -> Self
    where
        G: AttributeGateway + CommandGateway + 'static,
    {
        Self::new(gateway.clone(), gateway, config)
    }

    /// Snapshot of the pending-recovery queue
    #[must_use]
    pub fn pending(&self) -> Vec<BlockId> {
        self.pending.lock().as_slice().to_vec()
    }

    /// Delay applied before tracking a freshly unfolded block
    #[must_use]
    pub fn register_delay(&self) -> Duration {
        self.register_delay
    }

    /// Expand decision for a loaded view
    ///
    /// Queries the focused block; if it is folded, unfolds it and, after the
    /// register delay, adds it to the queue (once). If the queue was cleared
    /// while the handler ran, the block is left unfolded and untracked.
    ///
    /// # Errors
    ///
    /// Aborts with the queue untouched if the event has no block id or a
    /// gateway call fails.
    pub async fn handle_view_loaded(&self, event: &ViewEvent) -> Result<ExpandOutcome, TrackerError> {
        let id = event.block_id()?;
        let generation = self.generation.load(Ordering::SeqCst);

        let state = self.attributes.fold_state(&id).await?;
        if !state.is_folded() {
            tracing::debug!(block_id = %id, kind = %event.kind, "Block not folded, leaving as is");
            return Ok(ExpandOutcome::NotFolded);
        }

        let ack = self.commands.unfold(&id).await?;
        tracing::debug!(block_id = %id, payload = %ack.payload, "Unfold acknowledged");

        tokio::time::sleep(self.register_delay).await;

        let added = {
            let mut pending = self.pending.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                None
            } else {
                Some(pending.push_unique(id.clone()))
            }
        };
        let Some(added) = added else {
            tracing::debug!(block_id = %id, "Queue cleared during expand, not tracking");
            return Ok(ExpandOutcome::Discarded(id));
        };
        if added {
            tracing::debug!(block_id = %id, "Tracking unfolded block");
            Ok(ExpandOutcome::Expanded(id))
        } else {
            tracing::debug!(block_id = %id, "Block already tracked");
            Ok(ExpandOutcome::AlreadyTracked(id))
        }
    }

    /// Fold decision for a switched (or freshly loaded) view
    ///
    /// Every tracked block other than the one in view is released from the
    /// queue immediately and a fold is requested for it. The block in view
    /// stays tracked if it was tracked.
    ///
    /// # Errors
    ///
    /// Aborts with the queue untouched if the event has no block id. Fold
    /// failures are reported in [`FoldReport::failed`], not as errors.
    pub async fn handle_view_switched(&self, event: &ViewEvent) -> Result<FoldReport, TrackerError> {
        let active = event.block_id()?;

        let (released, retained) = {
            let mut pending = self.pending.lock();
            let released = pending.retain_only(&active);
            let retained = pending.contains(&active).then(|| active.clone());
            (released, retained)
        };

        if !released.is_empty() {
            tracing::debug!(
                active = %active,
                count = released.len(),
                "Folding blocks no longer in view"
            );
        }

        let failed = self.fold_all(&released).await;
        Ok(FoldReport {
            requested: released,
            failed,
            retained,
        })
    }

    /// Fold decision for a destroyed view
    ///
    /// Empties the queue and requests a fold for everything that was in it.
    pub async fn handle_view_destroyed(&self, event: &ViewEvent) -> FoldReport {
        let released = self.pending.lock().drain();
        if !released.is_empty() {
            tracing::debug!(
                kind = %event.kind,
                count = released.len(),
                "View destroyed, folding every tracked block"
            );
        }

        let failed = self.fold_all(&released).await;
        FoldReport {
            requested: released,
            failed,
            retained: None,
        }
    }

    /// Drop every tracked block without folding
    ///
    /// Load handlers still in flight will not track their block. Returns
    /// what was tracked.
    pub fn clear(&self) -> Vec<BlockId> {
        let mut pending = self.pending.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        pending.drain()
    }

    /// Request folds concurrently, returning the blocks whose request failed
    async fn fold_all(&self, ids: &[BlockId]) -> Vec<BlockId> {
        let results = join_all(ids.iter().map(|id| async move {
            let result = self.commands.fold(id).await;
            (id, result)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(block_id = %id, error = %e, "Fold request failed");
                    Some(id.clone())
                }
            })
            .collect()
    }
}
