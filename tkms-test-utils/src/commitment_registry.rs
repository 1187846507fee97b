//! An in-memory [`CommitmentRegistry`] fixture, keyed the same way a real
//! registry contract would be: `(epoch, operator)`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tkms_node::anchor::{AnchorRecord, CommitmentRegistry};
use tkms_types::epoch::Epoch;
use tkms_types::node::NodeId;

/// The shared backing store behind every operator's [`InMemoryCommitmentRegistry`]
/// handle, so a test can submit as one operator and read back as another.
#[derive(Default)]
pub struct SharedAnchorStore {
    records: Mutex<HashMap<(Epoch, NodeId), AnchorRecord>>,
}

impl SharedAnchorStore {
    /// Creates an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// One operator's handle onto a [`SharedAnchorStore`]: submissions are
/// recorded under this handle's `operator` identity, matching how a real
/// registry resolves the submitter from the authenticated caller rather
/// than from the submission payload.
pub struct InMemoryCommitmentRegistry {
    store: Arc<SharedAnchorStore>,
    operator: NodeId,
}

impl InMemoryCommitmentRegistry {
    /// Builds a handle for `operator` onto `store`.
    pub fn new(store: Arc<SharedAnchorStore>, operator: NodeId) -> Self {
        Self { store, operator }
    }
}

#[async_trait]
impl CommitmentRegistry for InMemoryCommitmentRegistry {
    async fn submit(&self, epoch: Epoch, commitment_hash: [u8; 32], ack_merkle_root: [u8; 32]) -> eyre::Result<()> {
        self.store.records.lock().insert(
            (epoch, self.operator),
            AnchorRecord {
                commitment_hash,
                ack_merkle_root,
                submitted_at: 0,
            },
        );
        Ok(())
    }

    async fn get(&self, epoch: Epoch, operator: NodeId) -> eyre::Result<Option<AnchorRecord>> {
        Ok(self.store.records.lock().get(&(epoch, operator)).copied())
    }
}
