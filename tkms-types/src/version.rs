//! The key-share version: the full descriptor of state produced by one DKG
//! or reshare round, and its pending/active/retired lifecycle.

use serde::{Deserialize, Serialize};
use tkms_core::curve::{G2, ScalarField};
use zeroize::ZeroizeOnDrop;

use crate::epoch::Epoch;
use crate::node::NodeId;

/// The ordered, immutable set of operators holding shares for an epoch.
/// Ordering is by ascending [`NodeId`] and is load-bearing: Lagrange
/// coefficient computation and deterministic dealer/player iteration both
/// rely on every honest node agreeing on this order.
pub type Committee = Vec<NodeId>;

/// A committee failed cluster-assembly validation (§3): a zero NodeId, or
/// two operator addresses that collided on the same NodeId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommitteeError {
    /// An address derived to the zero scalar, which is not a valid
    /// evaluation point.
    #[error("committee member at index {0} has a zero NodeId")]
    ZeroNodeId(usize),
    /// Two distinct addresses derived to the same NodeId.
    #[error("committee members at indices {0} and {1} collide on NodeId")]
    CollidingNodeId(usize, usize),
}

/// Validates and canonically sorts a set of operator NodeIds into a
/// [`Committee`], rejecting zero NodeIds and collisions per §3.
pub fn assemble_committee(mut members: Vec<NodeId>) -> Result<Committee, CommitteeError> {
    for (i, id) in members.iter().enumerate() {
        if id.is_zero() {
            return Err(CommitteeError::ZeroNodeId(i));
        }
    }
    members.sort();
    for (i, window) in members.windows(2).enumerate() {
        if window[0] == window[1] {
            return Err(CommitteeError::CollidingNodeId(i, i + 1));
        }
    }
    Ok(members)
}

/// The minimum number of partials required to reconstruct an application
/// capability for a committee of size `n`: `ceil(2n/3)`.
pub fn threshold_for_committee_size(n: usize) -> usize {
    (2 * n).div_ceil(3)
}

/// A version's position in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    /// Installed by a successful protocol round, not yet activated.
    Pending,
    /// The single version currently serving application requests.
    Active,
    /// A formerly active version, retained for time-bounded lookback.
    Retired,
}

/// The full descriptor of the state produced by one DKG or reshare round.
///
/// The local private share is zeroized on drop; it must never be logged,
/// serialised for transport, or otherwise leave this process.
#[derive(ZeroizeOnDrop)]
pub struct KeyShareVersion {
    #[zeroize(skip)]
    epoch: Epoch,
    #[zeroize(skip)]
    threshold: usize,
    #[zeroize(skip)]
    committee: Committee,
    #[zeroize(skip)]
    mpk: G2,
    local_share: ScalarField,
    #[zeroize(skip)]
    public_shares: Vec<G2>,
    #[zeroize(skip)]
    activation_height: u64,
    #[zeroize(skip)]
    status: VersionStatus,
}

impl std::fmt::Debug for KeyShareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShareVersion")
            .field("epoch", &self.epoch)
            .field("threshold", &self.threshold)
            .field("committee_size", &self.committee.len())
            .field("activation_height", &self.activation_height)
            .field("status", &self.status)
            .field("local_share", &"<redacted>")
            .finish()
    }
}

impl KeyShareVersion {
    /// Constructs a freshly sealed version as `Pending`. `committee`,
    /// `public_shares` and the NodeId this node evaluated at must all be
    /// consistently ordered; callers (the DKG/reshare Seal step) are
    /// responsible for that invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new_pending(
        epoch: Epoch,
        threshold: usize,
        committee: Committee,
        mpk: G2,
        local_share: ScalarField,
        public_shares: Vec<G2>,
        activation_height: u64,
    ) -> Self {
        Self {
            epoch,
            threshold,
            committee,
            mpk,
            local_share,
            public_shares,
            activation_height,
            status: VersionStatus::Pending,
        }
    }

    /// This version's epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// This version's threshold `t`.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// This version's committee, in deterministic ascending-`NodeId` order.
    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    /// The master public key, invariant across reshares of this version's
    /// lineage.
    pub fn mpk(&self) -> G2 {
        self.mpk
    }

    /// This node's private share. Sensitive: callers must not log or
    /// persist this outside the key store.
    pub fn local_share(&self) -> ScalarField {
        self.local_share
    }

    /// The per-member public-share vector, aligned with [`Self::committee`].
    pub fn public_shares(&self) -> &[G2] {
        &self.public_shares
    }

    /// The block height at which this version activates (or activated).
    pub fn activation_height(&self) -> u64 {
        self.activation_height
    }

    /// This version's lifecycle status.
    pub fn status(&self) -> VersionStatus {
        self.status
    }

    /// Transitions this version from `Pending` to `Active`, recording the
    /// block height at which activation actually happened.
    pub fn activate(&mut self, activation_height: u64) {
        self.status = VersionStatus::Active;
        self.activation_height = activation_height;
    }

    /// Transitions this version from `Active` to `Retired`.
    pub fn retire(&mut self) {
        self.status = VersionStatus::Retired;
    }
}
