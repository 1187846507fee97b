//! The commitment anchor (C8): after a successful DKG or reshare, every
//! operator submits a compact, independently-verifiable summary of what it
//! saw to an external registry, and equivocation is adjudicated from two
//! conflicting signed acks plus their Merkle inclusion paths.

use async_trait::async_trait;
use tkms_types::epoch::Epoch;
use tkms_types::node::NodeId;

/// One accepted ack tuple, as used both for equivocation evidence and as a
/// Merkle tree leaf. Mirrors the `(epoch, dealer, player, share_hash,
/// commitment_hash)` shape of `DkgAck`/`ReshareAck` without depending on the
/// wire envelope's phase tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRecord {
    /// The epoch this ack belongs to.
    pub epoch: Epoch,
    /// The dealer being acknowledged.
    pub dealer: NodeId,
    /// The acknowledging player.
    pub player: NodeId,
    /// Hash of the decrypted share the player verified.
    pub share_hash: [u8; 32],
    /// Hash of the commitment vector the player verified against.
    pub commitment_hash: [u8; 32],
}

impl AckRecord {
    fn leaf_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"TKMS-ANCHOR-ACK-LEAF-v1");
        hasher.update(&self.epoch.into_inner().to_be_bytes());
        hasher.update(&tkms_core::curve::scalar_to_be_bytes(&self.dealer.scalar()));
        hasher.update(&tkms_core::curve::scalar_to_be_bytes(&self.player.scalar()));
        hasher.update(&self.share_hash);
        hasher.update(&self.commitment_hash);
        *hasher.finalize().as_bytes()
    }
}

fn parent_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"TKMS-ANCHOR-MERKLE-NODE-v1");
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

/// Computes the canonical commitment-set hash for a qualified dealer set:
/// a hash of each dealer's commitment vector, in ascending-`NodeId` dealer
/// order so every honest node derives the same value.
pub fn commitment_set_hash(epoch: Epoch, mut commitments: Vec<(NodeId, Vec<tkms_core::curve::G2>)>) -> [u8; 32] {
    commitments.sort_by_key(|(dealer, _)| *dealer);
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"TKMS-ANCHOR-COMMITMENT-SET-v1");
    hasher.update(&epoch.into_inner().to_be_bytes());
    for (dealer, commitment) in &commitments {
        hasher.update(&tkms_core::curve::scalar_to_be_bytes(&dealer.scalar()));
        for point in commitment {
            hasher.update(&tkms_core::curve::serialize_g2_compressed(point));
        }
    }
    *hasher.finalize().as_bytes()
}

/// A Merkle tree over accepted ack tuples, sorted by `(dealer, player)`.
pub struct AckMerkleTree {
    leaves: Vec<[u8; 32]>,
    levels: Vec<Vec<[u8; 32]>>,
}

impl AckMerkleTree {
    /// Builds the tree over `acks`, canonically sorted by `(dealer, player)`.
    pub fn build(mut acks: Vec<AckRecord>) -> Self {
        acks.sort_by(|a, b| (a.dealer, a.player).cmp(&(b.dealer, b.player)));
        let leaves: Vec<[u8; 32]> = acks.iter().map(AckRecord::leaf_hash).collect();
        let mut levels = vec![leaves.clone()];
        let mut current = leaves.clone();
        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let hash = match pair {
                    [left, right] => parent_hash(left, right),
                    [only] => parent_hash(only, only),
                    _ => unreachable!(),
                };
                next.push(hash);
            }
            levels.push(next.clone());
            current = next;
        }
        Self { leaves, levels }
    }

    /// The tree's root. A single-leaf or empty tree's root is defined as
    /// the hash of an empty leaf set, distinguishable from any real ack.
    pub fn root(&self) -> [u8; 32] {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_else(|| *blake3::hash(b"TKMS-ANCHOR-EMPTY-TREE-v1").as_bytes())
    }

    /// The sibling-hash path from leaf `index` up to the root, for
    /// constructing an equivocation proof.
    pub fn path(&self, mut index: usize) -> Option<Vec<[u8; 32]>> {
        if index >= self.leaves.len() {
            return None;
        }
        let mut path = Vec::new();
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling_idx = if index % 2 == 0 { index + 1 } else { index - 1 };
            let sibling = level.get(sibling_idx).copied().unwrap_or(level[index]);
            path.push(sibling);
            index /= 2;
        }
        Some(path)
    }
}

/// Verifies that `leaf` is included under `root` via `path`, reconstructing
/// parent hashes from `leaf_index`'s bit pattern.
fn verify_path(leaf: [u8; 32], mut leaf_index: usize, path: &[[u8; 32]], root: [u8; 32]) -> bool {
    let mut current = leaf;
    for sibling in path {
        current = if leaf_index % 2 == 0 {
            parent_hash(&current, sibling)
        } else {
            parent_hash(sibling, &current)
        };
        leaf_index /= 2;
    }
    current == root
}

/// Two ack tuples proving the same dealer equivocated for the same
/// `(epoch, dealer, player)`: distinct `commitment_hash` values, each
/// included under its submitter's advertised Merkle root.
#[derive(Debug, Clone)]
pub struct EquivocationProof {
    /// The first conflicting ack.
    pub ack_a: AckRecord,
    /// `ack_a`'s Merkle inclusion path under `root_a`.
    pub path_a: Vec<[u8; 32]>,
    /// `ack_a`'s leaf index under `root_a`.
    pub index_a: usize,
    /// The Merkle root `ack_a` was anchored under.
    pub root_a: [u8; 32],
    /// The second conflicting ack.
    pub ack_b: AckRecord,
    /// `ack_b`'s Merkle inclusion path under `root_b`.
    pub path_b: Vec<[u8; 32]>,
    /// `ack_b`'s leaf index under `root_b`.
    pub index_b: usize,
    /// The Merkle root `ack_b` was anchored under.
    pub root_b: [u8; 32],
}

/// Checks that `proof` demonstrates the dealer named in its acks sent two
/// distinct commitment vectors for the same `(epoch, dealer, player)`.
pub fn verify_equivocation(proof: &EquivocationProof) -> bool {
    let same_subject = proof.ack_a.epoch == proof.ack_b.epoch
        && proof.ack_a.dealer == proof.ack_b.dealer
        && proof.ack_a.player == proof.ack_b.player;
    let differing_commitments = proof.ack_a.commitment_hash != proof.ack_b.commitment_hash;
    let a_included = verify_path(proof.ack_a.leaf_hash(), proof.index_a, &proof.path_a, proof.root_a);
    let b_included = verify_path(proof.ack_b.leaf_hash(), proof.index_b, &proof.path_b, proof.root_b);
    same_subject && differing_commitments && a_included && b_included
}

/// A submitted anchor record, as returned by [`CommitmentRegistry::get`].
#[derive(Debug, Clone, Copy)]
pub struct AnchorRecord {
    /// The canonical hash of the qualified dealer set's commitment vectors.
    pub commitment_hash: [u8; 32],
    /// The root of the Merkle tree over accepted ack tuples.
    pub ack_merkle_root: [u8; 32],
    /// When the submitter recorded this anchor, as a Unix timestamp.
    pub submitted_at: i64,
}

/// The external commitment registry, addressed only by an opaque handle
/// (§4.8). Best-effort durability; the core treats it as a collaborator.
#[async_trait]
pub trait CommitmentRegistry: Send + Sync {
    /// Submits this operator's anchor record for `epoch`.
    async fn submit(
        &self,
        epoch: Epoch,
        commitment_hash: [u8; 32],
        ack_merkle_root: [u8; 32],
    ) -> eyre::Result<()>;

    /// Retrieves the anchor record a given operator submitted for `epoch`,
    /// if any.
    async fn get(
        &self,
        epoch: Epoch,
        operator: NodeId,
    ) -> eyre::Result<Option<AnchorRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(epoch: u64, dealer: u8, player: u8, commitment_hash: [u8; 32]) -> AckRecord {
        AckRecord {
            epoch: Epoch::new(epoch),
            dealer: NodeId::from_address(tkms_types::node::Address([dealer; 20])),
            player: NodeId::from_address(tkms_types::node::Address([player; 20])),
            share_hash: [0u8; 32],
            commitment_hash,
        }
    }

    #[test]
    fn merkle_path_verifies_against_root() {
        let acks = vec![
            ack(1, 1, 2, [1u8; 32]),
            ack(1, 1, 3, [2u8; 32]),
            ack(1, 1, 4, [3u8; 32]),
        ];
        let tree = AckMerkleTree::build(acks.clone());
        let root = tree.root();
        let mut sorted = acks.clone();
        sorted.sort_by(|a, b| (a.dealer, a.player).cmp(&(b.dealer, b.player)));
        for (i, a) in sorted.iter().enumerate() {
            let path = tree.path(i).unwrap();
            assert!(verify_path(a.leaf_hash(), i, &path, root));
        }
    }

    #[test]
    fn equivocation_proof_detects_conflicting_commitment_hashes() {
        let dealer_commitment_a = ack(5, 7, 1, [9u8; 32]);
        let dealer_commitment_b = ack(5, 7, 2, [8u8; 32]);
        let tree_a = AckMerkleTree::build(vec![dealer_commitment_a]);
        let tree_b = AckMerkleTree::build(vec![dealer_commitment_b]);

        let proof = EquivocationProof {
            ack_a: dealer_commitment_a,
            path_a: tree_a.path(0).unwrap(),
            index_a: 0,
            root_a: tree_a.root(),
            ack_b: dealer_commitment_b,
            path_b: tree_b.path(0).unwrap(),
            index_b: 0,
            root_b: tree_b.root(),
        };
        assert!(verify_equivocation(&proof));
    }

    #[test]
    fn matching_commitment_hashes_are_not_equivocation() {
        let a = ack(5, 7, 1, [9u8; 32]);
        let b = ack(5, 7, 1, [9u8; 32]);
        let tree_a = AckMerkleTree::build(vec![a]);
        let tree_b = AckMerkleTree::build(vec![b]);
        let proof = EquivocationProof {
            ack_a: a,
            path_a: tree_a.path(0).unwrap(),
            index_a: 0,
            root_a: tree_a.root(),
            ack_b: b,
            path_b: tree_b.path(0).unwrap(),
            index_b: 0,
            root_b: tree_b.root(),
        };
        assert!(!verify_equivocation(&proof));
    }
}
