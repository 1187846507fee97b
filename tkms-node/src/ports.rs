//! Ports supplied by collaborators (§6): the block source, the peering
//! source, the attestation verifier. A concrete node wires these to a real
//! chain client, a registry contract and an attestation service; tests wire
//! in-memory fixtures instead.

use async_trait::async_trait;
use tkms_transport::signer::PublicKey;
use tkms_types::epoch::Epoch;
use tkms_types::node::Address;

/// One finalised block as delivered by the block source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// The block's height.
    pub number: u64,
    /// The block's timestamp, in seconds since the Unix epoch.
    pub timestamp: i64,
    /// The block's hash.
    pub hash: [u8; 32],
}

/// Yields a monotonic stream of finalised blocks. The scheduler (C9) reads
/// this to decide when to trigger DKG or reshare (§4.9).
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Waits for and returns the next finalised block. A gap in block
    /// numbers is legal: the scheduler only ever acts on the latest block
    /// it is given (§4.9's catch-up rule), never retroactively on skipped
    /// boundaries.
    async fn next_block(&self) -> eyre::Result<Block>;
}

/// One committee member, as resolved by the peering source: the address
/// that authenticates its transport messages, the socket it is reachable
/// at, and its long-term signing public key.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// The member's operator address.
    pub address: Address,
    /// The socket address it can be reached at.
    pub socket: std::net::SocketAddr,
    /// The member's long-term signing public key.
    pub public_key: PublicKey,
}

/// Resolves the committee for a given epoch. Backed by an external
/// registry or configuration source; the core never hardcodes committee
/// membership.
#[async_trait]
pub trait PeeringSource: Send + Sync {
    /// Returns the ordered committee for `epoch`, or `None` if the epoch is
    /// not yet known to the peering source.
    async fn committee_for_epoch(&self, epoch: Epoch) -> eyre::Result<Option<Vec<PeerInfo>>>;
}

/// Verifies an application's attestation against expected claims, for the
/// `RetrieveSecrets` operation (§6). An external collaborator: the core
/// treats attestation schemes as opaque.
#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    /// Verifies `blob` under `method`, checking it against
    /// `expected_claims` (opaque, method-specific bytes). Returns `Ok(())`
    /// if the attestation is accepted.
    async fn verify(
        &self,
        method: &str,
        blob: &[u8],
        expected_claims: &[u8],
    ) -> eyre::Result<Result<(), AttestationRejected>>;
}

/// The attestation failed verification.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("attestation rejected")]
pub struct AttestationRejected;
