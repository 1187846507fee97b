//! In-memory fixtures for driving `tkms-node` scenarios without real chain
//! or network infrastructure: a scripted block source, an in-memory peer
//! transport, fixed peering/attestation doubles, and deterministic
//! committee construction.

pub mod block_source;
pub mod commitment_registry;
pub mod committee;
pub mod peer_transport;
pub mod peering_source;

pub use block_source::ScriptedBlockSource;
pub use commitment_registry::{InMemoryCommitmentRegistry, SharedAnchorStore};
pub use committee::deterministic_committee;
pub use peer_transport::{InMemoryNetwork, InMemoryTransport};
pub use peering_source::{AlwaysAcceptVerifier, AlwaysRejectVerifier, FixedPeeringSource};
