//! The peering port: raw byte delivery between operators. A concrete
//! transport (TCP, QUIC, an in-memory fixture for tests) implements this;
//! everything above it only ever sees sealed, framed envelope bytes.

use async_trait::async_trait;
use tkms_types::node::Address;

/// Errors a concrete [`PeerTransport`] implementation can surface. These are
/// distinct from [`crate::envelope::TransportError`]: this is "I couldn't
/// deliver/receive bytes", that is "I received bytes but rejected them".
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// No route is known to the given address.
    #[error("no route to operator {0}")]
    Unreachable(Address),
    /// The underlying link failed (connection reset, write error, etc).
    #[error("link failure: {0}")]
    LinkFailure(String),
}

/// Sends and receives sealed envelope bytes between this operator and its
/// committee peers. A single instance is shared across all concurrently
/// running protocol instances (§5): routing is keyed by recipient address,
/// not by any particular DKG or reshare round.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Sends `wire_bytes` (an [`crate::envelope::Envelope::to_wire_bytes`]
    /// encoding) to `recipient`. Delivery is best-effort: callers that need
    /// a reply (e.g. an ack) wait for it to arrive via
    /// [`PeerTransport::recv`] rather than treating `send` as confirming
    /// receipt.
    async fn send(&self, recipient: Address, wire_bytes: Vec<u8>) -> Result<(), PeerError>;

    /// Waits for the next inbound envelope addressed to this operator,
    /// returning its raw wire bytes for [`crate::envelope::open`] to
    /// validate.
    async fn recv(&self) -> Result<Vec<u8>, PeerError>;
}
