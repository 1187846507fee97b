//! Configuration for a key-management node.
//!
//! Construction from environment variables or config files is left to the
//! embedding process: CLI/environment parsing is explicitly out of scope
//! here, so this struct uses a plain `serde::Deserialize` derive rather than
//! a `clap` one.

use std::time::Duration;

use serde::Deserialize;
use tkms_types::node::NodeId;

/// The configuration a key-management node's core needs as parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// This node's evaluation point within its committee.
    pub node_id: NodeId,

    /// The size of the committee this node expects to run DKG/reshare
    /// with. Used to derive the default threshold `t = ceil(2n/3)`; callers
    /// assembling a committee from the peering source must still reject a
    /// mismatched size.
    pub committee_size: usize,

    /// The block-boundary constant `R`: DKG/reshare triggers fire when the
    /// current block number is congruent to 0 modulo this value.
    pub block_boundary: u64,

    /// The wall-clock deadline for a single protocol instance. Must be
    /// strictly less than one block interval times `R`, so an instance
    /// always times out before the next boundary could plausibly start a
    /// competing one.
    pub protocol_timeout: Duration,

    /// Retired versions older than this window are dropped by
    /// `KeyStore::gc`. Defaults are the embedding process's concern; this
    /// struct only carries the value through.
    pub retired_version_retention: Duration,

    /// The maximum serialised envelope payload accepted from the transport.
    /// Carried through to `instance::DkgInstanceArgs::max_message_size` and
    /// `instance::ReshareInstanceArgs::max_message_size`, which
    /// `envelope::open` checks against a peer's claimed length prefix before
    /// trusting it, guarding against a misbehaving or malicious peer forcing
    /// unbounded allocation.
    pub max_message_size: usize,
}
