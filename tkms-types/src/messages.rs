//! Typed bodies of the inter-operator wire messages (§6), wrapped by
//! `tkms-transport`'s signed envelope before they go on the wire.

use serde::{Deserialize, Serialize};
use tkms_core::curve::G2;
use tkms_core::share_enc::EncryptedShare;

use crate::epoch::Epoch;
use crate::node::NodeId;

/// The protocol-phase tag carried in every envelope (§4.5), used by a
/// receiver to drop messages that don't match its state machine's current
/// expectation rather than queueing them across phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseTag {
    /// A [`DkgCommitment`] body.
    DkgCommitment,
    /// A [`DkgShare`] body.
    DkgShare,
    /// A [`DkgAck`] body.
    DkgAck,
    /// A [`ReshareCommitment`] body.
    ReshareCommitment,
    /// A [`ReshareShare`] body.
    ReshareShare,
    /// A [`ReshareAck`] body.
    ReshareAck,
    /// A [`ReshareComplete`] body.
    ReshareComplete,
}

/// A G2 commitment vector to a dealer's freshly sampled DKG polynomial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgCommitment {
    /// The epoch this DKG run will produce, if successful.
    pub epoch: Epoch,
    /// The dealer contributing this polynomial.
    pub dealer: NodeId,
    /// `[C_0 .. C_{t-1}]`, the G2 commitment to each coefficient.
    #[serde(
        serialize_with = "serialize_g2_vec",
        deserialize_with = "deserialize_g2_vec"
    )]
    pub commitments: Vec<G2>,
}

/// A dealer's encrypted evaluation of its DKG polynomial for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgShare {
    /// The epoch this DKG run will produce, if successful.
    pub epoch: Epoch,
    /// The dealer that produced this share.
    pub dealer: NodeId,
    /// The intended recipient.
    pub recipient: NodeId,
    /// The share, encrypted to `recipient`'s long-term encryption key.
    pub encrypted_share: EncryptedShare,
}

/// A player's signed acknowledgement that it accepted a dealer's share and
/// commitment, for use as equivocation evidence at the commitment anchor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DkgAck {
    /// The epoch this DKG run will produce, if successful.
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

/// A G2 commitment vector to a dealer's zero-polynomial contribution to a
/// reshare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshareCommitment {
    /// The epoch this reshare will produce, if successful.
    pub epoch: Epoch,
    /// The dealer contributing this zero-polynomial.
    pub dealer: NodeId,
    /// `[C_0 .. C_{t-1}]`, with `C_0` expected to be the G2 identity.
    #[serde(
        serialize_with = "serialize_g2_vec",
        deserialize_with = "deserialize_g2_vec"
    )]
    pub commitments: Vec<G2>,
}

/// A dealer's encrypted evaluation of its reshare zero-polynomial for one
/// recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshareShare {
    /// The epoch this reshare will produce, if successful.
    pub epoch: Epoch,
    /// The dealer that produced this share.
    pub dealer: NodeId,
    /// The intended recipient.
    pub recipient: NodeId,
    /// The share, encrypted to `recipient`'s long-term encryption key.
    pub encrypted_share: EncryptedShare,
}

/// A player's signed acknowledgement of a reshare dealer's zero-polynomial
/// share and commitment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReshareAck {
    /// The epoch this reshare will produce, if successful.
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

/// Signals that a reshare dealer reached a qualified set of acks and is
/// ready to have its contribution counted toward the new version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReshareComplete {
    /// The epoch this reshare will produce, if successful.
    pub epoch: Epoch,
}

fn serialize_g2_vec<S>(points: &[G2], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq as _;
    let mut seq = serializer.serialize_seq(Some(points.len()))?;
    for point in points {
        let bytes = tkms_core::curve::serialize_g2_compressed(point);
        seq.serialize_element(&bytes)?;
    }
    seq.end()
}

fn deserialize_g2_vec<'de, D>(deserializer: D) -> Result<Vec<G2>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let encoded: Vec<Vec<u8>> = Deserialize::deserialize(deserializer)?;
    encoded
        .into_iter()
        .map(|bytes| {
            tkms_core::curve::deserialize_g2_compressed(&bytes)
                .map_err(|e| serde::de::Error::custom(e.to_string()))
        })
        .collect()
}
