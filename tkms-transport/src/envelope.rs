//! The signed envelope every protocol message travels inside (§4.5), and
//! the literal wire framing from §6:
//! `[u32 payload_len | payload | 32-byte hash | variable-length signature]`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tkms_types::epoch::Epoch;
use tkms_types::messages::PhaseTag;
use tkms_types::node::Address;

use crate::signer::{LongTermSigner, PublicKey, Signature, verify};

/// Everything an envelope authenticates: who sent it, who it's for, which
/// epoch and protocol phase it belongs to, a round-nonce for replay
/// protection, and the typed body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopePayload<Body> {
    /// The sender's address.
    pub sender: Address,
    /// The intended recipient's address.
    pub recipient: Address,
    /// The epoch this message belongs to.
    pub epoch: Epoch,
    /// The protocol phase this message's body corresponds to.
    pub phase: PhaseTag,
    /// A per-round nonce; non-replayable within `(epoch, round_nonce)`.
    pub round_nonce: u64,
    /// The typed message body.
    pub body: Body,
}

/// Errors the receiver contract (§4.5) can reject an inbound envelope with.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The wire framing itself was malformed (bad length prefix, truncated
    /// hash/signature, or a payload that didn't deserialize).
    #[error("malformed envelope: {0}")]
    BadSerialisation(String),
    /// The sender address does not resolve against the referenced epoch's
    /// committee.
    #[error("unknown sender")]
    UnknownSender,
    /// The signature does not verify under the sender's resolved key.
    #[error("bad signature")]
    BadSignature,
    /// The envelope's recipient is not this node.
    #[error("misdirected envelope")]
    Misdirected,
    /// The envelope's phase tag does not match the receiver's current
    /// state-machine expectation; dropped without state change.
    #[error("out of phase")]
    OutOfPhase,
    /// The claimed payload length exceeds the caller's configured bound;
    /// rejected before any buffer sized by it is trusted.
    #[error("payload of {payload_len} bytes exceeds the {max_size}-byte limit")]
    PayloadTooLarge {
        /// The length prefix the sender claimed.
        payload_len: usize,
        /// The caller-supplied bound it was checked against.
        max_size: usize,
    },
}

/// A sealed (signed, framed) envelope ready to go on the wire.
pub struct Envelope {
    payload_bytes: Vec<u8>,
    hash: [u8; 32],
    signature: Signature,
}

impl Envelope {
    /// Serialises `body` into an [`EnvelopePayload`] addressed to
    /// `recipient`, hashes it, and signs the hash with `signer`.
    pub fn seal<Body: Serialize>(
        signer: &dyn LongTermSigner,
        recipient: Address,
        epoch: Epoch,
        phase: PhaseTag,
        round_nonce: u64,
        body: Body,
    ) -> Self {
        let payload = EnvelopePayload {
            sender: signer.address(),
            recipient,
            epoch,
            phase,
            round_nonce,
            body,
        };
        let payload_bytes =
            serde_json::to_vec(&payload).expect("envelope payload is always serialisable");
        let hash = *blake3::hash(&payload_bytes).as_bytes();
        let signature = signer.sign(&hash);
        Self {
            payload_bytes,
            hash,
            signature,
        }
    }

    /// Encodes this envelope in the literal wire layout: `[u32 payload_len |
    /// payload | 32-byte hash | variable-length signature]`, all integers
    /// big-endian.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.payload_bytes.len() + 32 + self.signature.0.len());
        out.extend_from_slice(&(self.payload_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload_bytes);
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&self.signature.0);
        out
    }
}

/// Parses and validates an inbound envelope against the receiver contract
/// of §4.5, in order: resolve the sender, recompute and verify the
/// signature, check the recipient address, check the phase tag.
///
/// `resolve_sender` resolves an address against the current committee for
/// the envelope's referenced epoch; it returns `None` for an unrecognised
/// sender. `max_size` bounds the claimed payload length, checked before any
/// buffer sized by it is trusted, so a misbehaving or malicious peer cannot
/// use the length prefix to force unbounded allocation.
pub fn open<Body, F>(
    wire_bytes: &[u8],
    self_address: Address,
    expected_phase: PhaseTag,
    max_size: usize,
    resolve_sender: F,
) -> Result<EnvelopePayload<Body>, TransportError>
where
    Body: DeserializeOwned,
    F: FnOnce(Address) -> Option<PublicKey>,
{
    if wire_bytes.len() < 4 {
        return Err(TransportError::BadSerialisation("truncated length prefix".into()));
    }
    let payload_len = u32::from_be_bytes(wire_bytes[0..4].try_into().unwrap()) as usize;
    if payload_len > max_size {
        return Err(TransportError::PayloadTooLarge { payload_len, max_size });
    }
    let rest = &wire_bytes[4..];
    if rest.len() < payload_len + 32 {
        return Err(TransportError::BadSerialisation("truncated payload or hash".into()));
    }
    let payload_bytes = &rest[..payload_len];
    let claimed_hash = &rest[payload_len..payload_len + 32];
    let signature_bytes = &rest[payload_len + 32..];

    let recomputed_hash = *blake3::hash(payload_bytes).as_bytes();
    if recomputed_hash.as_slice() != claimed_hash {
        return Err(TransportError::BadSerialisation("hash mismatch".into()));
    }

    let payload: EnvelopePayload<Body> = serde_json::from_slice(payload_bytes)
        .map_err(|e| TransportError::BadSerialisation(e.to_string()))?;

    let sender_key = resolve_sender(payload.sender).ok_or(TransportError::UnknownSender)?;

    let signature = Signature(
        signature_bytes
            .try_into()
            .map_err(|_| TransportError::BadSerialisation("bad signature length".into()))?,
    );
    if !verify(sender_key, &recomputed_hash, &signature) {
        return Err(TransportError::BadSignature);
    }

    if payload.recipient != self_address {
        return Err(TransportError::Misdirected);
    }
    if payload.phase != expected_phase {
        return Err(TransportError::OutOfPhase);
    }

    Ok(payload)
}
