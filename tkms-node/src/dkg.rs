//! The DKG state machine (C6): establishes a fresh shared secret across the
//! committee without any single dealer ever learning it.
//!
//! This module is the pure, deterministic core of the protocol: sampling a
//! dealer's polynomial, producing per-player encrypted shares, verifying a
//! received share, qualifying dealers by ack count, and sealing the final
//! version. The async orchestration that exchanges these messages over
//! `tkms-transport` lives in [`crate::instance`].

use std::collections::HashMap;

use rand::{CryptoRng, Rng};
use tkms_core::curve::{G2, ScalarField};
use tkms_core::poly::{self, FeldmanPoly};
use tkms_core::share_enc::{self, EncryptedShare, EncryptionKeypair};
use tkms_types::epoch::Epoch;
use tkms_types::node::NodeId;
use tkms_types::version::{Committee, KeyShareVersion};

use crate::anchor::AckRecord;
use crate::error::ProtocolError;

/// A dealer role's position in the per-dealer state machine (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealerState {
    /// Not yet dealing.
    Idle,
    /// Sampling and broadcasting its polynomial's commitments and shares.
    Dealing,
    /// Waiting to collect a qualified ack set.
    AwaitingAcks,
    /// Reached `>= threshold` acks; its contribution counts toward D*.
    Finalised,
    /// Dropped from D* (could not reach threshold acks before timeout).
    Aborted,
}

/// A player role's position in the per-player state machine (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Not yet processing any dealer's contribution.
    Idle,
    /// Collecting dealers' commitments and encrypted shares.
    Receiving,
    /// Decrypted and verified at least one dealer's share.
    Verified,
    /// Returned a signed ack to the dealer.
    Acked,
    /// Computed its final private share from the qualified dealer set.
    Sealed,
    /// Gave up on this DKG round (e.g. too few dealers reached Finalised).
    Aborted,
}

/// One dealer's contribution: its sampled polynomial (held only by the
/// dealer) and the G2 commitment vector broadcast to every player.
pub struct DealerContribution {
    /// The dealer's freshly sampled polynomial, zeroized on drop.
    pub polynomial: FeldmanPoly,
    /// `[C_0 .. C_{t-1}]`, broadcast to all players.
    pub commitments: Vec<G2>,
}

/// Samples a fresh degree-`(threshold - 1)` polynomial with a uniformly
/// random constant term, for a dealer's DKG contribution (§4.6 step 1).
pub fn deal<R: Rng + CryptoRng>(rng: &mut R, threshold: usize) -> DealerContribution {
    let polynomial = FeldmanPoly::sample(rng, threshold - 1);
    let commitments = polynomial.commit_g2();
    DealerContribution {
        polynomial,
        commitments,
    }
}

/// Builds the additional authenticated data binding a share ciphertext to
/// its `(epoch, dealer, recipient, commitment_hash)` context, so a share
/// cannot be replayed against a different round or a different commitment
/// vector even if the AES-GCM key were ever reused.
fn share_aad(epoch: Epoch, dealer: NodeId, recipient: NodeId, commitments: &[G2]) -> Vec<u8> {
    let mut aad = Vec::new();
    aad.extend_from_slice(&epoch.into_inner().to_be_bytes());
    aad.extend_from_slice(&tkms_core::curve::scalar_to_be_bytes(&dealer.scalar()));
    aad.extend_from_slice(&tkms_core::curve::scalar_to_be_bytes(&recipient.scalar()));
    aad.extend_from_slice(&commitment_hash(commitments));
    aad
}

/// Encrypts the dealer's evaluation of its polynomial at each committee
/// member's NodeId, for delivery over the transport as `DkgShare` bodies.
pub fn encrypt_shares_for_committee(
    epoch: Epoch,
    dealer: NodeId,
    polynomial: &FeldmanPoly,
    commitments: &[G2],
    committee: &Committee,
    dealer_enc_keypair: &EncryptionKeypair,
    recipient_enc_pubkeys: &HashMap<NodeId, tkms_core::curve::G1>,
) -> HashMap<NodeId, EncryptedShare> {
    committee
        .iter()
        .filter_map(|&recipient| {
            let recipient_pk = recipient_enc_pubkeys.get(&recipient)?;
            let share = polynomial.evaluate_at(recipient.scalar());
            let nonce = share_enc::derive_nonce(
                epoch.into_inner(),
                &tkms_core::curve::scalar_to_be_bytes(&dealer.scalar()),
                &tkms_core::curve::scalar_to_be_bytes(&recipient.scalar()),
            );
            let aad = share_aad(epoch, dealer, recipient, commitments);
            let encrypted = share_enc::encrypt_share(dealer_enc_keypair, *recipient_pk, nonce, share, &aad);
            Some((recipient, encrypted))
        })
        .collect()
}

/// A dealer's contribution as verified (or rejected) by one player. If the
/// share fails to decrypt or fails Feldman verification, the dealer is
/// `disqualified` from this player's perspective (§4.6 step 2): the player
/// simply withholds its ack, it does not distinguish a forged ciphertext
/// from a bad polynomial evaluation (§10.6).
pub fn verify_and_decrypt_share(
    player_enc_keypair: &EncryptionKeypair,
    dealer_enc_pubkey: tkms_core::curve::G1,
    epoch: Epoch,
    dealer: NodeId,
    player: NodeId,
    encrypted_share: &EncryptedShare,
    commitments: &[G2],
) -> Result<ScalarField, ProtocolError> {
    let aad = share_aad(epoch, dealer, player, commitments);
    let share = share_enc::decrypt_share(player_enc_keypair, dealer_enc_pubkey, encrypted_share, &aad)
        .ok_or(ProtocolError::ShareVerificationFailed { dealer })?;

    if !poly::verify_share(player.scalar(), share, commitments) {
        return Err(ProtocolError::ShareVerificationFailed { dealer });
    }
    Ok(share)
}

/// Hashes a decrypted share, for inclusion in this player's ack tuple.
pub fn share_hash(share: ScalarField) -> [u8; 32] {
    *blake3::hash(&tkms_core::curve::scalar_to_be_bytes(&share)).as_bytes()
}

/// Hashes a commitment vector, for inclusion in this player's ack tuple.
pub fn commitment_hash(commitments: &[G2]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"TKMS-DKG-COMMITMENT-HASH-v1");
    for c in commitments {
        hasher.update(&tkms_core::curve::serialize_g2_compressed(c));
    }
    *hasher.finalize().as_bytes()
}

/// Produces the ack tuple a player returns to a dealer whose share it
/// accepted (§4.6 step 3). The transport layer signs this when it wraps it
/// in an envelope; this function only computes the tuple's content.
pub fn make_ack(
    epoch: Epoch,
    dealer: NodeId,
    player: NodeId,
    share: ScalarField,
    commitments: &[G2],
) -> AckRecord {
    AckRecord {
        epoch,
        dealer,
        player,
        share_hash: share_hash(share),
        commitment_hash: commitment_hash(commitments),
    }
}

/// Determines the qualified dealer set D*: dealers with acks from at least
/// `threshold` distinct players, all agreeing on the same `commitment_hash`
/// (a dealer with disagreeing acks has equivocated and is excluded, its
/// evidence handed to [`crate::anchor`]). A (t+1)-th ack for an
/// already-qualifying dealer is simply ignored (§8 boundary behaviour).
pub fn qualify_dealers(
    acks_by_dealer: &HashMap<NodeId, Vec<AckRecord>>,
    threshold: usize,
) -> Vec<NodeId> {
    let mut qualified: Vec<NodeId> = acks_by_dealer
        .iter()
        .filter_map(|(&dealer, acks)| {
            let mut by_player: HashMap<NodeId, [u8; 32]> = HashMap::new();
            for ack in acks {
                by_player.insert(ack.player, ack.commitment_hash);
            }
            let distinct_hashes: std::collections::HashSet<_> = by_player.values().collect();
            if distinct_hashes.len() > 1 {
                return None;
            }
            (by_player.len() >= threshold).then_some(dealer)
        })
        .collect();
    qualified.sort();
    qualified
}

/// Seals the final version from the qualified dealer set D* (§4.6 step 5).
/// `per_dealer` must contain, for every dealer in `qualified`, its
/// commitment vector and the local share this node decrypted from it.
#[allow(clippy::too_many_arguments)]
pub fn seal(
    epoch: Epoch,
    threshold: usize,
    committee: Committee,
    qualified: &[NodeId],
    per_dealer: &HashMap<NodeId, (Vec<G2>, ScalarField)>,
    my_node_id: NodeId,
    activation_height: u64,
) -> Result<KeyShareVersion, ProtocolError> {
    if qualified.len() < threshold {
        return Err(ProtocolError::InsufficientDealers {
            needed: threshold,
            got: qualified.len(),
        });
    }

    let mut local_share = ScalarField::from(0u64);
    let mut mpk = G2::zero();
    use ark_ff::Zero;
    for &dealer in qualified {
        let (commitments, share) = per_dealer
            .get(&dealer)
            .expect("qualified dealer must have a recorded contribution");
        local_share += share;
        mpk += commitments[0];
    }

    let public_shares: Vec<G2> = committee
        .iter()
        .map(|member| {
            qualified.iter().fold(G2::zero(), |acc, dealer| {
                let (commitments, _) = &per_dealer[dealer];
                acc + poly::evaluate_commitment(member.scalar(), commitments)
            })
        })
        .collect();

    Ok(KeyShareVersion::new_pending(
        epoch,
        threshold,
        committee,
        mpk,
        local_share,
        public_shares,
        activation_height,
    ))
}
