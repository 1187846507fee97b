//! Async orchestration for a single DKG or reshare protocol instance
//! (§4.6/§4.7/§5): drives the pure [`crate::dkg`]/[`crate::reshare`] state
//! machines by exchanging signed envelopes over a [`PeerTransport`], under a
//! wall-clock deadline and a cancellation token.
//!
//! This is the layer that actually moves [`crate::dkg::DealerState`] and
//! [`crate::dkg::PlayerState`] forward, tracked per instance in
//! [`RoundState`]; the state machine modules themselves stay pure and
//! synchronous so they can be unit-tested without any transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use tkms_core::curve::{G1, G2, ScalarField};
use tkms_core::share_enc::{EncryptedShare, EncryptionKeypair};
use tkms_transport::envelope::{self, Envelope};
use tkms_transport::peer::PeerTransport;
use tkms_transport::signer::{LongTermSigner, PublicKey};
use tkms_types::epoch::Epoch;
use tkms_types::messages::{DkgAck, DkgCommitment, DkgShare, PhaseTag, ReshareAck, ReshareCommitment, ReshareShare};
use tkms_types::node::{Address, NodeId};
use tkms_types::version::{Committee, KeyShareVersion};
use tokio_util::sync::CancellationToken;

use crate::anchor::AckRecord;
use crate::dkg;
use crate::error::ProtocolError;
use crate::reshare;

/// Everything a DKG instance needs to run: identity, the round's committee,
/// every peer's resolved address/signing key/encryption key, and the
/// collaborators it drives messages through.
pub struct DkgInstanceArgs {
    /// This node's long-term signer.
    pub signer: Arc<dyn LongTermSigner>,
    /// This node's share-encryption keypair.
    pub enc_keypair: EncryptionKeypair,
    /// This node's identity within the committee.
    pub my_node_id: NodeId,
    /// The epoch this DKG run will produce, if successful.
    pub epoch: Epoch,
    /// The committee running this round.
    pub committee: Committee,
    /// The minimum number of qualified dealers required.
    pub threshold: usize,
    /// NodeId -> transport address, for the committee.
    pub addresses: HashMap<NodeId, Address>,
    /// NodeId -> long-term signing public key, for the committee. Used to
    /// authenticate inbound envelopes against the receiver contract.
    pub signing_pubkeys: HashMap<NodeId, PublicKey>,
    /// NodeId -> share-encryption public key, for the committee.
    pub enc_pubkeys: HashMap<NodeId, G1>,
    /// The peer transport messages are exchanged over.
    pub transport: Arc<dyn PeerTransport>,
    /// The maximum serialised envelope payload accepted from the transport,
    /// checked by [`envelope::open`] before any buffer sized by a peer's
    /// claimed length prefix is trusted.
    pub max_message_size: usize,
    /// The block height the resulting version activates at.
    pub activation_height: u64,
    /// This instance's wall-clock deadline.
    pub timeout: Duration,
    /// Cancelled if the embedding node is shutting down or the scheduler's
    /// single-flight guard has moved on to a later boundary.
    pub cancellation_token: CancellationToken,
}

fn resolve_sender(args: &DkgInstanceArgs, address: Address) -> Option<PublicKey> {
    let node_id = args.addresses.iter().find(|&(_, &a)| a == address).map(|(&id, _)| id)?;
    args.signing_pubkeys.get(&node_id).copied()
}

/// Runs a full DKG round to completion: deals this node's own contribution,
/// exchanges commitments/shares/acks with every other committee member over
/// `args.transport`, and seals this node's [`KeyShareVersion`] from the
/// qualified dealer set. Every other honest committee member runs the same
/// logic concurrently and converges on the same qualified set and MPK.
#[tracing::instrument(skip_all, fields(epoch = ?args.epoch, node = ?args.my_node_id))]
pub async fn run_dkg_instance(args: DkgInstanceArgs) -> Result<KeyShareVersion, ProtocolError> {
    let deadline = tokio::time::Instant::now() + args.timeout;
    tokio::select! {
        result = run_dkg_instance_inner(&args) => result,
        _ = tokio::time::sleep_until(deadline) => Err(ProtocolError::Timeout),
        _ = args.cancellation_token.cancelled() => Err(ProtocolError::Cancelled),
    }
}

struct RoundState {
    commitments_by_dealer: HashMap<NodeId, Vec<G2>>,
    per_dealer: HashMap<NodeId, (Vec<G2>, ScalarField)>,
    acks_by_dealer: HashMap<NodeId, Vec<AckRecord>>,
    /// This node's own position as a dealer (it deals exactly one
    /// contribution per round, so one state suffices).
    dealer_state: dkg::DealerState,
    /// This node's own position as a player, advanced as it processes the
    /// first, and every subsequent, dealer's contribution.
    player_state: dkg::PlayerState,
}

fn move_dealer_state(state: &mut RoundState, next: dkg::DealerState) {
    tracing::debug!(from = ?state.dealer_state, to = ?next, "dealer state transition");
    state.dealer_state = next;
}

fn move_player_state(state: &mut RoundState, next: dkg::PlayerState) {
    if state.player_state == next {
        return;
    }
    tracing::debug!(from = ?state.player_state, to = ?next, "player state transition");
    state.player_state = next;
}

async fn run_dkg_instance_inner(args: &DkgInstanceArgs) -> Result<KeyShareVersion, ProtocolError> {
    let mut rng = OsRng;
    let own_contribution = dkg::deal(&mut rng, args.threshold);

    let mut state = RoundState {
        commitments_by_dealer: HashMap::new(),
        per_dealer: HashMap::new(),
        acks_by_dealer: args.committee.iter().map(|&d| (d, Vec::new())).collect(),
        dealer_state: dkg::DealerState::Idle,
        player_state: dkg::PlayerState::Idle,
    };
    state
        .commitments_by_dealer
        .insert(args.my_node_id, own_contribution.commitments.clone());

    move_dealer_state(&mut state, dkg::DealerState::Dealing);
    tracing::info!("broadcasting commitment");
    broadcast_commitment(args, &own_contribution.commitments).await;

    let own_shares = dkg::encrypt_shares_for_committee(
        args.epoch,
        args.my_node_id,
        &own_contribution.polynomial,
        &own_contribution.commitments,
        &args.committee,
        &args.enc_keypair,
        &args.enc_pubkeys,
    );
    broadcast_shares(args, own_shares).await;
    move_dealer_state(&mut state, dkg::DealerState::AwaitingAcks);

    loop {
        let qualified = dkg::qualify_dealers(&state.acks_by_dealer, args.threshold);
        let have_all_contributions = qualified.iter().all(|d| state.per_dealer.contains_key(d));
        if qualified.len() >= args.threshold && have_all_contributions {
            if qualified.contains(&args.my_node_id) {
                move_dealer_state(&mut state, dkg::DealerState::Finalised);
            }
            move_player_state(&mut state, dkg::PlayerState::Sealed);
            return dkg::seal(
                args.epoch,
                args.threshold,
                args.committee.clone(),
                &qualified,
                &state.per_dealer,
                args.my_node_id,
                args.activation_height,
            );
        }

        let wire_bytes = match args.transport.recv().await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "transport recv failed, continuing to wait");
                continue;
            }
        };
        handle_inbound(args, &wire_bytes, &mut state).await;
    }
}

async fn broadcast_commitment(args: &DkgInstanceArgs, commitments: &[G2]) {
    let body = DkgCommitment {
        epoch: args.epoch,
        dealer: args.my_node_id,
        commitments: commitments.to_vec(),
    };
    for (&peer_id, &peer_addr) in &args.addresses {
        if peer_id == args.my_node_id {
            continue;
        }
        let envelope = Envelope::seal(args.signer.as_ref(), peer_addr, args.epoch, PhaseTag::DkgCommitment, 0, body.clone());
        if let Err(err) = args.transport.send(peer_addr, envelope.to_wire_bytes()).await {
            tracing::warn!(%err, recipient = ?peer_id, "failed to send commitment");
        }
    }
}

async fn broadcast_shares(args: &DkgInstanceArgs, shares: HashMap<NodeId, EncryptedShare>) {
    for (recipient, encrypted_share) in shares {
        let Some(&peer_addr) = args.addresses.get(&recipient) else {
            continue;
        };
        let body = DkgShare {
            epoch: args.epoch,
            dealer: args.my_node_id,
            recipient,
            encrypted_share,
        };
        let envelope = Envelope::seal(args.signer.as_ref(), peer_addr, args.epoch, PhaseTag::DkgShare, 0, body);
        if let Err(err) = args.transport.send(peer_addr, envelope.to_wire_bytes()).await {
            tracing::warn!(%err, recipient = ?recipient, "failed to send share");
        }
    }
}

async fn broadcast_ack(args: &DkgInstanceArgs, ack: AckRecord) {
    let body = DkgAck {
        epoch: ack.epoch,
        dealer: ack.dealer,
        player: ack.player,
        share_hash: ack.share_hash,
        commitment_hash: ack.commitment_hash,
    };
    for (&peer_id, &peer_addr) in &args.addresses {
        if peer_id == args.my_node_id {
            continue;
        }
        let envelope = Envelope::seal(args.signer.as_ref(), peer_addr, args.epoch, PhaseTag::DkgAck, 0, body);
        if let Err(err) = args.transport.send(peer_addr, envelope.to_wire_bytes()).await {
            tracing::warn!(%err, recipient = ?peer_id, "failed to broadcast ack");
        }
    }
}

async fn handle_inbound(args: &DkgInstanceArgs, wire_bytes: &[u8], state: &mut RoundState) {
    let self_address = args.signer.address();

    if let Ok(payload) = envelope::open::<DkgCommitment, _>(
        wire_bytes,
        self_address,
        PhaseTag::DkgCommitment,
        args.max_message_size,
        |a| resolve_sender(args, a),
    ) {
        state.commitments_by_dealer.insert(payload.body.dealer, payload.body.commitments);
        if state.player_state == dkg::PlayerState::Idle {
            move_player_state(state, dkg::PlayerState::Receiving);
        }
        return;
    }

    if let Ok(payload) = envelope::open::<DkgShare, _>(
        wire_bytes,
        self_address,
        PhaseTag::DkgShare,
        args.max_message_size,
        |a| resolve_sender(args, a),
    ) {
        if payload.body.recipient != args.my_node_id {
            return;
        }
        let Some(commitments) = state.commitments_by_dealer.get(&payload.body.dealer).cloned() else {
            return;
        };
        let Some(&dealer_enc_pubkey) = args.enc_pubkeys.get(&payload.body.dealer) else {
            return;
        };
        match dkg::verify_and_decrypt_share(
            &args.enc_keypair,
            dealer_enc_pubkey,
            args.epoch,
            payload.body.dealer,
            args.my_node_id,
            &payload.body.encrypted_share,
            &commitments,
        ) {
            Ok(share) => {
                let ack = dkg::make_ack(args.epoch, payload.body.dealer, args.my_node_id, share, &commitments);
                state.per_dealer.insert(payload.body.dealer, (commitments, share));
                state.acks_by_dealer.entry(payload.body.dealer).or_default().push(ack);
                move_player_state(state, dkg::PlayerState::Verified);
                broadcast_ack(args, ack).await;
                move_player_state(state, dkg::PlayerState::Acked);
            }
            Err(err) => {
                tracing::warn!(%err, dealer = ?payload.body.dealer, "share verification failed");
            }
        }
        return;
    }

    if let Ok(payload) = envelope::open::<DkgAck, _>(
        wire_bytes,
        self_address,
        PhaseTag::DkgAck,
        args.max_message_size,
        |a| resolve_sender(args, a),
    ) {
        let ack = AckRecord {
            epoch: payload.body.epoch,
            dealer: payload.body.dealer,
            player: payload.body.player,
            share_hash: payload.body.share_hash,
            commitment_hash: payload.body.commitment_hash,
        };
        state.acks_by_dealer.entry(payload.body.dealer).or_default().push(ack);
    }
}

/// Everything a reshare instance needs to run: identity, the committee
/// (unchanged across a same-committee reshare), and the previous version
/// being refreshed, alongside the same transport/authentication
/// collaborators [`DkgInstanceArgs`] uses.
pub struct ReshareInstanceArgs {
    /// This node's long-term signer.
    pub signer: Arc<dyn LongTermSigner>,
    /// This node's share-encryption keypair.
    pub enc_keypair: EncryptionKeypair,
    /// This node's identity within the committee.
    pub my_node_id: NodeId,
    /// The epoch this reshare will produce, if successful.
    pub new_epoch: Epoch,
    /// The committee running this round. Unchanged from the version being
    /// reshared; committee-change hand-off is a separate, derived step
    /// ([`reshare::hand_off_evaluate`]) not orchestrated here.
    pub committee: Committee,
    /// The minimum number of qualified dealers required.
    pub threshold: usize,
    /// NodeId -> transport address, for the committee.
    pub addresses: HashMap<NodeId, Address>,
    /// NodeId -> long-term signing public key, for the committee. Used to
    /// authenticate inbound envelopes against the receiver contract.
    pub signing_pubkeys: HashMap<NodeId, PublicKey>,
    /// NodeId -> share-encryption public key, for the committee.
    pub enc_pubkeys: HashMap<NodeId, G1>,
    /// The peer transport messages are exchanged over.
    pub transport: Arc<dyn PeerTransport>,
    /// The maximum serialised envelope payload accepted from the transport,
    /// checked by [`envelope::open`] before any buffer sized by a peer's
    /// claimed length prefix is trusted.
    pub max_message_size: usize,
    /// The block height the resulting version activates at.
    pub activation_height: u64,
    /// This instance's wall-clock deadline.
    pub timeout: Duration,
    /// Cancelled if the embedding node is shutting down or the scheduler's
    /// single-flight guard has moved on to a later boundary.
    pub cancellation_token: CancellationToken,
    /// The master public key of the version being refreshed. Carried over
    /// unchanged into the sealed version (§8 invariant 3).
    pub mpk: G2,
    /// This node's share under the version being refreshed.
    pub old_share: ScalarField,
    /// Every committee member's public share under the version being
    /// refreshed, in committee order.
    pub old_public_shares: Vec<G2>,
}

fn resolve_reshare_sender(args: &ReshareInstanceArgs, address: Address) -> Option<PublicKey> {
    let node_id = args.addresses.iter().find(|&(_, &a)| a == address).map(|(&id, _)| id)?;
    args.signing_pubkeys.get(&node_id).copied()
}

/// Runs a full reshare round to completion: deals this node's own
/// zero-polynomial contribution, exchanges commitments/shares/acks with
/// every other committee member over `args.transport`, then refreshes this
/// node's share and reseals from the qualified dealer set. Only the
/// same-committee path (§4.7) is orchestrated here; a committee change is a
/// derived step on top of its result.
#[tracing::instrument(skip_all, fields(epoch = ?args.new_epoch, node = ?args.my_node_id))]
pub async fn run_reshare_instance(args: ReshareInstanceArgs) -> Result<KeyShareVersion, ProtocolError> {
    let deadline = tokio::time::Instant::now() + args.timeout;
    tokio::select! {
        result = run_reshare_instance_inner(&args) => result,
        _ = tokio::time::sleep_until(deadline) => Err(ProtocolError::Timeout),
        _ = args.cancellation_token.cancelled() => Err(ProtocolError::Cancelled),
    }
}

async fn run_reshare_instance_inner(args: &ReshareInstanceArgs) -> Result<KeyShareVersion, ProtocolError> {
    let mut rng = OsRng;
    let own_contribution = reshare::deal_zero_polynomial(&mut rng, args.threshold);

    let mut state = RoundState {
        commitments_by_dealer: HashMap::new(),
        per_dealer: HashMap::new(),
        acks_by_dealer: args.committee.iter().map(|&d| (d, Vec::new())).collect(),
        dealer_state: dkg::DealerState::Idle,
        player_state: dkg::PlayerState::Idle,
    };
    state
        .commitments_by_dealer
        .insert(args.my_node_id, own_contribution.commitments.clone());

    move_dealer_state(&mut state, dkg::DealerState::Dealing);
    tracing::info!("broadcasting reshare commitment");
    broadcast_reshare_commitment(args, &own_contribution.commitments).await;

    let own_shares = dkg::encrypt_shares_for_committee(
        args.new_epoch,
        args.my_node_id,
        &own_contribution.polynomial,
        &own_contribution.commitments,
        &args.committee,
        &args.enc_keypair,
        &args.enc_pubkeys,
    );
    broadcast_reshare_shares(args, own_shares).await;
    move_dealer_state(&mut state, dkg::DealerState::AwaitingAcks);

    loop {
        let qualified = reshare::qualify_dealers(&state.acks_by_dealer, args.threshold);
        let have_all_contributions = qualified.iter().all(|d| state.per_dealer.contains_key(d));
        if qualified.len() >= args.threshold && have_all_contributions {
            if qualified.contains(&args.my_node_id) {
                move_dealer_state(&mut state, dkg::DealerState::Finalised);
            }
            move_player_state(&mut state, dkg::PlayerState::Sealed);

            let committee_scalars: Vec<ScalarField> = args.committee.iter().map(|id| id.scalar()).collect();
            let refreshed_local_share =
                reshare::refresh_share(args.old_share, &qualified, &state.per_dealer, &committee_scalars);
            let refreshed_public_shares = reshare::refreshed_public_shares(
                &args.committee,
                &args.old_public_shares,
                &qualified,
                &state.commitments_by_dealer,
            );
            return reshare::seal_same_committee(
                args.new_epoch,
                args.threshold,
                args.committee.clone(),
                args.mpk,
                refreshed_local_share,
                refreshed_public_shares,
                &qualified,
                args.activation_height,
            );
        }

        let wire_bytes = match args.transport.recv().await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "transport recv failed, continuing to wait");
                continue;
            }
        };
        handle_reshare_inbound(args, &wire_bytes, &mut state).await;
    }
}

async fn broadcast_reshare_commitment(args: &ReshareInstanceArgs, commitments: &[G2]) {
    let body = ReshareCommitment {
        epoch: args.new_epoch,
        dealer: args.my_node_id,
        commitments: commitments.to_vec(),
    };
    for (&peer_id, &peer_addr) in &args.addresses {
        if peer_id == args.my_node_id {
            continue;
        }
        let envelope = Envelope::seal(args.signer.as_ref(), peer_addr, args.new_epoch, PhaseTag::ReshareCommitment, 0, body.clone());
        if let Err(err) = args.transport.send(peer_addr, envelope.to_wire_bytes()).await {
            tracing::warn!(%err, recipient = ?peer_id, "failed to send reshare commitment");
        }
    }
}

async fn broadcast_reshare_shares(args: &ReshareInstanceArgs, shares: HashMap<NodeId, EncryptedShare>) {
    for (recipient, encrypted_share) in shares {
        let Some(&peer_addr) = args.addresses.get(&recipient) else {
            continue;
        };
        let body = ReshareShare {
            epoch: args.new_epoch,
            dealer: args.my_node_id,
            recipient,
            encrypted_share,
        };
        let envelope = Envelope::seal(args.signer.as_ref(), peer_addr, args.new_epoch, PhaseTag::ReshareShare, 0, body);
        if let Err(err) = args.transport.send(peer_addr, envelope.to_wire_bytes()).await {
            tracing::warn!(%err, recipient = ?recipient, "failed to send reshare share");
        }
    }
}

async fn broadcast_reshare_ack(args: &ReshareInstanceArgs, ack: AckRecord) {
    let body = ReshareAck {
        epoch: ack.epoch,
        dealer: ack.dealer,
        player: ack.player,
        share_hash: ack.share_hash,
        commitment_hash: ack.commitment_hash,
    };
    for (&peer_id, &peer_addr) in &args.addresses {
        if peer_id == args.my_node_id {
            continue;
        }
        let envelope = Envelope::seal(args.signer.as_ref(), peer_addr, args.new_epoch, PhaseTag::ReshareAck, 0, body);
        if let Err(err) = args.transport.send(peer_addr, envelope.to_wire_bytes()).await {
            tracing::warn!(%err, recipient = ?peer_id, "failed to broadcast reshare ack");
        }
    }
}

async fn handle_reshare_inbound(args: &ReshareInstanceArgs, wire_bytes: &[u8], state: &mut RoundState) {
    let self_address = args.signer.address();

    if let Ok(payload) = envelope::open::<ReshareCommitment, _>(
        wire_bytes,
        self_address,
        PhaseTag::ReshareCommitment,
        args.max_message_size,
        |a| resolve_reshare_sender(args, a),
    ) {
        state.commitments_by_dealer.insert(payload.body.dealer, payload.body.commitments);
        if state.player_state == dkg::PlayerState::Idle {
            move_player_state(state, dkg::PlayerState::Receiving);
        }
        return;
    }

    if let Ok(payload) = envelope::open::<ReshareShare, _>(
        wire_bytes,
        self_address,
        PhaseTag::ReshareShare,
        args.max_message_size,
        |a| resolve_reshare_sender(args, a),
    ) {
        if payload.body.recipient != args.my_node_id {
            return;
        }
        let Some(commitments) = state.commitments_by_dealer.get(&payload.body.dealer).cloned() else {
            return;
        };
        let Some(&dealer_enc_pubkey) = args.enc_pubkeys.get(&payload.body.dealer) else {
            return;
        };
        match dkg::verify_and_decrypt_share(
            &args.enc_keypair,
            dealer_enc_pubkey,
            args.new_epoch,
            payload.body.dealer,
            args.my_node_id,
            &payload.body.encrypted_share,
            &commitments,
        ) {
            Ok(share) => {
                let ack = reshare::make_ack(args.new_epoch, payload.body.dealer, args.my_node_id, share, &commitments);
                state.per_dealer.insert(payload.body.dealer, (commitments, share));
                state.acks_by_dealer.entry(payload.body.dealer).or_default().push(ack);
                move_player_state(state, dkg::PlayerState::Verified);
                broadcast_reshare_ack(args, ack).await;
                move_player_state(state, dkg::PlayerState::Acked);
            }
            Err(err) => {
                tracing::warn!(%err, dealer = ?payload.body.dealer, "reshare share verification failed");
            }
        }
        return;
    }

    if let Ok(payload) = envelope::open::<ReshareAck, _>(
        wire_bytes,
        self_address,
        PhaseTag::ReshareAck,
        args.max_message_size,
        |a| resolve_reshare_sender(args, a),
    ) {
        let ack = AckRecord {
            epoch: payload.body.epoch,
            dealer: payload.body.dealer,
            player: payload.body.player,
            share_hash: payload.body.share_hash,
            commitment_hash: payload.body.commitment_hash,
        };
        state.acks_by_dealer.entry(payload.body.dealer).or_default().push(ack);
    }
}
