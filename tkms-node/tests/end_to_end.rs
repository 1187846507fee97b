//! The six literal end-to-end scenarios: happy-path DKG, encrypt/decrypt
//! round-trip, threshold insufficiency, partial tampering, reshare
//! preserving MPK, and dealer equivocation.

use std::collections::HashMap;

use ark_ec::PrimeGroup;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tkms_core::curve::{G2, ScalarField};
use tkms_core::ibe::{self, Partial};
use tkms_core::share_enc::{EncryptedShare, EncryptionKeypair};
use tkms_node::anchor::{self, AckMerkleTree, EquivocationProof};
use tkms_node::dkg::{self, DealerContribution};
use tkms_node::reshare;
use tkms_types::epoch::Epoch;
use tkms_types::node::NodeId;
use tkms_types::version::KeyShareVersion;

struct DkgRoundOutput {
    versions: HashMap<NodeId, KeyShareVersion>,
}

fn run_full_dkg(rng: &mut ChaCha20Rng, epoch: Epoch, committee: &[NodeId], threshold: usize) -> DkgRoundOutput {
    let enc_keypairs: HashMap<NodeId, EncryptionKeypair> =
        committee.iter().map(|&id| (id, EncryptionKeypair::generate(rng))).collect();
    let enc_pubkeys: HashMap<NodeId, tkms_core::curve::G1> =
        enc_keypairs.iter().map(|(&id, kp)| (id, kp.public())).collect();

    let contributions: HashMap<NodeId, DealerContribution> =
        committee.iter().map(|&dealer| (dealer, dkg::deal(rng, threshold))).collect();

    let mut shares_for_player: HashMap<NodeId, HashMap<NodeId, EncryptedShare>> =
        committee.iter().map(|&p| (p, HashMap::new())).collect();
    for (&dealer, contribution) in &contributions {
        let encrypted = dkg::encrypt_shares_for_committee(
            epoch,
            dealer,
            &contribution.polynomial,
            &contribution.commitments,
            &committee.to_vec(),
            &enc_keypairs[&dealer],
            &enc_pubkeys,
        );
        for (recipient, enc_share) in encrypted {
            shares_for_player.get_mut(&recipient).unwrap().insert(dealer, enc_share);
        }
    }

    let mut acks_by_dealer: HashMap<NodeId, Vec<anchor::AckRecord>> =
        committee.iter().map(|&d| (d, Vec::new())).collect();
    let mut per_dealer_per_player: HashMap<NodeId, HashMap<NodeId, (Vec<G2>, ScalarField)>> =
        committee.iter().map(|&p| (p, HashMap::new())).collect();

    for &player in committee {
        for &dealer in committee {
            let enc_share = &shares_for_player[&player][&dealer];
            let commitments = &contributions[&dealer].commitments;
            let share = dkg::verify_and_decrypt_share(
                &enc_keypairs[&player],
                enc_pubkeys[&dealer],
                epoch,
                dealer,
                player,
                enc_share,
                commitments,
            )
            .unwrap();
            let ack = dkg::make_ack(epoch, dealer, player, share, commitments);
            acks_by_dealer.get_mut(&dealer).unwrap().push(ack);
            per_dealer_per_player
                .get_mut(&player)
                .unwrap()
                .insert(dealer, (commitments.clone(), share));
        }
    }

    let qualified = dkg::qualify_dealers(&acks_by_dealer, threshold);

    let versions = committee
        .iter()
        .map(|&member| {
            let version = dkg::seal(
                epoch,
                threshold,
                committee.to_vec(),
                &qualified,
                &per_dealer_per_player[&member],
                member,
                100,
            )
            .unwrap();
            (member, version)
        })
        .collect();

    DkgRoundOutput { versions }
}

fn committee_of(n: u8) -> Vec<NodeId> {
    (1..=n)
        .map(|i| NodeId::from_address(tkms_types::node::Address([i; 20])))
        .collect()
}

#[test]
fn scenario_1_happy_path_dkg_n5_t4() {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let committee = committee_of(5);
    let threshold = 4;
    let round = run_full_dkg(&mut rng, Epoch::new(1), &committee, threshold);

    let mpk = round.versions[&committee[0]].mpk();
    for v in round.versions.values() {
        assert_eq!(v.mpk(), mpk);
    }
    for (idx, member) in committee.iter().enumerate() {
        let version = &round.versions[member];
        assert_eq!(G2::generator() * version.local_share(), version.public_shares()[idx]);
    }

    // Property 2: partial signatures recover to a capability whose pairing
    // matches MPK, probed on a fixed identity.
    let partials: Vec<Partial> = committee
        .iter()
        .map(|member| Partial {
            node_id: member.scalar(),
            sigma_i: ibe::partial_sign(round.versions[member].local_share(), b"probe"),
        })
        .collect();
    ibe::recover(&partials, threshold, mpk, b"probe").unwrap();
}

#[test]
fn scenario_2_encrypt_decrypt_round_trip() {
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let committee = committee_of(5);
    let threshold = 4;
    let round = run_full_dkg(&mut rng, Epoch::new(1), &committee, threshold);
    let mpk = round.versions[&committee[0]].mpk();

    let plaintext = [0xDE, 0xAD, 0xBE, 0xEF];
    let ciphertext = ibe::encrypt(&mut rng, mpk, b"app-1", &plaintext);

    let partials: Vec<Partial> = committee[..4]
        .iter()
        .map(|member| Partial {
            node_id: member.scalar(),
            sigma_i: ibe::partial_sign(round.versions[member].local_share(), b"app-1"),
        })
        .collect();
    let sigma = ibe::recover(&partials, threshold, mpk, b"app-1").unwrap();
    let decrypted = ibe::decrypt(sigma, &ciphertext).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn scenario_3_threshold_insufficiency() {
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let committee = committee_of(5);
    let threshold = 4;
    let round = run_full_dkg(&mut rng, Epoch::new(1), &committee, threshold);
    let mpk = round.versions[&committee[0]].mpk();

    let partials: Vec<Partial> = committee[..3]
        .iter()
        .map(|member| Partial {
            node_id: member.scalar(),
            sigma_i: ibe::partial_sign(round.versions[member].local_share(), b"app-1"),
        })
        .collect();
    let err = ibe::recover(&partials, threshold, mpk, b"app-1").unwrap_err();
    assert!(matches!(
        err,
        ibe::IbeError::ThresholdNotMet { needed: 4, got: 3 }
    ));
}

#[test]
fn scenario_4_partial_tampering_fails_pairing_check() {
    let mut rng = ChaCha20Rng::seed_from_u64(4);
    let committee = committee_of(5);
    let threshold = 4;
    let round = run_full_dkg(&mut rng, Epoch::new(1), &committee, threshold);
    let mpk = round.versions[&committee[0]].mpk();

    let mut partials: Vec<Partial> = committee[..4]
        .iter()
        .map(|member| Partial {
            node_id: member.scalar(),
            sigma_i: ibe::partial_sign(round.versions[member].local_share(), b"app-1"),
        })
        .collect();
    // flip one bit's worth of contribution by swapping in a bogus signature.
    partials[1].sigma_i = ibe::partial_sign(ScalarField::from(999u64), b"app-1");

    let err = ibe::recover(&partials, threshold, mpk, b"app-1").unwrap_err();
    assert_eq!(err, ibe::IbeError::InvalidPartial);
}

#[test]
fn scenario_5_reshare_preserves_mpk() {
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let committee = committee_of(5);
    let threshold = 4;
    let dkg_round = run_full_dkg(&mut rng, Epoch::new(1), &committee, threshold);
    let mpk = dkg_round.versions[&committee[0]].mpk();
    let committee_scalars: Vec<ScalarField> = committee.iter().map(|id| id.scalar()).collect();

    let contributions: HashMap<NodeId, DealerContribution> = committee
        .iter()
        .map(|&d| (d, reshare::deal_zero_polynomial(&mut rng, threshold)))
        .collect();
    let qualified = committee.clone();
    let commitments_by_dealer: HashMap<NodeId, Vec<G2>> =
        contributions.iter().map(|(&d, c)| (d, c.commitments.clone())).collect();
    // Every honest node's version carries the same `public_shares` vector
    // (property 4), so any one of them can be read for "the old public
    // share of committee member at index idx".
    let old_public_shares: Vec<G2> = (0..committee.len())
        .map(|idx| dkg_round.versions[&committee[0]].public_shares()[idx])
        .collect();

    let new_public_shares = reshare::refreshed_public_shares(&committee, &old_public_shares, &qualified, &commitments_by_dealer);

    let mut reshared_versions = HashMap::new();
    for &member in &committee {
        let zero_poly_shares: HashMap<NodeId, (Vec<G2>, ScalarField)> = qualified
            .iter()
            .map(|&d| {
                let share = contributions[&d].polynomial.evaluate_at(member.scalar());
                (d, (contributions[&d].commitments.clone(), share))
            })
            .collect();
        let refreshed = reshare::refresh_share(
            dkg_round.versions[&member].local_share(),
            &qualified,
            &zero_poly_shares,
            &committee_scalars,
        );
        let version = reshare::seal_same_committee(
            Epoch::new(2),
            threshold,
            committee.clone(),
            mpk,
            refreshed,
            new_public_shares.clone(),
            &qualified,
            200,
        )
        .unwrap();
        reshared_versions.insert(member, version);
    }

    for &member in &committee {
        let old_version = &dkg_round.versions[&member];
        let new_version = &reshared_versions[&member];
        assert_eq!(new_version.mpk(), old_version.mpk());
        assert_ne!(new_version.local_share(), old_version.local_share());
        assert_eq!(new_version.epoch(), Epoch::new(2));
    }

    // Repeat scenario 2 under the new version: same plaintext recovers.
    let plaintext = [0xDE, 0xAD, 0xBE, 0xEF];
    let ciphertext = ibe::encrypt(&mut rng, mpk, b"app-1", &plaintext);
    let partials: Vec<Partial> = committee[..4]
        .iter()
        .map(|member| Partial {
            node_id: member.scalar(),
            sigma_i: ibe::partial_sign(reshared_versions[member].local_share(), b"app-1"),
        })
        .collect();
    let sigma = ibe::recover(&partials, threshold, mpk, b"app-1").unwrap();
    assert_eq!(ibe::decrypt(sigma, &ciphertext).unwrap(), plaintext);
}

#[test]
fn scenario_6_dealer_equivocation_is_detected() {
    let dealer = NodeId::from_address(tkms_types::node::Address([7u8; 20]));
    let player_1 = NodeId::from_address(tkms_types::node::Address([1u8; 20]));
    let player_2 = NodeId::from_address(tkms_types::node::Address([2u8; 20]));
    let epoch = Epoch::new(9);

    let ack_to_p1 = anchor::AckRecord {
        epoch,
        dealer,
        player: player_1,
        share_hash: [1u8; 32],
        commitment_hash: [0xAA; 32],
    };
    let ack_to_p2 = anchor::AckRecord {
        epoch,
        dealer,
        player: player_2,
        share_hash: [2u8; 32],
        commitment_hash: [0xBB; 32],
    };

    let tree_a = AckMerkleTree::build(vec![ack_to_p1]);
    let tree_b = AckMerkleTree::build(vec![ack_to_p2]);

    let proof = EquivocationProof {
        ack_a: ack_to_p1,
        path_a: tree_a.path(0).unwrap(),
        index_a: 0,
        root_a: tree_a.root(),
        ack_b: ack_to_p2,
        path_b: tree_b.path(0).unwrap(),
        index_b: 0,
        root_b: tree_b.root(),
    };
    assert!(anchor::verify_equivocation(&proof));

    // `qualify_dealers` independently excludes this dealer, since its acks
    // to p1 and p2 disagree on `commitment_hash`.
    let mut acks_by_dealer = HashMap::new();
    acks_by_dealer.insert(dealer, vec![ack_to_p1, ack_to_p2]);
    let qualified = dkg::qualify_dealers(&acks_by_dealer, 2);
    assert!(!qualified.contains(&dealer));
}
