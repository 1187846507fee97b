//! The reshare state machine (C7): rotates every member's share so a
//! pre-rotation compromise becomes useless, while the master public key is
//! invariant.
//!
//! Per §4.7's chosen variant, this module implements exactly one
//! interpolation formula for refreshing shares within a fixed committee,
//! and handles a committee change as a *derived* hand-off evaluation on top
//! of it, reusing [`crate::dkg::seal`]'s evaluation formula rather than
//! introducing a second arithmetic path.

use std::collections::HashMap;

use rand::{CryptoRng, Rng};
use tkms_core::curve::{G2, ScalarField};
use tkms_core::poly::{self, FeldmanPoly};
use tkms_types::epoch::Epoch;
use tkms_types::node::NodeId;
use tkms_types::version::{Committee, KeyShareVersion};

use crate::anchor::AckRecord;
use crate::dkg::{DealerContribution, commitment_hash, share_hash};
use crate::error::ProtocolError;

/// Samples a dealer's zero-polynomial contribution to a reshare: a fresh
/// degree-`(threshold - 1)` polynomial with `h(0) = 0` (§4.7 step 1). The
/// commitment to the constant term is always the G2 identity, which lets a
/// player check "really is zero at 0" without learning the polynomial.
pub fn deal_zero_polynomial<R: Rng + CryptoRng>(rng: &mut R, threshold: usize) -> DealerContribution {
    let polynomial = FeldmanPoly::zero_polynomial(rng, threshold - 1);
    let commitments = polynomial.commit_g2();
    DealerContribution {
        polynomial,
        commitments,
    }
}

/// Produces the ack tuple a player returns to a reshare dealer whose
/// zero-polynomial share it accepted. Identical shape to
/// [`crate::dkg::make_ack`]; kept as a separate entry point so a reshare
/// ack and a DKG ack are never confused by a caller despite sharing a
/// representation.
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

/// Re-exports [`crate::dkg::qualify_dealers`] under the name this module's
/// callers reach for; the qualification rule is identical for DKG and
/// reshare dealers.
pub use crate::dkg::qualify_dealers;

/// Refreshes a member's share within a fixed committee (§4.7 step 3, same-
/// committee path): `s_j' := s_j + sum_{d in D*} lambda_d(0) * h^d(j)`.
///
/// `zero_poly_shares` maps each qualified dealer to the zero-polynomial
/// share this member decrypted from it, and its commitment vector.
/// `committee_scalars` is every committee member's evaluation point, in the
/// deterministic order the Lagrange coefficients must be computed over.
pub fn refresh_share(
    old_share: ScalarField,
    qualified: &[NodeId],
    zero_poly_shares: &HashMap<NodeId, (Vec<G2>, ScalarField)>,
    committee_scalars: &[ScalarField],
) -> ScalarField {
    let lagrange = poly::lagrange_coefficients_at_zero(committee_scalars);
    let refresh: ScalarField = qualified
        .iter()
        .map(|dealer| {
            let idx = committee_scalars
                .iter()
                .position(|&s| s == dealer.scalar())
                .expect("dealer must be a committee evaluation point");
            let (_, share) = &zero_poly_shares[dealer];
            lagrange[idx] * share
        })
        .fold(ScalarField::from(0u64), |acc, x| acc + x);
    old_share + refresh
}

/// Refreshes every committee member's public share and re-derives MPK
/// (invariant per §8 invariant 3) the same way [`crate::dkg::seal`] would,
/// but starting from the previous version's public shares plus each
/// dealer's zero-polynomial commitments rather than from scratch.
pub fn refreshed_public_shares(
    committee: &Committee,
    old_public_shares: &[G2],
    qualified: &[NodeId],
    commitments_by_dealer: &HashMap<NodeId, Vec<G2>>,
) -> Vec<G2> {
    committee
        .iter()
        .zip(old_public_shares)
        .map(|(member, &old)| {
            qualified.iter().fold(old, |acc, dealer| {
                acc + poly::evaluate_commitment(member.scalar(), &commitments_by_dealer[dealer])
            })
        })
        .collect()
}

/// Seals a same-committee reshare's new version. MPK is carried over
/// unchanged from the old version, since every dealer's zero-polynomial
/// commits to the G2 identity at 0.
#[allow(clippy::too_many_arguments)]
pub fn seal_same_committee(
    new_epoch: Epoch,
    threshold: usize,
    committee: Committee,
    mpk: G2,
    refreshed_local_share: ScalarField,
    refreshed_public_shares: Vec<G2>,
    qualified: &[NodeId],
    activation_height: u64,
) -> Result<KeyShareVersion, ProtocolError> {
    if qualified.len() < threshold {
        return Err(ProtocolError::InsufficientDealers {
            needed: threshold,
            got: qualified.len(),
        });
    }
    Ok(KeyShareVersion::new_pending(
        new_epoch,
        threshold,
        committee,
        mpk,
        refreshed_local_share,
        refreshed_public_shares,
        activation_height,
    ))
}

/// The hand-off evaluation for a committee change (§4.7's "Chosen
/// variant"): after the outgoing committee refreshes within itself
/// (producing `fᵈ'` per outgoing dealer `d`, with `fᵈ'(0)` summing to the
/// unchanged MPK contribution), each *incoming-only* member evaluates its
/// new share as `s_k'' := sum_{d in D*} fᵈ'(k)` — exactly
/// [`crate::dkg::seal`]'s evaluation formula, reused rather than
/// duplicated, using the new member's NodeId as the evaluation point.
pub fn hand_off_evaluate(
    new_member: NodeId,
    qualified_outgoing_dealers: &[NodeId],
    refreshed_dealer_polynomials: &HashMap<NodeId, Vec<G2>>,
) -> G2 {
    use ark_ff::Zero;
    qualified_outgoing_dealers.iter().fold(G2::zero(), |acc, dealer| {
        acc + poly::evaluate_commitment(new_member.scalar(), &refreshed_dealer_polynomials[dealer])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::PrimeGroup;
    use ark_ff::Zero;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tkms_types::node::Address;
    use tkms_types::version::{assemble_committee, threshold_for_committee_size};

    #[test]
    fn same_committee_reshare_preserves_mpk_and_changes_shares() {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let n = 5;
        let committee = assemble_committee(
            (0..n as u8).map(|i| NodeId::from_address(Address([i + 1; 20]))).collect(),
        )
        .unwrap();
        let threshold = threshold_for_committee_size(n);
        let committee_scalars: Vec<ScalarField> = committee.iter().map(|id| id.scalar()).collect();

        // old shares: a simple degree-(t-1) secret sharing of a known secret.
        let secret_poly = FeldmanPoly::sample(&mut rng, threshold - 1);
        let mpk = G2::generator() * secret_poly.coeffs()[0];
        let old_shares: HashMap<NodeId, ScalarField> = committee
            .iter()
            .map(|&id| (id, secret_poly.evaluate_at(id.scalar())))
            .collect();
        let old_public_shares: Vec<G2> = committee
            .iter()
            .map(|id| G2::generator() * old_shares[id])
            .collect();

        // every member deals a zero-polynomial.
        let contributions: HashMap<NodeId, DealerContribution> = committee
            .iter()
            .map(|&d| (d, deal_zero_polynomial(&mut rng, threshold)))
            .collect();
        assert!(contributions.values().all(|c| c.commitments[0] == G2::zero()));

        let qualified = committee.clone();
        let commitments_by_dealer: HashMap<NodeId, Vec<G2>> = contributions
            .iter()
            .map(|(&d, c)| (d, c.commitments.clone()))
            .collect();

        let new_public_shares = refreshed_public_shares(&committee, &old_public_shares, &qualified, &commitments_by_dealer);

        for &member in &committee {
            let zero_poly_shares: HashMap<NodeId, (Vec<G2>, ScalarField)> = qualified
                .iter()
                .map(|&d| {
                    let share = contributions[&d].polynomial.evaluate_at(member.scalar());
                    (d, (contributions[&d].commitments.clone(), share))
                })
                .collect();
            let refreshed = refresh_share(old_shares[&member], &qualified, &zero_poly_shares, &committee_scalars);

            let version = seal_same_committee(
                Epoch::new(2),
                threshold,
                committee.clone(),
                mpk,
                refreshed,
                new_public_shares.clone(),
                &qualified,
                100,
            )
            .unwrap();

            assert_eq!(version.mpk(), mpk);
            assert_ne!(version.local_share(), old_shares[&member]);
        }
    }
}
