//! Group and field type aliases, curve (de)serialisation, the hash-to-curve
//! function `H1` targeting G1, and the GT-to-bytes extractor `H2`.

use ark_bls12_381::{Bls12_381, Fq, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, Field, LegendreSymbol, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

/// The field secret shares live in (named `Fr` by arkworks convention).
pub type ScalarField = Fr;
/// G1, the group `H1` hashes into and partial signatures/capabilities live in.
pub type G1 = G1Projective;
/// G2, the group commitments, public shares and the master public key live in.
pub type G2 = G2Projective;
/// GT, the pairing target group.
pub type GT = <Bls12_381 as Pairing>::TargetField;

/// Domain separation tag for `H1: {0,1}* -> G1`.
pub const H1_DST: &[u8] = b"TKMS-H1-G1-TRY-AND-INCREMENT-v1";
/// Domain separation tag for `H2: GT -> {0,1}*`.
pub const H2_DST: &[u8] = b"TKMS-H2-GT-KDF-v1";

/// A deserialised or otherwise externally supplied curve point failed the
/// subgroup check, or raw bytes did not decode to a point on the curve.
#[derive(Debug, thiserror::Error)]
pub enum InvalidPoint {
    /// The byte string did not decode to any point on the curve.
    #[error("bytes do not decode to a curve point")]
    Malformed,
    /// The point decoded but is not a member of the prime-order subgroup.
    #[error("point is not in the prime-order subgroup")]
    NotInSubgroup,
}

/// Computes the pairing `e(p, q)`.
pub fn pairing(p: G1, q: G2) -> GT {
    Bls12_381::pairing(p.into_affine(), q.into_affine()).0
}

/// `H1: {0,1}* -> G1`. Hashes an arbitrary message into a point on G1 using
/// try-and-increment: a BLAKE3 digest of `(dst, msg, counter)` is
/// interpreted as an x-coordinate candidate in the base field, and accepted
/// once it lies on the curve; the result is cleared of its cofactor so the
/// returned point is always a member of the prime-order subgroup.
pub fn hash_to_g1(msg: &[u8]) -> G1 {
    let mut counter: u64 = 0;
    loop {
        let mut hasher = blake3::Hasher::new();
        hasher.update(H1_DST);
        hasher.update(msg);
        hasher.update(&counter.to_be_bytes());
        let digest = hasher.finalize();
        let x = Fq::from_be_bytes_mod_order(digest.as_bytes());
        if let Some(point) = G1Affine::get_point_from_x_unchecked(x, false) {
            let cleared = point.clear_cofactor();
            if !cleared.is_zero() {
                return cleared.into_group();
            }
        }
        counter = counter.wrapping_add(1);
    }
}

/// `H2: GT -> {0,1}^n`. Expands the canonical serialisation of a GT element
/// into `n` pseudorandom bytes via a BLAKE3 extended-output squeeze, keyed
/// by [`H2_DST`]. Used both to mask the IBE seed and as the symmetric-key
/// KDF input for the AEAD step.
pub fn kdf_gt(element: GT, out_len: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    element
        .serialize_compressed(&mut bytes)
        .expect("GT serialisation is infallible for an in-memory buffer");
    let mut hasher = blake3::Hasher::new();
    hasher.update(H2_DST);
    hasher.update(&bytes);
    let mut reader = hasher.finalize_xof();
    let mut out = vec![0u8; out_len];
    reader.fill(&mut out);
    out
}

/// Deserialises a compressed G1 point, rejecting points outside the
/// prime-order subgroup.
pub fn deserialize_g1_compressed(bytes: &[u8]) -> Result<G1, InvalidPoint> {
    let affine =
        G1Affine::deserialize_compressed(bytes).map_err(|_| InvalidPoint::Malformed)?;
    if !affine.is_in_correct_subgroup_assuming_on_curve() {
        return Err(InvalidPoint::NotInSubgroup);
    }
    Ok(affine.into_group())
}

/// Deserialises a compressed G2 point, rejecting points outside the
/// prime-order subgroup.
pub fn deserialize_g2_compressed(bytes: &[u8]) -> Result<G2, InvalidPoint> {
    let affine =
        G2Affine::deserialize_compressed(bytes).map_err(|_| InvalidPoint::Malformed)?;
    if !affine.is_in_correct_subgroup_assuming_on_curve() {
        return Err(InvalidPoint::NotInSubgroup);
    }
    Ok(affine.into_group())
}

/// Serialises a G1 point in compressed form.
pub fn serialize_g1_compressed(point: &G1) -> Vec<u8> {
    let mut out = Vec::new();
    point
        .into_affine()
        .serialize_compressed(&mut out)
        .expect("G1 serialisation is infallible for an in-memory buffer");
    out
}

/// Serialises a G2 point in compressed form.
pub fn serialize_g2_compressed(point: &G2) -> Vec<u8> {
    let mut out = Vec::new();
    point
        .into_affine()
        .serialize_compressed(&mut out)
        .expect("G2 serialisation is infallible for an in-memory buffer");
    out
}

/// Maps a non-zero scalar to a canonical big-endian byte string, used by
/// `NodeId` derivation and Lagrange-coefficient bookkeeping.
pub fn scalar_to_be_bytes(scalar: &ScalarField) -> Vec<u8> {
    scalar.into_bigint().to_bytes_be()
}

/// Returns whether `x` is a quadratic residue in the base field; exposed for
/// tests exercising [`hash_to_g1`]'s try-and-increment loop.
#[doc(hidden)]
pub fn is_qr(x: Fq) -> bool {
    matches!(x.legendre(), LegendreSymbol::QuadraticResidue | LegendreSymbol::Zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::PrimeGroup;
    use ark_ff::UniformRand;

    #[test]
    fn hash_to_g1_is_deterministic_and_in_subgroup() {
        let p1 = hash_to_g1(b"app-1");
        let p2 = hash_to_g1(b"app-1");
        let p3 = hash_to_g1(b"app-2");
        assert_eq!(p1, p2);
        assert_ne!(p1, p3);
        assert!(p1.into_affine().is_in_correct_subgroup_assuming_on_curve());
    }

    #[test]
    fn kdf_gt_round_trips_through_serialization() {
        let mut rng = rand::thread_rng();
        let scalar = ScalarField::rand(&mut rng);
        let gt = pairing(G1::generator() * scalar, G2::generator());
        let a = kdf_gt(gt, 32);
        let b = kdf_gt(gt, 32);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn subgroup_check_rejects_malformed_bytes() {
        assert!(deserialize_g1_compressed(&[0u8; 10]).is_err());
    }
}
