//! The Boneh-Franklin identity-based encryption construction and its
//! threshold extraction: application public keys derived from an identity
//! string, partial signing, threshold recovery, and authenticated
//! encryption/decryption under the recovered capability.

use ark_ec::PrimeGroup;
use ark_ff::{UniformRand, Zero};
use rand::{CryptoRng, Rng};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::curve::{G1, G2, ScalarField, hash_to_g1, kdf_gt, pairing};
use crate::poly::{accumulate_lagrange_shares, lagrange_coefficients_at_zero};

const SEED_LEN: usize = 32;
const AUTH_TAG_LEN: usize = 32;

/// Errors raised by the threshold IBE scheme.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IbeError {
    /// `Recover` was called with fewer than `t` distinct partials.
    #[error("threshold not met: need {needed}, got {got}")]
    ThresholdNotMet {
        /// The committee threshold.
        needed: usize,
        /// The number of partials actually supplied.
        got: usize,
    },
    /// The recovered capability failed the pairing check against MPK,
    /// meaning at least one supplied partial was invalid or tampered with.
    #[error("recovered capability failed pairing verification")]
    InvalidPartial,
    /// Authenticated decryption failed: wrong key or a corrupted ciphertext.
    #[error("ciphertext failed authentication")]
    Corrupt,
}

/// Computes the application public key for `id`: `H1(id) in G1`. Anyone can
/// compute this; it requires no secret state.
pub fn app_public_key(id: &[u8]) -> G1 {
    hash_to_g1(id)
}

/// An IBE ciphertext `(U, V, W)`: `U in G2` chosen by the encryptor, `V` an
/// XOR mask of a random seed, and `W` an authenticated mask of the
/// plaintext keyed by that seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    /// `U = r*g2`.
    pub u: G2,
    /// `V = seed XOR H2(e(H1(id), r*MPK))`.
    pub v: [u8; SEED_LEN],
    /// `W = plaintext XOR keystream(seed) || auth_tag(seed, aad=U||V||ciphertext)`.
    pub w: Vec<u8>,
}

fn seed_keystream(seed: &[u8; SEED_LEN], len: usize) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"TKMS-IBE-SEED-KEYSTREAM-v1");
    hasher.update(seed);
    let mut xof = hasher.finalize_xof();
    let mut out = vec![0u8; len];
    xof.fill(&mut out);
    out
}

fn seed_auth_tag(seed: &[u8; SEED_LEN], u: &G2, v: &[u8; SEED_LEN], ct: &[u8]) -> [u8; AUTH_TAG_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"TKMS-IBE-SEED-AUTH-v1");
    hasher.update(seed);
    hasher.update(&crate::curve::serialize_g2_compressed(u));
    hasher.update(v);
    hasher.update(ct);
    *hasher.finalize().as_bytes()
}

fn xor_into(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// Encrypts `plaintext` for `id` under the epoch's master public key.
pub fn encrypt<R: Rng + CryptoRng>(rng: &mut R, mpk: G2, id: &[u8], plaintext: &[u8]) -> Ciphertext {
    let r = ScalarField::rand(rng);
    let u = G2::generator() * r;
    let shared = pairing(app_public_key(id), mpk * r);
    let mask = kdf_gt(shared, SEED_LEN);

    let mut seed = [0u8; SEED_LEN];
    rng.fill_bytes(&mut seed);
    let mut v = [0u8; SEED_LEN];
    for i in 0..SEED_LEN {
        v[i] = seed[i] ^ mask[i];
    }

    let keystream = seed_keystream(&seed, plaintext.len());
    let mut ciphertext = xor_into(plaintext, &keystream);
    let tag = seed_auth_tag(&seed, &u, &v, &ciphertext);
    ciphertext.extend_from_slice(&tag);

    seed.zeroize();
    Ciphertext { u, v, w: ciphertext }
}

/// `PartialSign(s_i, id) = s_i * H1(id)`.
pub fn partial_sign(share: ScalarField, id: &[u8]) -> G1 {
    app_public_key(id) * share
}

/// A single contributor's partial signature, tagged with the committee
/// evaluation point it was produced at so `Recover` can compute the matching
/// Lagrange coefficients.
#[derive(Debug, Clone, Copy)]
pub struct Partial {
    /// The contributor's evaluation point (NodeID), as a scalar.
    pub node_id: ScalarField,
    /// The partial signature `s_i * H1(id)`.
    pub sigma_i: G1,
}

/// Reconstructs the application capability `sigma(id) = sum lambda_j(0) *
/// sigma_j` from exactly `threshold` distinct partials, and verifies it
/// against MPK via a single pairing check: `e(sigma, g2) == e(H1(id), MPK)`.
pub fn recover(partials: &[Partial], threshold: usize, mpk: G2, id: &[u8]) -> Result<G1, IbeError> {
    if partials.len() < threshold {
        return Err(IbeError::ThresholdNotMet {
            needed: threshold,
            got: partials.len(),
        });
    }
    let partials = &partials[..threshold];
    let xs: Vec<_> = partials.iter().map(|p| p.node_id).collect();
    let lagrange = lagrange_coefficients_at_zero(&xs);
    let sigmas: Vec<_> = partials.iter().map(|p| p.sigma_i).collect();

    let mut sigma = G1::zero();
    for (s, l) in sigmas.iter().zip(lagrange.iter()) {
        sigma += *s * *l;
    }

    let lhs = pairing(sigma, G2::generator());
    let rhs = pairing(app_public_key(id), mpk);
    if lhs != rhs {
        return Err(IbeError::InvalidPartial);
    }
    Ok(sigma)
}

/// Equivalent to [`recover`] but also cross-checks [`accumulate_lagrange_shares`]
/// semantics when the caller already holds plaintext scalar shares (used by
/// tests that need to assert the scalar-level identity, not just the G1
/// pairing check).
#[doc(hidden)]
pub fn recover_scalar_for_tests(shares: &[ScalarField], xs: &[ScalarField]) -> ScalarField {
    let lagrange = lagrange_coefficients_at_zero(xs);
    accumulate_lagrange_shares(shares, &lagrange)
}

/// Decrypts a ciphertext under a recovered capability `sigma`.
pub fn decrypt(sigma: G1, ciphertext: &Ciphertext) -> Result<Vec<u8>, IbeError> {
    if ciphertext.w.len() < AUTH_TAG_LEN {
        return Err(IbeError::Corrupt);
    }
    let shared = pairing(sigma, ciphertext.u);
    let mask = kdf_gt(shared, SEED_LEN);
    let mut seed = [0u8; SEED_LEN];
    for i in 0..SEED_LEN {
        seed[i] = ciphertext.v[i] ^ mask[i];
    }

    let (ct, tag) = ciphertext.w.split_at(ciphertext.w.len() - AUTH_TAG_LEN);
    let expected_tag = seed_auth_tag(&seed, &ciphertext.u, &ciphertext.v, ct);
    if expected_tag.ct_eq(tag).unwrap_u8() != 1 {
        seed.zeroize();
        return Err(IbeError::Corrupt);
    }

    let keystream = seed_keystream(&seed, ct.len());
    let plaintext = xor_into(ct, &keystream);
    seed.zeroize();
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poly::FeldmanPoly;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn committee_version(rng: &mut ChaCha20Rng, n: usize, t: usize) -> (G2, Vec<ScalarField>, Vec<ScalarField>) {
        let poly = FeldmanPoly::sample(rng, t - 1);
        let mpk = poly.commit_g2()[0];
        let xs: Vec<_> = (1..=n as u64).map(ScalarField::from).collect();
        let shares: Vec<_> = xs.iter().map(|&x| poly.evaluate_at(x)).collect();
        (mpk, xs, shares)
    }

    #[test]
    fn encrypt_decrypt_round_trips_with_exact_threshold() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let (mpk, xs, shares) = committee_version(&mut rng, 5, 4);
        let id = b"app-1";
        let plaintext = [0xDEu8, 0xAD, 0xBE, 0xEF];
        let ciphertext = encrypt(&mut rng, mpk, id, &plaintext);

        let partials: Vec<_> = (0..4)
            .map(|i| Partial {
                node_id: xs[i],
                sigma_i: partial_sign(shares[i], id),
            })
            .collect();
        let sigma = recover(&partials, 4, mpk, id).unwrap();
        let decrypted = decrypt(sigma, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn threshold_insufficiency_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(43);
        let (mpk, xs, shares) = committee_version(&mut rng, 5, 4);
        let id = b"app-1";
        let partials: Vec<_> = (0..3)
            .map(|i| Partial {
                node_id: xs[i],
                sigma_i: partial_sign(shares[i], id),
            })
            .collect();
        let err = recover(&partials, 4, mpk, id).unwrap_err();
        assert_eq!(
            err,
            IbeError::ThresholdNotMet {
                needed: 4,
                got: 3
            }
        );
    }

    #[test]
    fn tampered_partial_fails_pairing_check() {
        let mut rng = ChaCha20Rng::seed_from_u64(44);
        let (mpk, xs, shares) = committee_version(&mut rng, 5, 4);
        let id = b"app-1";
        let mut partials: Vec<_> = (0..4)
            .map(|i| Partial {
                node_id: xs[i],
                sigma_i: partial_sign(shares[i], id),
            })
            .collect();
        partials[1].sigma_i += G1::generator();
        let err = recover(&partials, 4, mpk, id).unwrap_err();
        assert_eq!(err, IbeError::InvalidPartial);
    }

    #[test]
    fn bit_flip_in_ciphertext_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(45);
        let (mpk, xs, shares) = committee_version(&mut rng, 5, 4);
        let id = b"app-1";
        let plaintext = [0xDEu8, 0xAD, 0xBE, 0xEF];
        let mut ciphertext = encrypt(&mut rng, mpk, id, &plaintext);
        ciphertext.w[0] ^= 1;

        let partials: Vec<_> = (0..4)
            .map(|i| Partial {
                node_id: xs[i],
                sigma_i: partial_sign(shares[i], id),
            })
            .collect();
        let sigma = recover(&partials, 4, mpk, id).unwrap();
        assert_eq!(decrypt(sigma, &ciphertext).unwrap_err(), IbeError::Corrupt);
    }
}
