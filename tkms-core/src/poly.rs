//! Feldman verifiable-secret-sharing polynomials: sampling, evaluation,
//! G2 commitment vectors, Lagrange interpolation at zero, and share
//! verification against a commitment vector.

use ark_ec::{AffineRepr, CurveGroup, PrimeGroup, VariableBaseMSM as _};
use ark_ff::{Field, UniformRand, Zero};
use itertools::izip;
use rand::{CryptoRng, Rng};
use zeroize::ZeroizeOnDrop;

use crate::curve::{G2, ScalarField};

/// A degree-`d` polynomial over the scalar field, held only by the dealer
/// that sampled it. The constant term is the dealt secret (zero, for a
/// reshare zero-polynomial). Forgotten (zeroized) once the dealer has
/// produced its commitments and per-player shares.
#[derive(ZeroizeOnDrop)]
pub struct FeldmanPoly {
    coeffs: Vec<ScalarField>,
}

impl FeldmanPoly {
    /// Samples a fresh degree-`degree` polynomial with a uniformly random
    /// constant term, for use as a DKG dealer contribution.
    pub fn sample<R: Rng + CryptoRng>(rng: &mut R, degree: usize) -> Self {
        let secret = ScalarField::rand(rng);
        Self::with_secret(rng, secret, degree)
    }

    /// Samples a degree-`degree` polynomial whose constant term is fixed to
    /// `secret`. Used both for resharing (secret = the dealer's existing
    /// share) and for the reshare zero-polynomial (secret = 0).
    pub fn with_secret<R: Rng + CryptoRng>(
        rng: &mut R,
        secret: ScalarField,
        degree: usize,
    ) -> Self {
        let mut coeffs = Vec::with_capacity(degree + 1);
        coeffs.push(secret);
        for _ in 0..degree {
            coeffs.push(ScalarField::rand(rng));
        }
        Self { coeffs }
    }

    /// Builds a zero-polynomial for reshare: a fresh degree-`degree`
    /// polynomial with `h(0) = 0`.
    pub fn zero_polynomial<R: Rng + CryptoRng>(rng: &mut R, degree: usize) -> Self {
        Self::with_secret(rng, ScalarField::zero(), degree)
    }

    /// The polynomial's degree.
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// The raw coefficients. Sensitive: callers must not persist or log this.
    pub fn coeffs(&self) -> &[ScalarField] {
        &self.coeffs
    }

    /// Evaluates the polynomial at `x` using Horner's method.
    pub fn evaluate_at(&self, x: ScalarField) -> ScalarField {
        evaluate(&self.coeffs, x)
    }

    /// Commits to the polynomial's coefficients in G2: `C_k = coeffs[k]*g2`.
    pub fn commit_g2(&self) -> Vec<G2> {
        commit_g2(&self.coeffs)
    }
}

/// Evaluates a coefficient vector at `x` via Horner's method:
/// `coeffs[0] + x*coeffs[1] + x^2*coeffs[2] + ...`.
pub fn evaluate(coeffs: &[ScalarField], x: ScalarField) -> ScalarField {
    coeffs
        .iter()
        .rev()
        .fold(ScalarField::zero(), |acc, c| acc * x + c)
}

/// Commits to a coefficient vector in G2: `C_k = coeffs[k]*g2`.
pub fn commit_g2(coeffs: &[ScalarField]) -> Vec<G2> {
    let generator = G2::generator();
    coeffs.iter().map(|c| generator * c).collect()
}

/// Computes the Lagrange coefficient `lambda_j(0)` for node `x_j` against
/// the ordered set of evaluation points `xs` (which must include `x_j`
/// exactly once). `xs` is iterated in the order given; callers are
/// responsible for supplying nodes in the deterministic ascending-NodeID
/// order so all honest nodes agree.
pub fn lagrange_at_zero(x_j: ScalarField, xs: &[ScalarField]) -> ScalarField {
    let mut num = ScalarField::from(1u64);
    let mut den = ScalarField::from(1u64);
    for &x_k in xs {
        if x_k == x_j {
            continue;
        }
        num *= x_k;
        den *= x_k - x_j;
    }
    num * den.inverse().expect("evaluation points must be pairwise distinct")
}

/// Computes every Lagrange-at-zero coefficient for the ordered point set
/// `xs` in one pass, reusing the shared numerator/denominator structure.
/// Equivalent to calling [`lagrange_at_zero`] for each point but avoids
/// repeating the O(n) product for each one.
pub fn lagrange_coefficients_at_zero(xs: &[ScalarField]) -> Vec<ScalarField> {
    xs.iter().map(|&x_j| lagrange_at_zero(x_j, xs)).collect()
}

/// Checks a received share `s_i` against a dealer's G2 commitment vector:
/// `s_i*g2 == sum_k i^k * C_k`.
pub fn verify_share(x: ScalarField, share: ScalarField, commitments: &[G2]) -> bool {
    let lhs = G2::generator() * share;
    let mut x_pow = ScalarField::from(1u64);
    let mut rhs = G2::zero();
    for c in commitments {
        rhs += *c * x_pow;
        x_pow *= x;
    }
    lhs == rhs
}

/// Evaluates a G2 commitment vector at `x` the same way [`verify_share`]
/// does internally: `sum_k x^k * C_k`. Used to derive a committee member's
/// public share from a dealer's commitment vector during Seal.
pub fn evaluate_commitment(x: ScalarField, commitments: &[G2]) -> G2 {
    let mut x_pow = ScalarField::from(1u64);
    let mut acc = G2::zero();
    for c in commitments {
        acc += *c * x_pow;
        x_pow *= x;
    }
    acc
}

/// Accumulates a set of scalar shares (e.g. a player's final private share
/// across all qualified dealers, `s_j = sum_d f^d(j)`).
pub fn accumulate_shares(shares: &[ScalarField]) -> ScalarField {
    shares.iter().fold(ScalarField::zero(), |acc, s| acc + s)
}

/// Reconstructs a secret (or any G2-valued quantity's scalar twin) from `t`
/// shares and their matching Lagrange coefficients: `sum_j lambda_j * s_j`.
pub fn accumulate_lagrange_shares(shares: &[ScalarField], lagrange: &[ScalarField]) -> ScalarField {
    assert_eq!(shares.len(), lagrange.len());
    izip!(shares, lagrange).fold(ScalarField::zero(), |acc, (s, l)| acc + *s * *l)
}

/// Reconstructs a G2 point (e.g. a committee's contribution to MPK, or a
/// public-share vector entry) from `t` public-share contributions and their
/// matching Lagrange coefficients, via a variable-base MSM.
pub fn accumulate_lagrange_g2(points: &[G2], lagrange: &[ScalarField]) -> G2 {
    assert_eq!(points.len(), lagrange.len());
    let affine: Vec<_> = points.iter().map(|p| p.into_affine()).collect();
    G2::msm_unchecked(&affine, lagrange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn horner_matches_naive_evaluation() {
        let coeffs = [
            ScalarField::from(3u64),
            ScalarField::from(5u64),
            ScalarField::from(7u64),
        ];
        let x = ScalarField::from(2u64);
        // 3 + 5*2 + 7*4 = 41
        assert_eq!(evaluate(&coeffs, x), ScalarField::from(41u64));
    }

    #[test]
    fn feldman_share_verifies_against_commitment() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let poly = FeldmanPoly::sample(&mut rng, 3);
        let commitments = poly.commit_g2();
        for i in 1..=5u64 {
            let x = ScalarField::from(i);
            let share = poly.evaluate_at(x);
            assert!(verify_share(x, share, &commitments));
        }
    }

    #[test]
    fn tampered_share_fails_verification() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let poly = FeldmanPoly::sample(&mut rng, 2);
        let commitments = poly.commit_g2();
        let x = ScalarField::from(1u64);
        let share = poly.evaluate_at(x) + ScalarField::from(1u64);
        assert!(!verify_share(x, share, &commitments));
    }

    #[test]
    fn shamir_reconstruction_recovers_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let degree = 3;
        let poly = FeldmanPoly::sample(&mut rng, degree);
        let secret = poly.coeffs()[0];

        let xs: Vec<_> = (1..=(degree as u64 + 1)).map(ScalarField::from).collect();
        let shares: Vec<_> = xs.iter().map(|&x| poly.evaluate_at(x)).collect();
        let lagrange = lagrange_coefficients_at_zero(&xs);
        let reconstructed = accumulate_lagrange_shares(&shares, &lagrange);
        assert_eq!(reconstructed, secret);
    }

    #[test]
    fn zero_polynomial_has_zero_constant_term() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let h = FeldmanPoly::zero_polynomial(&mut rng, 3);
        assert_eq!(h.coeffs()[0], ScalarField::zero());
        assert_eq!(h.commit_g2()[0], G2::zero());
    }
}
