//! The long-term signer port (§6) and a local ECDSA/secp256k1
//! implementation. Remote-signer and AWS-backed implementations are
//! external collaborators and out of scope for this crate.

use k256::ecdsa::signature::{Signer as _, Verifier as _};
use k256::ecdsa::{Signature as K256Signature, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use tkms_types::node::Address;
use zeroize::ZeroizeOnDrop;

/// A 64-byte ECDSA/secp256k1 signature over a message hash.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes_64")] pub [u8; 64]);

mod serde_bytes_64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 64], D::Error> {
        let v = Vec::<u8>::deserialize(deserializer)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("expected a 64-byte signature"))
    }
}

/// A 33-byte compressed secp256k1 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 33]);

impl PublicKey {
    /// Derives this key's [`Address`] (the low 20 bytes of a BLAKE3 hash of
    /// the compressed public key, playing the role `keccak256(pubkey)[12..]`
    /// plays for ECDSA-addressed chains).
    pub fn address(&self) -> Address {
        let digest = blake3::hash(&self.0);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest.as_bytes()[..20]);
        Address(addr)
    }
}

/// The port every operator's transport layer signs outgoing envelopes and
/// verifies incoming ones through: `sign(hash) -> signature` and
/// `public_key()`.
pub trait LongTermSigner: Send + Sync {
    /// Signs a 32-byte message hash (the envelope's `hash` field).
    fn sign(&self, hash: &[u8; 32]) -> Signature;
    /// This signer's public key.
    fn public_key(&self) -> PublicKey;
    /// This signer's derived [`Address`].
    fn address(&self) -> Address {
        self.public_key().address()
    }
}

/// An in-process ECDSA/secp256k1 signer, holding the secret key directly.
#[derive(ZeroizeOnDrop)]
pub struct LocalSigner {
    #[zeroize(skip)]
    verifying_key: VerifyingKey,
    signing_key: SigningKey,
}

impl LocalSigner {
    /// Generates a fresh random signing key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let signing_key = SigningKey::random(rng);
        let verifying_key = *signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Restores a signer from an existing 32-byte secret scalar, e.g. loaded
    /// from an external secret-manager collaborator.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, k256::ecdsa::Error> {
        let signing_key = SigningKey::from_slice(bytes)?;
        let verifying_key = *signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }
}

impl LongTermSigner for LocalSigner {
    fn sign(&self, hash: &[u8; 32]) -> Signature {
        let sig: K256Signature = self.signing_key.sign(hash);
        Signature(sig.to_bytes().into())
    }

    fn public_key(&self) -> PublicKey {
        let encoded = self.verifying_key.to_encoded_point(true);
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(encoded.as_bytes());
        PublicKey(bytes)
    }
}

/// Verifies `signature` over `hash` under `public_key`.
pub fn verify(public_key: PublicKey, hash: &[u8; 32], signature: &Signature) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&public_key.0) else {
        return false;
    };
    let Ok(sig) = K256Signature::from_slice(&signature.0) else {
        return false;
    };
    verifying_key.verify(hash, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let mut rng = rand::thread_rng();
        let signer = LocalSigner::generate(&mut rng);
        let hash = blake3::hash(b"payload");
        let signature = signer.sign(hash.as_bytes().try_into().unwrap());
        assert!(verify(signer.public_key(), hash.as_bytes().try_into().unwrap(), &signature));
    }

    #[test]
    fn tampered_hash_fails_verification() {
        let mut rng = rand::thread_rng();
        let signer = LocalSigner::generate(&mut rng);
        let hash = blake3::hash(b"payload");
        let signature = signer.sign(hash.as_bytes().try_into().unwrap());
        let other_hash = blake3::hash(b"different payload");
        assert!(!verify(
            signer.public_key(),
            other_hash.as_bytes().try_into().unwrap(),
            &signature
        ));
    }
}
