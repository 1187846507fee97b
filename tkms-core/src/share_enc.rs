//! Per-peer share encryption used when a DKG/reshare dealer sends a player
//! its evaluation of the dealt polynomial.
//!
//! A Diffie-Hellman shared point between the dealer's and the recipient's
//! long-term encryption keys is expanded via HKDF-SHA256 into an
//! AES-256-GCM key. The nonce is derived from `(epoch, dealer, recipient)`
//! so it is never reused under the same key. A recipient that cannot open
//! the GCM tag has no recourse but to treat the dealer as absent for that
//! round, mirroring a failed Feldman verification.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use ark_ec::PrimeGroup;
use ark_ff::{BigInteger, PrimeField, UniformRand};
use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::curve::{G1, ScalarField, serialize_g1_compressed};

const HKDF_INFO: &[u8] = b"TKMS-SHARE-ENC-v1";
const SHARE_LEN: usize = 32;

/// An operator's long-term share-encryption keypair, a G1 Diffie-Hellman
/// keypair distinct from its signing key.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKeypair {
    secret: ScalarField,
    #[zeroize(skip)]
    public: G1,
}

impl EncryptionKeypair {
    /// Builds a keypair from an existing secret scalar (e.g. loaded from the
    /// operator's persisted identity material).
    pub fn from_secret(secret: ScalarField) -> Self {
        let public = G1::generator() * secret;
        Self { secret, public }
    }

    /// Generates a fresh random encryption keypair.
    pub fn generate<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(ScalarField::rand(rng))
    }

    /// This operator's public encryption key, published to peers.
    pub fn public(&self) -> G1 {
        self.public
    }

    fn shared_secret(&self, their_public: G1) -> G1 {
        their_public * self.secret
    }
}

/// A share encrypted to a single recipient, ready to be embedded in a
/// `DkgShare`/`ReshareShare` wire message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedShare {
    /// 96-bit AES-GCM nonce, derived from `(epoch, dealer, recipient)`.
    pub nonce: [u8; 12],
    /// Ciphertext with the GCM authentication tag appended.
    pub ciphertext: Vec<u8>,
}

/// Derives the nonce for a given `(epoch, dealer, recipient)` triple so
/// distinct deliveries under the same derived key never repeat a nonce.
/// `dealer`/`recipient` are a NodeId's canonical scalar encoding.
pub fn derive_nonce(epoch: u64, dealer: &[u8], recipient: &[u8]) -> [u8; 12] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"TKMS-SHARE-NONCE-v1");
    hasher.update(&epoch.to_be_bytes());
    hasher.update(dealer);
    hasher.update(recipient);
    let digest = hasher.finalize();
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&digest.as_bytes()[..12]);
    nonce
}

fn derive_key(shared: G1) -> [u8; 32] {
    let shared_bytes = serialize_g1_compressed(&shared);
    let hk = Hkdf::<Sha256>::new(None, &shared_bytes);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .expect("32-byte output is valid for HKDF-SHA256");
    key
}

/// Encrypts an arbitrary-length `plaintext` for `recipient_public`,
/// authenticating `aad` (typically the envelope's
/// `(epoch, dealer, recipient, commitment_hash)` tuple). The underlying
/// primitive for [`encrypt_share`] and anything else that needs to seal
/// raw bytes under this scheme rather than a 32-byte scalar.
pub fn encrypt_bytes(
    sender: &EncryptionKeypair,
    recipient_public: G1,
    nonce: [u8; 12],
    plaintext: &[u8],
    aad: &[u8],
) -> EncryptedShare {
    let key = derive_key(sender.shared_secret(recipient_public));
    let cipher = Aes256Gcm::new_from_slice(&key).expect("key is exactly 32 bytes");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .expect("AES-GCM encryption over a bounded plaintext cannot fail");
    EncryptedShare { nonce, ciphertext }
}

/// Decrypts bytes sealed by [`encrypt_bytes`]. Returns `None` on any
/// authentication failure; callers must treat this identically to a dealer
/// that never produced an ack.
pub fn decrypt_bytes(
    recipient: &EncryptionKeypair,
    sender_public: G1,
    encrypted: &EncryptedShare,
    aad: &[u8],
) -> Option<Vec<u8>> {
    let key = derive_key(recipient.shared_secret(sender_public));
    let cipher = Aes256Gcm::new_from_slice(&key).ok()?;
    cipher
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            Payload {
                msg: &encrypted.ciphertext,
                aad,
            },
        )
        .ok()
}

/// Encrypts `share` for `recipient_public`, authenticating `aad` (typically
/// the envelope's `(epoch, dealer, recipient, commitment_hash)` tuple).
pub fn encrypt_share(
    sender: &EncryptionKeypair,
    recipient_public: G1,
    nonce: [u8; 12],
    share: ScalarField,
    aad: &[u8],
) -> EncryptedShare {
    let mut plaintext = share.into_bigint().to_bytes_be();
    plaintext.resize(SHARE_LEN, 0);
    encrypt_bytes(sender, recipient_public, nonce, &plaintext, aad)
}

/// Decrypts a share sent by `sender_public`. Returns `None` on any
/// authentication failure; callers must treat this identically to a dealer
/// that never produced an ack.
pub fn decrypt_share(
    recipient: &EncryptionKeypair,
    sender_public: G1,
    encrypted: &EncryptedShare,
    aad: &[u8],
) -> Option<ScalarField> {
    let plaintext = decrypt_bytes(recipient, sender_public, encrypted, aad)?;
    Some(ScalarField::from_be_bytes_mod_order(&plaintext))
}
