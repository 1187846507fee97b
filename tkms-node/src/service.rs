//! The application-facing service surface (C10, §6). These are pure
//! functions over `(KeyStore, request)`: HTTP framing and attestation
//! verification are external collaborators, wired in by whatever process
//! embeds this crate.

use rand::{CryptoRng, Rng};
use tkms_core::curve::{self, G1};
use tkms_core::ibe;
use tkms_core::share_enc::{self, EncryptedShare, EncryptionKeypair};

use crate::error::LifecycleError;
use crate::key_store::{KeyShareVersionSnapshot, KeyStore, KeyStoreError};

impl From<KeyStoreError> for LifecycleError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::NoActiveKey => LifecycleError::NoActiveKey,
            _ => LifecycleError::VersionUnknown,
        }
    }
}

/// `GetMasterPublicKey`: the active version's master public key, compressed.
pub fn get_master_public_key(store: &KeyStore) -> Result<Vec<u8>, LifecycleError> {
    let active = store.get_active()?;
    Ok(curve::serialize_g2_compressed(&active.mpk))
}

/// Request for `PartialSign`.
pub struct PartialSignRequest {
    /// The application identity to sign for.
    pub app_id: String,
    /// The requester-supplied attestation time, used to select the version
    /// whose activation interval contains it. A negative value means "the
    /// currently active version".
    pub attestation_time: i64,
}

fn select_version(
    store: &KeyStore,
    attestation_time: i64,
) -> Result<KeyShareVersionSnapshot, LifecycleError> {
    if attestation_time >= 0 {
        Ok(store.get_for_time(attestation_time as u64)?)
    } else {
        Ok(store.get_active()?)
    }
}

/// `PartialSign`: this node's partial signature `sigma_i` for `app_id`
/// under the version selected by `attestation_time`, compressed.
pub fn partial_sign(store: &KeyStore, request: &PartialSignRequest) -> Result<Vec<u8>, LifecycleError> {
    let version = select_version(store, request.attestation_time)?;
    let sigma_i = ibe::partial_sign(version.local_share, request.app_id.as_bytes());
    Ok(curve::serialize_g1_compressed(&sigma_i))
}

/// Request for `RetrieveSecrets`.
pub struct RetrieveSecretsRequest {
    /// The application identity the caller is attesting for.
    pub app_id: String,
    /// Opaque attestation blob, carried only for nonce derivation here; the
    /// embedding process must verify it through the `AttestationVerifier`
    /// port before this function is ever called.
    pub attestation: Vec<u8>,
    /// The caller's ephemeral public encryption key. The partial signature
    /// is sealed to this.
    pub ephemeral_pub: G1,
    /// The requester-supplied attestation time.
    pub attestation_time: i64,
}

/// `RetrieveSecrets`'s response envelope: this node's partial signature,
/// ECIES-sealed to the caller's ephemeral public key, alongside opaque
/// application-environment blobs the embedding process attaches.
pub struct SecretsEnvelope {
    /// The sender's ephemeral encryption public key, needed by the caller to
    /// recompute the shared secret.
    pub sender_public: G1,
    /// The ECIES-sealed partial signature.
    pub sealed_partial: EncryptedShare,
    /// Opaque application-environment blobs, passed through verbatim.
    pub app_env_blobs: Vec<Vec<u8>>,
}

/// `RetrieveSecrets`: attestation verification is the caller's
/// responsibility (§6) — this function assumes `request.attestation` has
/// already been accepted by the embedding process's `AttestationVerifier`,
/// and only selects the version and seals the partial signature to the
/// caller's ephemeral key.
pub fn retrieve_secrets<R: Rng + CryptoRng>(
    rng: &mut R,
    store: &KeyStore,
    request: &RetrieveSecretsRequest,
    app_env_blobs: Vec<Vec<u8>>,
) -> Result<SecretsEnvelope, LifecycleError> {
    let version = select_version(store, request.attestation_time)?;
    let sigma_i = ibe::partial_sign(version.local_share, request.app_id.as_bytes());
    let sigma_bytes = curve::serialize_g1_compressed(&sigma_i);

    let sender = EncryptionKeypair::generate(rng);
    let nonce = share_enc::derive_nonce(
        version.epoch.into_inner(),
        request.app_id.as_bytes(),
        &request.attestation,
    );
    let sealed_partial = share_enc::encrypt_bytes(
        &sender,
        request.ephemeral_pub,
        nonce,
        &sigma_bytes,
        request.app_id.as_bytes(),
    );
    Ok(SecretsEnvelope {
        sender_public: sender.public(),
        sealed_partial,
        app_env_blobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::PrimeGroup;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tkms_core::curve::{G2, ScalarField};
    use tkms_types::epoch::Epoch;
    use tkms_types::node::{Address, NodeId};
    use tkms_types::version::KeyShareVersion;

    fn store_with_active_version() -> KeyStore {
        let store = KeyStore::new();
        let committee = vec![
            NodeId::from_address(Address([1u8; 20])),
            NodeId::from_address(Address([2u8; 20])),
        ];
        let local_share = ScalarField::from(7u64);
        let mpk = G2::generator() * local_share;
        let version = KeyShareVersion::new_pending(
            Epoch::new(1),
            2,
            committee,
            mpk,
            local_share,
            vec![mpk, mpk],
            10,
        );
        store.install_pending(version).unwrap();
        store.activate(Epoch::new(1), 10).unwrap();
        store
    }

    #[test]
    fn get_master_public_key_requires_an_active_version() {
        let store = KeyStore::new();
        assert!(matches!(
            get_master_public_key(&store),
            Err(LifecycleError::NoActiveKey)
        ));

        let store = store_with_active_version();
        let mpk_bytes = get_master_public_key(&store).unwrap();
        assert_eq!(mpk_bytes.len(), 96);
    }

    #[test]
    fn partial_sign_uses_the_active_version_when_time_is_negative() {
        let store = store_with_active_version();
        let request = PartialSignRequest {
            app_id: "app-1".to_string(),
            attestation_time: -1,
        };
        let sigma_bytes = partial_sign(&store, &request).unwrap();
        assert_eq!(sigma_bytes.len(), 48);
    }

    #[test]
    fn retrieve_secrets_seals_the_partial_to_the_caller() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let store = store_with_active_version();
        let caller = tkms_core::share_enc::EncryptionKeypair::generate(&mut rng);
        let request = RetrieveSecretsRequest {
            app_id: "app-1".to_string(),
            attestation: vec![1, 2, 3],
            ephemeral_pub: caller.public(),
            attestation_time: 10,
        };

        let envelope = retrieve_secrets(&mut rng, &store, &request, vec![b"env".to_vec()]).unwrap();
        assert_eq!(envelope.app_env_blobs, vec![b"env".to_vec()]);

        let decrypted = tkms_core::share_enc::decrypt_bytes(
            &caller,
            envelope.sender_public,
            &envelope.sealed_partial,
            request.app_id.as_bytes(),
        )
        .unwrap();

        // The recovered bytes must be the *exact* 48-byte compressed G1
        // point, not a lossy reduction of it: this is what `Recover` needs
        // to reconstruct the full signature from enough partials.
        let expected_sigma = ibe::partial_sign(ScalarField::from(7u64), request.app_id.as_bytes());
        let expected_bytes = curve::serialize_g1_compressed(&expected_sigma);
        assert_eq!(decrypted, expected_bytes);
        assert_eq!(decrypted.len(), 48);
        assert_eq!(curve::deserialize_g1_compressed(&decrypted).unwrap(), expected_sigma);
    }
}
