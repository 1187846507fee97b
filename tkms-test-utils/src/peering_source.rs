//! An in-memory [`PeeringSource`] that resolves a fixed committee for every
//! epoch it was seeded with, and an [`AttestationVerifier`] fixture that
//! accepts or rejects by a scripted rule, for scenarios that don't exercise
//! real attestation verification.

use std::collections::HashMap;

use async_trait::async_trait;
use tkms_node::ports::{AttestationRejected, AttestationVerifier, PeerInfo, PeeringSource};
use tkms_types::epoch::Epoch;

/// Resolves a fixed, pre-seeded committee per epoch.
pub struct FixedPeeringSource {
    committees: HashMap<Epoch, Vec<PeerInfo>>,
}

impl FixedPeeringSource {
    /// Builds a source from an explicit `epoch -> committee` map.
    pub fn new(committees: HashMap<Epoch, Vec<PeerInfo>>) -> Self {
        Self { committees }
    }
}

#[async_trait]
impl PeeringSource for FixedPeeringSource {
    async fn committee_for_epoch(&self, epoch: Epoch) -> eyre::Result<Option<Vec<PeerInfo>>> {
        Ok(self.committees.get(&epoch).cloned())
    }
}

/// Accepts every attestation unconditionally. Useful for scenarios that
/// exercise `RetrieveSecrets`'s sealing logic without modelling a real
/// attestation scheme.
pub struct AlwaysAcceptVerifier;

#[async_trait]
impl AttestationVerifier for AlwaysAcceptVerifier {
    async fn verify(&self, _method: &str, _blob: &[u8], _expected_claims: &[u8]) -> eyre::Result<Result<(), AttestationRejected>> {
        Ok(Ok(()))
    }
}

/// Rejects every attestation unconditionally, for testing the rejection
/// path of `RetrieveSecrets`.
pub struct AlwaysRejectVerifier;

#[async_trait]
impl AttestationVerifier for AlwaysRejectVerifier {
    async fn verify(&self, _method: &str, _blob: &[u8], _expected_claims: &[u8]) -> eyre::Result<Result<(), AttestationRejected>> {
        Ok(Err(AttestationRejected))
    }
}
