//! The versioned key store (C4): the only shared mutable resource in a
//! node, guarded by a single-writer/many-reader lock so reads never block
//! each other and a write is atomic from every reader's perspective.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tkms_types::epoch::Epoch;
use tkms_types::version::{KeyShareVersion, VersionStatus};

/// Errors raised by key-store operations. These are lifecycle errors per
/// the taxonomy (§7): returned to callers, never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    /// No version has ever been activated.
    #[error("no active key version")]
    NoActiveKey,
    /// The referenced epoch has no corresponding version.
    #[error("version unknown for epoch {0}")]
    VersionUnknown(Epoch),
    /// `install_pending` was called with a version for an epoch that is
    /// already installed (pending, active, or retired). The call is
    /// rejected rather than silently accepted, so a duplicate finalise
    /// never produces two active versions for the same epoch.
    #[error("version for epoch {0} is already installed")]
    AlreadyInstalled(Epoch),
    /// `activate` was called for an epoch with no pending version.
    #[error("no pending version for epoch {0}")]
    NoPendingVersion(Epoch),
}

struct StoredVersion {
    version: KeyShareVersion,
    retired_at: Option<Instant>,
}

struct Inner {
    versions: Vec<StoredVersion>,
}

/// A versioned store of key-share material. Cheaply cloneable: clones share
/// the same underlying lock and version list.
#[derive(Clone)]
pub struct KeyStore(Arc<RwLock<Inner>>);

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore {
    /// Creates an empty store, with no active version.
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(Inner {
            versions: Vec::new(),
        })))
    }

    /// Installs a freshly sealed version as `Pending`. Rejects a version
    /// whose epoch is already installed in any status, so a duplicate
    /// finalise from a retried protocol instance is a no-op from the key
    /// store's perspective rather than a source of two active versions
    /// (§8's idempotence law).
    pub fn install_pending(&self, version: KeyShareVersion) -> Result<(), KeyStoreError> {
        let mut inner = self.0.write();
        if inner.versions.iter().any(|v| v.version.epoch() == version.epoch()) {
            return Err(KeyStoreError::AlreadyInstalled(version.epoch()));
        }
        inner.versions.push(StoredVersion {
            version,
            retired_at: None,
        });
        Ok(())
    }

    /// Activates the pending version for `epoch` at `activation_height`.
    /// The previously active version, if any, becomes `Retired`.
    pub fn activate(&self, epoch: Epoch, activation_height: u64) -> Result<(), KeyStoreError> {
        let mut inner = self.0.write();
        let pending_idx = inner
            .versions
            .iter()
            .position(|v| v.version.epoch() == epoch && v.version.status() == VersionStatus::Pending)
            .ok_or(KeyStoreError::NoPendingVersion(epoch))?;

        for stored in inner.versions.iter_mut() {
            if stored.version.status() == VersionStatus::Active {
                stored.version.retire();
                stored.retired_at = Some(Instant::now());
            }
        }
        inner.versions[pending_idx].version.activate(activation_height);
        Ok(())
    }

    /// Returns a snapshot of the currently active version, if any.
    pub fn get_active(&self) -> Result<KeyShareVersionSnapshot, KeyStoreError> {
        let inner = self.0.read();
        inner
            .versions
            .iter()
            .find(|v| v.version.status() == VersionStatus::Active)
            .map(KeyShareVersionSnapshot::from)
            .ok_or(KeyStoreError::NoActiveKey)
    }

    /// Selects the version whose activation interval contains block height
    /// `t`: the version with the greatest `activation_height <= t`, among
    /// versions that are active or retired (never a still-pending one).
    pub fn get_for_time(&self, t: u64) -> Result<KeyShareVersionSnapshot, KeyStoreError> {
        let inner = self.0.read();
        inner
            .versions
            .iter()
            .filter(|v| v.version.status() != VersionStatus::Pending)
            .filter(|v| v.version.activation_height() <= t)
            .max_by_key(|v| v.version.activation_height())
            .map(KeyShareVersionSnapshot::from)
            .ok_or(KeyStoreError::VersionUnknown(Epoch::new(0)))
    }

    /// Drops retired versions that have been retired for longer than
    /// `retention`.
    pub fn gc(&self, retention: Duration) {
        let mut inner = self.0.write();
        let now = Instant::now();
        inner.versions.retain(|v| match v.retired_at {
            Some(retired_at) => now.duration_since(retired_at) < retention,
            None => true,
        });
    }

    /// The number of versions currently held, in any status. Test/ops
    /// visibility only.
    pub fn len(&self) -> usize {
        self.0.read().versions.len()
    }

    /// Whether the store holds no versions at all.
    pub fn is_empty(&self) -> bool {
        self.0.read().versions.is_empty()
    }
}

/// A read-only snapshot of a version's public fields plus this node's
/// private share, returned from [`KeyStore`] reads. Kept distinct from
/// [`KeyShareVersion`] so a read never hands out a reference tied to the
/// store's lock lifetime.
#[derive(Debug, Clone)]
pub struct KeyShareVersionSnapshot {
    /// This version's epoch.
    pub epoch: Epoch,
    /// This version's threshold.
    pub threshold: usize,
    /// This version's committee.
    pub committee: tkms_types::version::Committee,
    /// The master public key.
    pub mpk: tkms_core::curve::G2,
    /// This node's private share.
    pub local_share: tkms_core::curve::ScalarField,
    /// The per-member public-share vector.
    pub public_shares: Vec<tkms_core::curve::G2>,
    /// The block height at which this version activated.
    pub activation_height: u64,
}

impl From<&StoredVersion> for KeyShareVersionSnapshot {
    fn from(stored: &StoredVersion) -> Self {
        let v = &stored.version;
        Self {
            epoch: v.epoch(),
            threshold: v.threshold(),
            committee: v.committee().clone(),
            mpk: v.mpk(),
            local_share: v.local_share(),
            public_shares: v.public_shares().to_vec(),
            activation_height: v.activation_height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Zero;
    use tkms_core::curve::{G2, ScalarField};
    use tkms_types::node::{Address, NodeId};

    fn dummy_version(epoch: u64) -> KeyShareVersion {
        let committee = vec![
            NodeId::from_address(Address([1u8; 20])),
            NodeId::from_address(Address([2u8; 20])),
        ];
        KeyShareVersion::new_pending(
            Epoch::new(epoch),
            2,
            committee,
            G2::zero(),
            ScalarField::from(epoch),
            vec![G2::zero(), G2::zero()],
            10 * epoch,
        )
    }

    #[test]
    fn install_then_activate_exposes_active_version() {
        let store = KeyStore::new();
        assert!(matches!(store.get_active(), Err(KeyStoreError::NoActiveKey)));

        store.install_pending(dummy_version(1)).unwrap();
        store.activate(Epoch::new(1), 10).unwrap();

        let active = store.get_active().unwrap();
        assert_eq!(active.epoch, Epoch::new(1));
    }

    #[test]
    fn duplicate_install_is_rejected() {
        let store = KeyStore::new();
        store.install_pending(dummy_version(1)).unwrap();
        let err = store.install_pending(dummy_version(1)).unwrap_err();
        assert!(matches!(err, KeyStoreError::AlreadyInstalled(_)));
    }

    #[test]
    fn activation_retires_previous_version() {
        let store = KeyStore::new();
        store.install_pending(dummy_version(1)).unwrap();
        store.activate(Epoch::new(1), 10).unwrap();
        store.install_pending(dummy_version(2)).unwrap();
        store.activate(Epoch::new(2), 20).unwrap();

        let active = store.get_active().unwrap();
        assert_eq!(active.epoch, Epoch::new(2));

        let at_15 = store.get_for_time(15).unwrap();
        assert_eq!(at_15.epoch, Epoch::new(1));
        let at_25 = store.get_for_time(25).unwrap();
        assert_eq!(at_25.epoch, Epoch::new(2));
    }
}
