//! The error taxonomy (§7): input errors are handled at the transport
//! boundary and never reach here; this module covers protocol,
//! cryptographic-invariant and lifecycle errors.

use tkms_types::epoch::Epoch;
use tkms_types::node::NodeId;

/// Errors raised while running a DKG or reshare protocol instance. These
/// abort the current instance only; the active key-store version is never
/// touched.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A player rejected a dealer's share against its commitment vector.
    #[error("share from dealer {dealer:?} failed verification")]
    ShareVerificationFailed {
        /// The dealer whose share failed verification.
        dealer: NodeId,
    },
    /// A dealer was proven to have sent inconsistent commitments to two
    /// distinct players for the same epoch.
    #[error("dealer {dealer:?} equivocated in epoch {epoch}")]
    DealerEquivocation {
        /// The epoch the equivocation occurred in.
        epoch: Epoch,
        /// The equivocating dealer.
        dealer: NodeId,
    },
    /// Fewer than `threshold` dealers reached a qualified ack set before the
    /// instance's deadline.
    #[error("only {got} of {needed} required dealers qualified")]
    InsufficientDealers {
        /// The number of dealers required.
        needed: usize,
        /// The number of dealers that qualified.
        got: usize,
    },
    /// A dealer did not collect enough acks from distinct players.
    #[error("only {got} of {needed} required acks collected")]
    InsufficientAcks {
        /// The number of acks required.
        needed: usize,
        /// The number of acks collected.
        got: usize,
    },
    /// The instance's wall-clock deadline elapsed before it could complete.
    #[error("protocol instance timed out")]
    Timeout,
    /// The instance's cancellation handle fired.
    #[error("protocol instance was cancelled")]
    Cancelled,
}

/// Cryptographic-invariant errors. These are treated as bugs: an honest
/// implementation should never observe them, so they are surfaced to the
/// caller of the application-facing operation that exposed them rather than
/// silently retried.
#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    /// A pairing-based tamper check failed during signature recovery.
    #[error("pairing check failed")]
    PairingCheckFailed,
    /// Fewer than `threshold` distinct partial signatures were supplied to
    /// `Recover`.
    #[error("threshold not met: needed {needed}, got {got}")]
    ThresholdNotMet {
        /// The threshold required.
        needed: usize,
        /// The number of partials supplied.
        got: usize,
    },
    /// Two nodes disagree on the committee or threshold for the same
    /// active epoch.
    #[error("committee inconsistent for epoch {epoch}")]
    CommitteeInconsistent {
        /// The epoch at which the inconsistency was observed.
        epoch: Epoch,
    },
}

/// Lifecycle errors returned to application-facing callers (§6). Not
/// retried internally.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// No version has ever been activated.
    #[error("no active key version")]
    NoActiveKey,
    /// A request referenced an epoch or timestamp for which no version
    /// exists.
    #[error("version unknown")]
    VersionUnknown,
    /// An attestation presented with a request failed verification.
    #[error("attestation rejected")]
    AttestationRejected,
}
