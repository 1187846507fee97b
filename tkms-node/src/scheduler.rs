//! The block-driven scheduler (C9): decides, from a monotonic stream of
//! finalised blocks, when to trigger a DKG or reshare round, and enforces
//! single-flight and catch-up-to-latest-block-only semantics.

use tkms_types::epoch::Epoch;

/// What the scheduler wants done in response to observing a new block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// No active version exists and the block boundary was hit: start DKG.
    StartDkg,
    /// An active version exists and the block boundary was hit: start a
    /// reshare.
    StartReshare {
        /// The epoch being reshared from.
        from_epoch: Epoch,
    },
    /// Nothing to do for this block.
    None,
}

/// Pure decision function for the scheduler's trigger rule (§4.9): a DKG or
/// reshare starts only when `block_number % boundary == 0`, and only a DKG
/// when there is no active epoch, a reshare otherwise.
pub fn decide_trigger(block_number: u64, boundary: u64, active_epoch: Option<Epoch>) -> Trigger {
    if boundary == 0 || block_number % boundary != 0 {
        return Trigger::None;
    }
    match active_epoch {
        None => Trigger::StartDkg,
        Some(epoch) => Trigger::StartReshare { from_epoch: epoch },
    }
}

/// Tracks which epoch boundary, if any, currently has a protocol instance
/// running, enforcing the single-flight guarantee: at most one DKG or
/// reshare instance runs locally for a given boundary.
pub struct SingleFlightGuard {
    running_boundary: Option<u64>,
}

impl Default for SingleFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleFlightGuard {
    /// Creates a guard with no instance currently running.
    pub fn new() -> Self {
        Self {
            running_boundary: None,
        }
    }

    /// Attempts to claim `block_number` as the boundary for a new protocol
    /// instance. Returns `false` (the caller must not start a new instance)
    /// if one is already running for this or a later boundary.
    pub fn try_claim(&mut self, block_number: u64) -> bool {
        match self.running_boundary {
            Some(running) if running >= block_number => false,
            _ => {
                self.running_boundary = Some(block_number);
                true
            }
        }
    }

    /// Releases the claim, whether the instance finished, aborted, or timed
    /// out. Must be called exactly once per successful `try_claim`.
    pub fn release(&mut self) {
        self.running_boundary = None;
    }
}

/// Given the latest and a previously-seen block number, returns the single
/// block the scheduler should act on: the latest one. A gap between the two
/// is not retroactively processed (§4.9's catch-up rule): the scheduler
/// never runs a DKG/reshare for a boundary it missed while behind.
pub fn catch_up_to_latest(previous: Option<u64>, latest: u64) -> u64 {
    match previous {
        Some(p) if p > latest => p,
        _ => latest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_trigger_off_boundary() {
        assert_eq!(decide_trigger(7, 5, None), Trigger::None);
    }

    #[test]
    fn dkg_triggers_on_boundary_with_no_active_version() {
        assert_eq!(decide_trigger(10, 5, None), Trigger::StartDkg);
    }

    #[test]
    fn reshare_triggers_on_boundary_with_active_version() {
        assert_eq!(
            decide_trigger(10, 5, Some(Epoch::new(3))),
            Trigger::StartReshare { from_epoch: Epoch::new(3) }
        );
    }

    #[test]
    fn single_flight_guard_rejects_concurrent_claim() {
        let mut guard = SingleFlightGuard::new();
        assert!(guard.try_claim(10));
        assert!(!guard.try_claim(10));
        guard.release();
        assert!(guard.try_claim(15));
    }

    #[test]
    fn catch_up_skips_missed_boundaries() {
        assert_eq!(catch_up_to_latest(Some(10), 25), 25);
        assert_eq!(catch_up_to_latest(None, 5), 5);
    }
}
