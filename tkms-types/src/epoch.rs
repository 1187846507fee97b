//! The monotonically increasing protocol-round counter.

use serde::{Deserialize, Serialize};

/// A monotonically increasing epoch counter assigned by the scheduler at
/// each successful DKG or reshare. Epoch 0 means "no key".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(u64);

impl Epoch {
    /// The initial, pre-DKG epoch.
    pub const NO_KEY: Epoch = Epoch(0);

    /// Constructs an epoch from its raw counter value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Whether this is the pre-DKG epoch.
    pub fn is_no_key(self) -> bool {
        self == Self::NO_KEY
    }

    /// The next epoch, assigned on a successful DKG or reshare.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_increments_and_no_key_is_zero() {
        assert!(Epoch::NO_KEY.is_no_key());
        assert_eq!(Epoch::NO_KEY.next(), Epoch::new(1));
        assert!(!Epoch::new(1).is_no_key());
    }
}
