//! Deterministic committee construction for tests: `n` operators with
//! addresses `[1; 20], [2; 20], ..`, matching the fixed-address style the
//! core crates' own unit tests already use.

use tkms_types::node::{Address, NodeId};
use tkms_types::version::{Committee, assemble_committee, threshold_for_committee_size};

/// Builds a committee of `n` operators with addresses `[i+1; 20]` for `i`
/// in `0..n`, and its default threshold `ceil(2n/3)`.
pub fn deterministic_committee(n: usize) -> (Committee, usize) {
    let committee = assemble_committee(
        (0..n)
            .map(|i| NodeId::from_address(Address([(i + 1) as u8; 20])))
            .collect(),
    )
    .expect("deterministic addresses never collide for n <= 255");
    let threshold = threshold_for_committee_size(n);
    (committee, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_committee_of_the_requested_size() {
        let (committee, threshold) = deterministic_committee(5);
        assert_eq!(committee.len(), 5);
        assert_eq!(threshold, 4);
    }
}
