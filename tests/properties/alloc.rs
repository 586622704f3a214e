//! Property tests for the port and subnet allocator.

use proptest::prelude::*;
use std::collections::BTreeSet;

use berth::alloc::{choose_subnet, suggest_port};
use berth::config::NetworkChoice;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: the suggestion is the smallest unclaimed port at or
    /// above the preferred default.
    #[test]
    fn property_suggest_port_is_minimal_unclaimed(
        preferred in 1024u16..=60000,
        claimed in proptest::collection::btree_set(1024u16..=60000, 0..32),
    ) {
        let port = suggest_port(preferred, &claimed).expect("range cannot be exhausted here");

        prop_assert!(port >= preferred);
        prop_assert!(!claimed.contains(&port));
        // Everything between the preferred default and the suggestion was
        // claimed, or the scan would have stopped earlier.
        for candidate in preferred..port {
            prop_assert!(claimed.contains(&candidate));
        }
    }

    /// PROPERTY: a claimed preferred default is never returned.
    #[test]
    fn property_suggest_port_avoids_claims(
        preferred in 1024u16..=60000,
        extra in proptest::collection::btree_set(1024u16..=60000, 0..16),
    ) {
        let mut claimed: BTreeSet<u16> = extra;
        claimed.insert(preferred);
        let port = suggest_port(preferred, &claimed).unwrap();
        prop_assert!(port > preferred);
    }

    /// PROPERTY: a chosen subnet never overlaps the existing inventory.
    #[test]
    fn property_chosen_subnet_does_not_overlap(
        taken in proptest::collection::vec(0u8..=31, 0..8),
    ) {
        let existing: Vec<String> = taken.iter().map(|n| format!("172.{n}.0.0/16")).collect();
        let choice = choose_subnet(existing.iter().map(String::as_str));

        if let NetworkChoice::Subnet(subnet) = choice {
            prop_assert!(
                !existing.contains(&subnet),
                "allocator proposed an occupied subnet {subnet}"
            );
        }
        // The 172.16/12 block alone can never exhaust both tiers, so the
        // sentinel is unreachable here; reaching it would also be a bug.
    }
}

#[test]
fn test_choose_subnet_first_candidate_and_sentinel() {
    assert_eq!(
        choose_subnet([]),
        NetworkChoice::Subnet("172.18.0.0/16".to_string())
    );
    assert_eq!(
        choose_subnet(["0.0.0.0/0"]),
        NetworkChoice::RuntimeDefault
    );
}
