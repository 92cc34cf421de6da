use super::*;

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Structural invariants that hold independently of accounting.
fn validate_trie(t: &DigitTrie) {
    let mut terminals = 0usize;
    for (idx, node) in t.nodes.iter().enumerate() {
        if node.terminal {
            terminals += 1;
        }
        assert!(node.prefix.bytes().all(|b| b.is_ascii_digit()));
        for (digit, child) in node.children.iter().enumerate() {
            if child.is_nil() {
                continue;
            }
            assert!(
                child.idx() > idx,
                "child {} allocated before parent {}",
                child.idx(),
                idx
            );
            let c = &t.nodes[child.idx()];
            assert_eq!(c.prefix.len(), node.prefix.len() + 1);
            assert!(c.prefix.starts_with(node.prefix.as_str()));
            assert_eq!(c.prefix.as_bytes()[node.prefix.len()], b'0' + digit as u8);
        }
    }
    assert_eq!(terminals, t.count, "terminal count must match len()");
}

/// Aggregate invariants valid immediately after `populate_used(identifier_len)`.
fn validate_accounting(t: &DigitTrie, identifier_len: usize) {
    for node in &t.nodes {
        let height = identifier_len - node.prefix.len();
        assert_eq!(node.covers, 10u64.pow(height as u32));
        assert!(node.used <= node.covers);

        let mut sum = u64::from(node.terminal);
        let mut sibling_covers = None;
        for child in node.children {
            if child.is_nil() {
                continue;
            }
            let c = &t.nodes[child.idx()];
            sum += c.used;
            if let Some(covers) = sibling_covers {
                assert_eq!(c.covers, covers, "siblings must share covers");
            }
            sibling_covers = Some(c.covers);
        }
        assert_eq!(node.used, sum);
    }
}

/// A numbering plan: identifier length in digits plus a distinct set of used
/// identifiers of that length (no leading zero).
fn plan_strategy() -> impl Strategy<Value = (usize, Vec<String>)> {
    (1usize..=4).prop_flat_map(|digits| {
        let lo = 10u32.pow(digits as u32 - 1);
        let hi = 10u32.pow(digits as u32);
        let max_ids = ((hi - lo) as usize).min(120);
        prop::collection::btree_set(lo..hi, 0..=max_ids).prop_map(move |set| {
            (digits, set.into_iter().map(|n| n.to_string()).collect())
        })
    })
}

fn length_seed(digits: usize) -> String {
    format!("1{}", "0".repeat(digits - 1))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_partition((digits, ids) in plan_strategy()) {
        let mut trie = DigitTrie::from_identifiers(&ids).unwrap();
        validate_trie(&trie);

        let seed = length_seed(digits);
        let free: Vec<String> = trie.available(Some(&seed)).unwrap().collect();
        validate_trie(&trie);
        validate_accounting(&trie, digits);

        // On an empty plan the seed itself got registered.
        let mut used: BTreeSet<String> = ids.iter().cloned().collect();
        if used.is_empty() {
            used.insert(seed);
        }

        for value in &free {
            prop_assert_eq!(value.len(), digits);
            prop_assert!(!value.starts_with('0'));
        }

        let free_set: BTreeSet<String> = free.iter().cloned().collect();
        prop_assert_eq!(free.len(), free_set.len(), "free values must be unique");
        prop_assert!(free_set.is_disjoint(&used));
        prop_assert_eq!(
            used.len() + free.len(),
            9 * 10usize.pow(digits as u32 - 1),
            "used and free must partition the keyspace"
        );

        for id in &used {
            prop_assert!(trie.lookup(id).unwrap().is_some());
        }
        for value in free.iter().take(50) {
            prop_assert!(trie.lookup(value).unwrap().is_none());
        }
    }

    #[test]
    fn prop_root_priority_order((digits, ids) in plan_strategy()) {
        let mut trie = DigitTrie::from_identifiers(&ids).unwrap();
        let seed = length_seed(digits);
        let free: Vec<String> = trie.available(Some(&seed)).unwrap().collect();

        // Every subtree is drained contiguously, so the stream groups by
        // first digit; explicit root branches come first ordered by used
        // descending (ties ascending), then absent digits ascending.
        let mut group_order: Vec<u8> = Vec::new();
        for value in &free {
            let d = value.as_bytes()[0] - b'0';
            if group_order.last() != Some(&d) {
                prop_assert!(
                    !group_order.contains(&d),
                    "first-digit group {} is not contiguous",
                    d
                );
                group_order.push(d);
            }
        }

        let root = &trie.nodes[NodeId::ROOT.idx()];
        let mut branches: Vec<u8> = (0..DIGITS as u8)
            .filter(|&d| !root.children[d as usize].is_nil())
            .collect();
        branches.sort_by_key(|&d| {
            let child = root.children[d as usize];
            (std::cmp::Reverse(trie.nodes[child.idx()].used), d)
        });
        let expected: Vec<u8> = branches
            .into_iter()
            .chain((1..DIGITS as u8).filter(|&d| root.children[d as usize].is_nil()))
            .filter(|d| group_order.contains(d))
            .collect();
        prop_assert_eq!(group_order, expected);
    }

    #[test]
    fn prop_walk_matches_inserted((_digits, ids) in plan_strategy()) {
        let trie = DigitTrie::from_identifiers(&ids).unwrap();
        let terminals: Vec<String> = trie
            .walk()
            .filter(|n| n.is_terminal())
            .map(|n| n.prefix().to_owned())
            .collect();

        // Pre-order with ascending digits yields terminals in sorted order,
        // and equal-length identifiers sort like integers.
        prop_assert_eq!(terminals, ids);
    }
}
