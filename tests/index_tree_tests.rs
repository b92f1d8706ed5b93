//! Tests for IndexTree over the memory node manager
//!
//! These tests verify:
//! - Ordered scans in both directions
//! - Unique-key enforcement and the delete overload rules
//! - Duplicate-key exact matches and value deletes
//! - Matcher-filtered scans and the OrderedIndex trait

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rookdb::tree::{IndexTree, Matcher, MemoryTreeNodeManager, OrderedIndex};
use rookdb::{Result, RookError};

// =============================================================================
// Helper Functions
// =============================================================================

type CharTree = IndexTree<u32, char, MemoryTreeNodeManager<u32, char>>;

fn char_tree(min_entries: usize, duplicates: bool) -> CharTree {
    IndexTree::new(
        MemoryTreeNodeManager::with_natural_order(min_entries).unwrap(),
        duplicates,
    )
}

/// Keys [1,1,2,3,3,3] with values [a..f] in duplicate mode
fn duplicate_sample(min_entries: usize) -> CharTree {
    let mut tree = char_tree(min_entries, true);
    for (key, value) in [(1, 'a'), (1, 'b'), (2, 'c'), (3, 'd'), (3, 'e'), (3, 'f')] {
        tree.insert(key, value).unwrap();
    }
    tree
}

fn collect<I: Iterator<Item = Result<(u32, char)>>>(iter: I) -> Vec<(u32, char)> {
    iter.collect::<Result<Vec<_>>>().unwrap()
}

fn sorted_values(entries: &[(u32, char)]) -> Vec<char> {
    let mut values: Vec<char> = entries.iter().map(|(_, v)| *v).collect();
    values.sort_unstable();
    values
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_empty_tree() {
    let mut tree = char_tree(2, false);

    assert!(collect(tree.get_all(true).unwrap()).is_empty());
    assert!(collect(tree.get_all(false).unwrap()).is_empty());
    assert_eq!(tree.get(&1).unwrap(), None);
    assert!(!tree.delete(&1).unwrap());
}

#[test]
fn test_get_all_orders_keys() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut tree = IndexTree::new(
        MemoryTreeNodeManager::<u32, u32>::with_natural_order(3).unwrap(),
        true,
    );
    for i in 0..300 {
        tree.insert(rng.random_range(0..100), i).unwrap();
    }

    let ascending: Vec<u32> = tree
        .get_all(true)
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect();
    let descending: Vec<u32> = tree
        .get_all(false)
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect();

    assert_eq!(ascending.len(), 300);
    assert!(ascending.windows(2).all(|w| w[0] <= w[1]));
    assert!(descending.windows(2).all(|w| w[0] >= w[1]));

    let mut reversed = descending.clone();
    reversed.reverse();
    assert_eq!(ascending, reversed);
}

#[test]
fn test_get_returns_value() {
    let mut tree = char_tree(2, false);
    for (i, c) in ('a'..='z').enumerate() {
        tree.insert(i as u32, c).unwrap();
    }

    assert_eq!(tree.get(&0).unwrap(), Some((0, 'a')));
    assert_eq!(tree.get(&25).unwrap(), Some((25, 'z')));
    assert_eq!(tree.get(&26).unwrap(), None);
}

// =============================================================================
// Unique-Key Tests
// =============================================================================

#[test]
fn test_unique_violation_leaves_tree_unchanged() {
    let mut tree = char_tree(2, false);
    for key in 1..=10 {
        tree.insert(key, 'x').unwrap();
    }
    let before = collect(tree.get_all(true).unwrap());

    let err = tree.insert(5, 'y').unwrap_err();

    assert!(matches!(err, RookError::DuplicateKey(ref key) if key == "5"));
    assert_eq!(collect(tree.get_all(true).unwrap()), before);
    assert_eq!(tree.get(&5).unwrap(), Some((5, 'x')));
}

#[test]
fn test_delete_overloads_match_key_mode() {
    let mut unique = char_tree(2, false);
    unique.insert(1, 'a').unwrap();
    assert!(matches!(
        unique.delete_value(&1, &'a'),
        Err(RookError::Unsupported(_))
    ));

    let mut duplicates = char_tree(2, true);
    duplicates.insert(1, 'a').unwrap();
    assert!(matches!(duplicates.delete(&1), Err(RookError::Unsupported(_))));
}

#[test]
fn test_unique_delete() {
    let mut tree = char_tree(2, false);
    for key in 1..=20 {
        tree.insert(key, 'v').unwrap();
    }

    assert!(tree.delete(&7).unwrap());
    assert!(!tree.delete(&7).unwrap());
    assert_eq!(tree.get(&7).unwrap(), None);
    assert_eq!(collect(tree.get_all(true).unwrap()).len(), 19);
}

// =============================================================================
// Duplicate-Key Tests
// =============================================================================

#[test]
fn test_exact_match_ascending() {
    for min_entries in [1, 2, 3] {
        let mut tree = duplicate_sample(min_entries);
        tree.insert(4, 'g').unwrap();

        let threes = collect(tree.get_exact_match(&3, true).unwrap());
        assert!(threes.iter().all(|(k, _)| *k == 3), "min {}", min_entries);
        assert_eq!(sorted_values(&threes), vec!['d', 'e', 'f']);

        let ones = collect(tree.get_exact_match(&1, true).unwrap());
        assert_eq!(sorted_values(&ones), vec!['a', 'b']);
    }
}

#[test]
fn test_exact_match_descending() {
    for min_entries in [1, 2, 3] {
        let mut tree = duplicate_sample(min_entries);
        tree.insert(0, 'z').unwrap();

        let threes = collect(tree.get_exact_match(&3, false).unwrap());
        assert_eq!(sorted_values(&threes), vec!['d', 'e', 'f']);

        let twos = collect(tree.get_exact_match(&2, false).unwrap());
        assert_eq!(twos, vec![(2, 'c')]);
    }
}

#[test]
fn test_exact_match_missing_key() {
    let mut tree = duplicate_sample(2);

    assert!(collect(tree.get_exact_match(&4, true).unwrap()).is_empty());
    assert!(collect(tree.get_exact_match(&0, false).unwrap()).is_empty());
}

#[test]
fn test_get_with_duplicates_finds_internal_entry() {
    // With min 2 the sample splits and promotes key 2 into the root
    let mut tree = duplicate_sample(2);

    assert_eq!(tree.get(&2).unwrap(), Some((2, 'c')));
    let three = tree.get(&3).unwrap().unwrap();
    assert_eq!(three.0, 3);
}

#[test]
fn test_delete_value_removes_matching_entries() {
    let mut tree = duplicate_sample(1);
    tree.insert(3, 'd').unwrap();

    assert!(tree.delete_value(&3, &'d').unwrap());
    let threes = collect(tree.get_exact_match(&3, true).unwrap());
    assert_eq!(sorted_values(&threes), vec!['e', 'f']);

    assert!(!tree.delete_value(&3, &'d').unwrap());
    assert!(!tree.delete_value(&9, &'d').unwrap());
    assert_eq!(collect(tree.get_all(true).unwrap()).len(), 5);
}

#[test]
fn test_delete_value_by_custom_equality() {
    let mut tree = duplicate_sample(2);

    let removed = tree
        .delete_value_by(&1, &'A', |a, b| a.eq_ignore_ascii_case(b))
        .unwrap();

    assert!(removed);
    let ones = collect(tree.get_exact_match(&1, true).unwrap());
    assert_eq!(ones, vec![(1, 'b')]);
}

#[test]
fn test_duplicate_heavy_workload_stays_consistent() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut tree = IndexTree::new(
        MemoryTreeNodeManager::<u32, u32>::with_natural_order(2).unwrap(),
        true,
    );
    let mut expected: Vec<(u32, u32)> = Vec::new();

    for value in 0..200 {
        let key = rng.random_range(0..10);
        tree.insert(key, value).unwrap();
        expected.push((key, value));
    }
    for value in (0..200).step_by(3) {
        let key = expected.iter().find(|(_, v)| *v == value).unwrap().0;
        assert!(tree.delete_value(&key, &value).unwrap());
        expected.retain(|(_, v)| *v != value);
    }

    let keys = common::check_tree(tree.manager_mut());
    let mut expected_keys: Vec<u32> = expected.iter().map(|(k, _)| *k).collect();
    expected_keys.sort_unstable();
    assert_eq!(keys, expected_keys);

    for key in 0..10 {
        let mut found: Vec<u32> = tree
            .get_exact_match(&key, true)
            .unwrap()
            .map(|entry| entry.unwrap().1)
            .collect();
        found.sort_unstable();
        let mut wanted: Vec<u32> = expected
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .collect();
        wanted.sort_unstable();
        assert_eq!(found, wanted, "key {}", key);
    }
}

// =============================================================================
// Matcher Tests
// =============================================================================

#[test]
fn test_option_match_filters_whole_tree() {
    let mut tree = IndexTree::new(
        MemoryTreeNodeManager::<u32, u32>::with_natural_order(2).unwrap(),
        false,
    );
    for key in 1..=20 {
        tree.insert(key, key).unwrap();
    }

    let evens: Vec<u32> = tree
        .get_option_match(true, |key: &u32| key % 2 == 0)
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(evens, (2..=20).step_by(2).collect::<Vec<_>>());

    let evens_desc: Vec<u32> = tree
        .get_option_match(false, |key: &u32| key % 2 == 0)
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(evens_desc, (2..=20).rev().step_by(2).collect::<Vec<_>>());
}

struct Between(u32, u32);

impl Matcher<u32> for Between {
    fn is_match(&self, key: &u32) -> bool {
        (self.0..=self.1).contains(key)
    }
}

#[test]
fn test_ordered_index_trait_object() {
    let mut tree = IndexTree::new(
        MemoryTreeNodeManager::<u32, u32>::with_natural_order(2).unwrap(),
        false,
    );
    let index: &mut dyn OrderedIndex<u32, u32> = &mut tree;

    for key in (1..=30).rev() {
        index.insert(key, key * 2).unwrap();
    }
    assert_eq!(index.get(&15).unwrap(), Some((15, 30)));
    assert!(index.delete(&15).unwrap());

    let matched: Vec<u32> = index
        .get_option_match(true, Box::new(Between(10, 20)))
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(matched, vec![10, 11, 12, 13, 14, 16, 17, 18, 19, 20]);

    let exact: Vec<(u32, u32)> = index
        .get_exact_match(&20, false)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(exact, vec![(20, 40)]);
}

#[test]
fn test_ordered_index_delete_with_comparer() {
    let mut tree = duplicate_sample(2);
    let index: &mut dyn OrderedIndex<u32, char> = &mut tree;

    let removed = index
        .delete_value_by(&3, &'E', &|a: &char, b: &char| a.eq_ignore_ascii_case(b))
        .unwrap();
    assert!(removed);
    assert!(index.delete_value(&3, &'d').unwrap());

    let threes = collect(index.get_exact_match(&3, true).unwrap());
    assert_eq!(threes, vec![(3, 'f')]);
    assert!(matches!(
        index.delete(&3),
        Err(RookError::Unsupported(_))
    ));
}

/// Value type with no `PartialEq`, compared only through a closure
#[derive(Debug, Clone)]
struct Payload {
    tag: &'static str,
}

#[test]
fn test_ordered_index_without_value_equality() {
    let mut tree: IndexTree<u32, Payload, _> = IndexTree::new(
        MemoryTreeNodeManager::with_natural_order(2).unwrap(),
        true,
    );
    let index: &mut dyn OrderedIndex<u32, Payload> = &mut tree;
    for (key, tag) in [(1, "x"), (1, "y"), (2, "x")] {
        index.insert(key, Payload { tag }).unwrap();
    }

    let same_tag = |a: &Payload, b: &Payload| a.tag == b.tag;
    assert!(index
        .delete_value_by(&1, &Payload { tag: "x" }, &same_tag)
        .unwrap());

    let tags: Vec<&str> = index
        .get_all(true)
        .unwrap()
        .map(|entry| entry.unwrap().1.tag)
        .collect();
    assert_eq!(tags, vec!["y", "x"]);
}
