//! Shared helpers for integration tests

#![allow(dead_code)]

use rookdb::tree::{TreeNode, TreeNodeManager};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring RUST_LOG (safe to call repeatedly)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Walk the whole tree, asserting structural invariants, and return keys in order
pub fn check_tree<M: TreeNodeManager<u32, u32>>(manager: &mut M) -> Vec<u32> {
    let root = manager.root_node().unwrap();
    assert_eq!(root.parent_id(), 0, "root must not have a parent");

    let mut keys = Vec::new();
    check_node(manager, &root, None, None, &mut keys);
    keys
}

fn check_node<M: TreeNodeManager<u32, u32>>(
    manager: &mut M,
    node: &TreeNode<u32, u32>,
    lower: Option<u32>,
    upper: Option<u32>,
    keys: &mut Vec<u32>,
) {
    let min = manager.min_entries_per_node();
    let max = manager.max_entries_per_node();

    assert!(node.entry_count() <= max, "node {} overflows", node.id());
    if node.parent_id() != 0 {
        assert!(
            node.entry_count() >= min,
            "node {} underflows with {} entries",
            node.id(),
            node.entry_count()
        );
    }

    for window in node.entries().windows(2) {
        assert!(window[0].0 <= window[1].0, "node {} is unsorted", node.id());
    }
    for (key, _) in node.entries() {
        if let Some(lower) = lower {
            assert!(*key >= lower, "key {} below separator {}", key, lower);
        }
        if let Some(upper) = upper {
            assert!(*key <= upper, "key {} above separator {}", key, upper);
        }
    }

    if node.is_leaf() {
        keys.extend(node.entries().iter().map(|(k, _)| *k));
        return;
    }

    assert_eq!(node.child_count(), node.entry_count() + 1);
    for (i, &child_id) in node.children().iter().enumerate() {
        let child = manager.find_existing(child_id).unwrap();
        assert_eq!(child.parent_id(), node.id(), "child {} has wrong parent", child_id);

        let child_lower = if i == 0 { lower } else { Some(node.entries()[i - 1].0) };
        let child_upper = if i == node.entry_count() { upper } else { Some(node.entries()[i].0) };
        check_node(manager, &child, child_lower, child_upper, keys);

        if i < node.entry_count() {
            keys.push(node.entries()[i].0);
        }
    }
}
