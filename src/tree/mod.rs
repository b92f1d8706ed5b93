//! Tree Module
//!
//! B+Tree index whose nodes live in a node manager and reference each other
//! by id only.
//!
//! ## Node Shape
//! ```text
//!                 ┌───────────────────────┐
//!                 │ [k3]          [k7]    │   internal: entries + (entries+1) children
//!                 └──┬───────┬────────┬───┘
//!                    │       │        │
//!          ┌─────────▼┐ ┌────▼─────┐ ┌▼─────────┐
//!          │ k1 k2    │ │ k4 k5 k6 │ │ k8 k9    │  leaves: entries only
//!          └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! ## Responsibilities
//! - Keep entries ordered by the manager's key comparer
//! - Split nodes above `2 × min_entries_per_node` entries
//! - Rebalance (rotate left, rotate right, combine) below the minimum
//! - Persist nodes as records (`DiskTreeNodeManager`) or keep them in a map
//!   (`MemoryTreeNodeManager`)
//!
//! ## Node Ownership
//! The manager owns the one authoritative copy of every node. Lookups hand
//! out snapshots; structural code edits a snapshot and commits it back with
//! `TreeNodeManager::mark_as_changed`.

mod codec;
mod disk;
mod index;
mod manager;
mod memory;
mod node;
mod scanner;

pub use codec::{NodeCodec, MAX_NODE_SIZE};
pub use disk::{DiskTreeNodeManager, ROOT_RECORD_ID};
pub use index::{EntryIter, IndexTree, OrderedIndex};
pub use manager::TreeNodeManager;
pub use memory::MemoryTreeNodeManager;
pub use node::TreeNode;
pub use scanner::{TreeEnumerator, TreeMatchScanner, TreeScanner};

use std::cmp::Ordering;

/// Total order over keys
pub trait KeyComparer<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their `Ord` implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<K: Ord> KeyComparer<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

impl<K, F> KeyComparer<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// Key predicate for filtered scans
pub trait Matcher<K> {
    fn is_match(&self, key: &K) -> bool;
}

impl<K, F> Matcher<K> for F
where
    F: Fn(&K) -> bool,
{
    fn is_match(&self, key: &K) -> bool {
        self(key)
    }
}
