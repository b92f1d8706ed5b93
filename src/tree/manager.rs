//! Tree node manager contract
//!
//! A manager owns node identity, storage, and the root pointer. Nodes are
//! handed out as snapshots; a snapshot edited by structural code becomes the
//! manager's copy again only through `mark_as_changed`.

use crate::error::{Result, RookError};

use super::node::TreeNode;
use super::KeyComparer;

pub trait TreeNodeManager<K, V> {
    /// Minimum entries every non-root node keeps after rebalancing
    fn min_entries_per_node(&self) -> usize;

    /// Entries a node may hold before it splits
    fn max_entries_per_node(&self) -> usize {
        2 * self.min_entries_per_node()
    }

    /// Order used for searching and for exact-match termination
    fn key_comparer(&self) -> &dyn KeyComparer<K>;

    /// Id of the current root node
    fn root_id(&self) -> u32;

    /// Snapshot of the current root node
    fn root_node(&mut self) -> Result<TreeNode<K, V>> {
        let root_id = self.root_id();
        self.find_existing(root_id)
    }

    /// Reject an entry that could not be stored in a full node
    ///
    /// Managers without a node size limit accept everything.
    fn check_entry(&self, _key: &K, _value: &V) -> Result<()> {
        Ok(())
    }

    /// Allocate a new parentless node holding `entries` and `children`
    fn create(&mut self, entries: Vec<(K, V)>, children: Vec<u32>) -> Result<TreeNode<K, V>>;

    /// Snapshot of node `id`, or None if no such node exists
    fn find(&mut self, id: u32) -> Result<Option<TreeNode<K, V>>>;

    /// Snapshot of node `id`; a missing node is corruption
    fn find_existing(&mut self, id: u32) -> Result<TreeNode<K, V>> {
        self.find(id)?
            .ok_or_else(|| RookError::Corruption(format!("Tree node not found with id: {}", id)))
    }

    /// Create a root with one entry and two children, and make it the root
    fn create_new_root(&mut self, entry: (K, V), left: u32, right: u32) -> Result<TreeNode<K, V>> {
        let root = self.create(vec![entry], vec![left, right])?;
        self.make_root(&root)?;
        Ok(root)
    }

    /// Point the tree's root at `node`
    fn make_root(&mut self, node: &TreeNode<K, V>) -> Result<()>;

    /// Commit an edited snapshot as the manager's copy of that node
    fn mark_as_changed(&mut self, node: &TreeNode<K, V>) -> Result<()>;

    /// Drop `node` from the tree
    fn delete(&mut self, node: &TreeNode<K, V>) -> Result<()>;

    /// Persist every changed node
    fn save(&mut self) -> Result<()>;
}
