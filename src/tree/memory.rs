//! In-memory tree node manager
//!
//! Plain id → node map with no persistence. Ids start at 1; 0 means "no
//! parent" and is never assigned.

use std::collections::HashMap;

use crate::error::{Result, RookError};

use super::manager::TreeNodeManager;
use super::node::TreeNode;
use super::{KeyComparer, NaturalOrder};

/// Node manager keeping the whole tree in a map
pub struct MemoryTreeNodeManager<K, V> {
    /// The single current copy of every live node
    nodes: HashMap<u32, TreeNode<K, V>>,

    /// Next id to hand out; ids are never reused
    next_id: u32,

    /// Id of the root node; always present in `nodes`
    root_id: u32,

    min_entries_per_node: usize,
    comparer: Box<dyn KeyComparer<K>>,
}

impl<K: Clone, V: Clone> MemoryTreeNodeManager<K, V> {
    /// Create a manager holding a single empty root
    pub fn new<C>(min_entries_per_node: usize, comparer: C) -> Result<Self>
    where
        C: KeyComparer<K> + 'static,
    {
        if min_entries_per_node == 0 {
            return Err(RookError::Config(
                "min_entries_per_node must be at least 1".to_string(),
            ));
        }

        let mut manager = Self {
            nodes: HashMap::new(),
            next_id: 1,
            root_id: 0,
            min_entries_per_node,
            comparer: Box::new(comparer),
        };
        let root = manager.create(Vec::new(), Vec::new())?;
        manager.make_root(&root)?;
        Ok(manager)
    }

    /// Number of nodes currently in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl<K: Ord + Clone, V: Clone> MemoryTreeNodeManager<K, V> {
    /// Create a manager ordering keys by `Ord`
    pub fn with_natural_order(min_entries_per_node: usize) -> Result<Self> {
        Self::new(min_entries_per_node, NaturalOrder)
    }
}

impl<K: Clone, V: Clone> TreeNodeManager<K, V> for MemoryTreeNodeManager<K, V> {
    fn min_entries_per_node(&self) -> usize {
        self.min_entries_per_node
    }

    fn key_comparer(&self) -> &dyn KeyComparer<K> {
        self.comparer.as_ref()
    }

    fn root_id(&self) -> u32 {
        self.root_id
    }

    fn create(&mut self, entries: Vec<(K, V)>, children: Vec<u32>) -> Result<TreeNode<K, V>> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(|| {
            RookError::OutOfRange("Tree node id space exhausted".to_string())
        })?;

        let node = TreeNode::new(id, 0, entries, children);
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn find(&mut self, id: u32) -> Result<Option<TreeNode<K, V>>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn make_root(&mut self, node: &TreeNode<K, V>) -> Result<()> {
        self.root_id = node.id();
        Ok(())
    }

    fn mark_as_changed(&mut self, node: &TreeNode<K, V>) -> Result<()> {
        self.nodes.insert(node.id(), node.clone());
        Ok(())
    }

    fn delete(&mut self, node: &TreeNode<K, V>) -> Result<()> {
        self.nodes.remove(&node.id());
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}
