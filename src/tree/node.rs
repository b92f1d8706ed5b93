//! Tree Node
//!
//! One B+Tree node plus the structural algorithms that keep the tree
//! balanced: split on overflow, predecessor-replacement removal, and the
//! rotate-left / rotate-right / combine rebalance.
//!
//! Structural operations consume a snapshot of the node, edit it, and commit
//! every touched node back to the manager before returning or recursing.

use std::cmp::Ordering;
use std::mem;

use crate::error::{Result, RookError};

use super::manager::TreeNodeManager;
use super::KeyComparer;

/// A B+Tree node: ordered entries and, for internal nodes, child ids
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<K, V> {
    /// Id assigned by the node manager
    id: u32,

    /// 0 when this node is the root
    parent_id: u32,

    /// Sorted by the manager's key comparer
    entries: Vec<(K, V)>,

    /// Empty for leaves, otherwise `entries.len() + 1` child ids
    children: Vec<u32>,
}

impl<K, V> TreeNode<K, V> {
    pub fn new(id: u32, parent_id: u32, entries: Vec<(K, V)>, children: Vec<u32>) -> Self {
        Self {
            id,
            parent_id,
            entries,
            children,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Id of the parent node (0 = this node is the root)
    pub fn parent_id(&self) -> u32 {
        self.parent_id
    }

    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    pub fn children(&self) -> &[u32] {
        &self.children
    }

    pub fn entry(&self, index: usize) -> Option<&(K, V)> {
        self.entries.get(index)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_overflow(&self, max_entries: usize) -> bool {
        self.entries.len() > max_entries
    }

    /// Id of the child at `index`, or a corruption error if there is none
    pub fn child_id(&self, index: usize) -> Result<u32> {
        self.children.get(index).copied().ok_or_else(|| {
            RookError::Corruption(format!(
                "Node {} has no child at index {} ({} children)",
                self.id,
                index,
                self.children.len()
            ))
        })
    }

    /// Position of `child` in this node's child list
    pub fn child_position(&self, child: u32) -> Result<usize> {
        self.children
            .iter()
            .position(|&id| id == child)
            .ok_or_else(|| {
                RookError::Corruption(format!("Node {} is not a child of node {}", child, self.id))
            })
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Binary search by key; `Ok(index)` of some match or `Err(insertion point)`
    pub fn binary_search(
        &self,
        key: &K,
        comparer: &dyn KeyComparer<K>,
    ) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|(probe, _)| comparer.compare(probe, key))
    }

    /// Like `binary_search`, but a match is always the first occurrence
    pub fn binary_search_first(
        &self,
        key: &K,
        comparer: &dyn KeyComparer<K>,
    ) -> std::result::Result<usize, usize> {
        let index = self
            .entries
            .partition_point(|(probe, _)| comparer.compare(probe, key) == Ordering::Less);
        match self.entries.get(index) {
            Some((probe, _)) if comparer.compare(probe, key) == Ordering::Equal => Ok(index),
            _ => Err(index),
        }
    }

    /// Like `binary_search`, but a match is always the last occurrence
    pub fn binary_search_last(
        &self,
        key: &K,
        comparer: &dyn KeyComparer<K>,
    ) -> std::result::Result<usize, usize> {
        let index = self
            .entries
            .partition_point(|(probe, _)| comparer.compare(probe, key) != Ordering::Greater);
        match index.checked_sub(1).and_then(|last| self.entries.get(last)) {
            Some((probe, _)) if comparer.compare(probe, key) == Ordering::Equal => Ok(index - 1),
            _ => Err(index),
        }
    }
}

impl<K: Clone, V: Clone> TreeNode<K, V> {
    // =========================================================================
    // Insertion
    // =========================================================================

    /// Insert an entry at a position found by a prior binary search
    pub(crate) fn insert_as_leaf(&mut self, index: usize, entry: (K, V)) -> Result<()> {
        if !self.is_leaf() {
            return Err(RookError::InvalidArgument(format!(
                "Node {} is not a leaf",
                self.id
            )));
        }
        if index > self.entries.len() {
            return Err(RookError::OutOfRange(format!(
                "Insert index {} beyond {} entries",
                index,
                self.entries.len()
            )));
        }
        self.entries.insert(index, entry);
        Ok(())
    }

    /// Insert a promoted entry separating `left` (already a child) and `right`
    pub(crate) fn insert_as_parent(&mut self, entry: (K, V), left: u32, right: u32) -> Result<()> {
        let index = self.child_position(left)?;
        self.entries.insert(index, entry);
        self.children.insert(index + 1, right);
        Ok(())
    }

    /// Split an overflowing node around its middle entry
    ///
    /// The entry at `min_entries_per_node` moves up into the parent (or a new
    /// root), and everything after it moves into a new right sibling.
    pub(crate) fn split<M>(mut self, manager: &mut M) -> Result<()>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let half = manager.min_entries_per_node();
        if self.entries.len() <= half + 1 {
            return Err(RookError::InvalidArgument(format!(
                "Node {} is too small to split ({} entries)",
                self.id,
                self.entries.len()
            )));
        }

        let large_entries = self.entries.split_off(half + 1);
        let middle = self.entries.pop().ok_or_else(|| {
            RookError::Corruption(format!("Node {} lost its middle entry", self.id))
        })?;
        let large_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(half + 1)
        };

        let mut large = manager.create(large_entries, large_children)?;
        for &child_id in large.children() {
            let mut child = manager.find_existing(child_id)?;
            child.parent_id = large.id;
            manager.mark_as_changed(&child)?;
        }

        if self.parent_id == 0 {
            let root = manager.create_new_root(middle, self.id, large.id)?;
            self.parent_id = root.id;
            large.parent_id = root.id;
            manager.mark_as_changed(&self)?;
            manager.mark_as_changed(&large)?;
            tracing::debug!(
                "Split root {} with new sibling {} under new root {}",
                self.id,
                large.id,
                root.id
            );
            return Ok(());
        }

        let mut parent = manager.find_existing(self.parent_id)?;
        parent.insert_as_parent(middle, self.id, large.id)?;
        large.parent_id = parent.id;
        manager.mark_as_changed(&self)?;
        manager.mark_as_changed(&large)?;
        manager.mark_as_changed(&parent)?;

        if parent.is_overflow(manager.max_entries_per_node()) {
            parent.split(manager)?;
        }
        Ok(())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove the entry at `index`, rebalancing as needed
    pub(crate) fn remove<M>(mut self, manager: &mut M, index: usize) -> Result<()>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        if index >= self.entries.len() {
            return Err(RookError::OutOfRange(format!(
                "Entry index {} beyond {} entries in node {}",
                index,
                self.entries.len(),
                self.id
            )));
        }

        if self.is_leaf() {
            self.entries.remove(index);
            manager.mark_as_changed(&self)?;

            if self.parent_id != 0 && self.entries.len() < manager.min_entries_per_node() {
                self.fix_node(manager)?;
            }
            return Ok(());
        }

        // Replace with the predecessor, then remove the predecessor from its leaf
        let left = manager.find_existing(self.child_id(index)?)?;
        let (largest, largest_index) = left.find_largest(manager)?;
        self.entries[index] = largest.entries[largest_index].clone();
        manager.mark_as_changed(&self)?;

        largest.remove(manager, largest_index)
    }

    /// Leaf holding the largest entry of this subtree, with that entry's index
    pub fn find_largest<M>(self, manager: &mut M) -> Result<(TreeNode<K, V>, usize)>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let mut node = self;
        while !node.is_leaf() {
            let last = node.children.len() - 1;
            node = manager.find_existing(node.children[last])?;
        }

        match node.entries.len().checked_sub(1) {
            Some(index) => Ok((node, index)),
            None => Err(RookError::Corruption(format!(
                "Leaf {} below an internal node is empty",
                node.id
            ))),
        }
    }

    /// Leaf holding the smallest entry of this subtree, with that entry's index
    pub fn find_smallest<M>(self, manager: &mut M) -> Result<(TreeNode<K, V>, usize)>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let mut node = self;
        while !node.is_leaf() {
            node = manager.find_existing(node.children[0])?;
        }

        if node.entries.is_empty() {
            return Err(RookError::Corruption(format!(
                "Leaf {} below an internal node is empty",
                node.id
            )));
        }
        Ok((node, 0))
    }

    /// Position of this node among its parent's children
    pub fn index_in_parent<M>(&self, manager: &mut M) -> Result<usize>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let parent = manager.find_existing(self.parent_id)?;
        parent.child_position(self.id)
    }

    // =========================================================================
    // Rebalancing
    // =========================================================================

    /// Restore the minimum entry count of an underflowing non-root node
    fn fix_node<M>(self, manager: &mut M) -> Result<()>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let min = manager.min_entries_per_node();
        let parent = manager.find_existing(self.parent_id)?;
        let index = parent.child_position(self.id)?;

        let right = match parent.children.get(index + 1) {
            Some(&id) => Some(manager.find_existing(id)?),
            None => None,
        };
        let right = match right {
            Some(right) if right.entries.len() > min => {
                return self.rotate_left(manager, parent, index, right)
            }
            other => other,
        };

        let left = match index.checked_sub(1) {
            Some(left_index) => Some(manager.find_existing(parent.children[left_index])?),
            None => None,
        };
        let left = match left {
            Some(left) if left.entries.len() > min => {
                return self.rotate_right(manager, parent, index, left)
            }
            other => other,
        };

        match (right, left) {
            (Some(right), _) => Self::combine(manager, parent, index, self, right),
            (None, Some(left)) => Self::combine(manager, parent, index - 1, left, self),
            (None, None) => Err(RookError::Corruption(format!(
                "Node {} has no siblings under parent {}",
                self.id, parent.id
            ))),
        }
    }

    /// Borrow through the parent from the right sibling
    fn rotate_left<M>(
        mut self,
        manager: &mut M,
        mut parent: TreeNode<K, V>,
        index: usize,
        mut right: TreeNode<K, V>,
    ) -> Result<()>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let separator = mem::replace(&mut parent.entries[index], right.entries.remove(0));
        self.entries.push(separator);

        if !right.is_leaf() {
            let child_id = right.children.remove(0);
            let mut child = manager.find_existing(child_id)?;
            child.parent_id = self.id;
            manager.mark_as_changed(&child)?;
            self.children.push(child_id);
        }

        manager.mark_as_changed(&self)?;
        manager.mark_as_changed(&parent)?;
        manager.mark_as_changed(&right)
    }

    /// Borrow through the parent from the left sibling
    fn rotate_right<M>(
        mut self,
        manager: &mut M,
        mut parent: TreeNode<K, V>,
        index: usize,
        mut left: TreeNode<K, V>,
    ) -> Result<()>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let last = left.entries.pop().ok_or_else(|| {
            RookError::Corruption(format!("Left sibling {} is empty", left.id))
        })?;
        let separator = mem::replace(&mut parent.entries[index - 1], last);
        self.entries.insert(0, separator);

        if !left.is_leaf() {
            let child_id = left.children.pop().ok_or_else(|| {
                RookError::Corruption(format!("Left sibling {} has no children", left.id))
            })?;
            let mut child = manager.find_existing(child_id)?;
            child.parent_id = self.id;
            manager.mark_as_changed(&child)?;
            self.children.insert(0, child_id);
        }

        manager.mark_as_changed(&self)?;
        manager.mark_as_changed(&parent)?;
        manager.mark_as_changed(&left)
    }

    /// Merge `right` and the separating parent entry into `left`
    fn combine<M>(
        manager: &mut M,
        mut parent: TreeNode<K, V>,
        separator_index: usize,
        mut left: TreeNode<K, V>,
        right: TreeNode<K, V>,
    ) -> Result<()>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let separator = parent.entries.remove(separator_index);
        parent.children.remove(separator_index + 1);
        manager.delete(&right)?;

        for &child_id in &right.children {
            let mut child = manager.find_existing(child_id)?;
            child.parent_id = left.id;
            manager.mark_as_changed(&child)?;
        }

        left.entries.push(separator);
        left.entries.extend(right.entries);
        left.children.extend(right.children);

        if parent.parent_id == 0 && parent.entries.is_empty() {
            left.parent_id = 0;
            manager.mark_as_changed(&left)?;
            manager.make_root(&left)?;
            manager.delete(&parent)?;
            tracing::debug!("Collapsed root {} into {}", parent.id, left.id);
            return Ok(());
        }

        manager.mark_as_changed(&left)?;
        manager.mark_as_changed(&parent)?;

        if parent.parent_id != 0 && parent.entries.len() < manager.min_entries_per_node() {
            parent.fix_node(manager)?;
        }
        Ok(())
    }
}
