//! Tree traversal
//!
//! `TreeEnumerator` walks entries in key order one step at a time, climbing
//! to parents and descending into children by id. `TreeScanner` and
//! `TreeMatchScanner` wrap it as iterators over cloned entries.
//!
//! The enumerator's index always names the entry it last produced, so a
//! start index of `-1` (ascending) or `entry_count` (descending) makes the
//! first step land on the first real entry.

use std::cmp::Ordering;

use crate::error::{Result, RookError};

use super::manager::TreeNodeManager;
use super::node::TreeNode;
use super::Matcher;

/// Cursor over tree entries in ascending or descending key order
#[derive(Debug, Clone)]
pub struct TreeEnumerator<K, V> {
    /// Snapshot of the node holding the cursor
    node: TreeNode<K, V>,

    /// Last entry produced; may sit one step outside `node` before the first move
    index: isize,

    ascending: bool,

    /// Set once the walk runs off either end of the tree
    finished: bool,
}

impl<K: Clone, V: Clone> TreeEnumerator<K, V> {
    pub fn new(node: TreeNode<K, V>, start_index: isize, ascending: bool) -> Self {
        Self {
            node,
            index: start_index,
            ascending,
            finished: false,
        }
    }

    /// Advance to the next entry; false once the tree is exhausted
    pub fn move_next<M>(&mut self, manager: &mut M) -> Result<bool>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        if self.finished {
            return Ok(false);
        }

        let moved = if self.ascending {
            self.ascend(manager)?
        } else {
            self.descend(manager)?
        };
        if !moved {
            self.finished = true;
        }
        Ok(moved)
    }

    /// Entry at the current position
    pub fn current(&self) -> Option<&(K, V)> {
        if self.finished || self.index < 0 {
            return None;
        }
        self.node.entry(self.index as usize)
    }

    /// Node holding the current entry
    pub fn current_node(&self) -> &TreeNode<K, V> {
        &self.node
    }

    /// Index of the current entry within `current_node()`
    pub fn current_index(&self) -> usize {
        self.index.max(0) as usize
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn ascend<M>(&mut self, manager: &mut M) -> Result<bool>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        self.index += 1;

        if !self.node.is_leaf() {
            // Next entry is the smallest one right of the current entry
            let child_id = self.node.child_id(self.index as usize)?;
            let child = manager.find_existing(child_id)?;
            let (leaf, index) = child.find_smallest(manager)?;
            self.node = leaf;
            self.index = index as isize;
            return Ok(true);
        }

        loop {
            if self.index >= 0 && (self.index as usize) < self.node.entry_count() {
                return Ok(true);
            }
            if self.node.parent_id() == 0 {
                return Ok(false);
            }
            self.climb(manager)?;
        }
    }

    fn descend<M>(&mut self, manager: &mut M) -> Result<bool>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        if !self.node.is_leaf() {
            // Next entry is the largest one left of the current entry
            let child_id = self.node.child_id(self.index.max(0) as usize)?;
            let child = manager.find_existing(child_id)?;
            let (leaf, index) = child.find_largest(manager)?;
            self.node = leaf;
            self.index = index as isize;
            return Ok(true);
        }

        self.index -= 1;
        loop {
            if self.index >= 0 && (self.index as usize) < self.node.entry_count() {
                return Ok(true);
            }
            if self.node.parent_id() == 0 {
                return Ok(false);
            }
            self.climb(manager)?;
            self.index -= 1;
        }
    }

    /// Move to the parent, positioned at the child this node hangs from
    fn climb<M>(&mut self, manager: &mut M) -> Result<()>
    where
        M: TreeNodeManager<K, V> + ?Sized,
    {
        let parent = manager.find_existing(self.node.parent_id())?;
        let position = parent.child_position(self.node.id())?;
        self.index = isize::try_from(position)
            .map_err(|_| RookError::Corruption(format!("Child index {} overflows", position)))?;
        self.node = parent;
        Ok(())
    }
}

/// Iterator over tree entries, optionally limited to one key
pub struct TreeScanner<'a, K, V, M: ?Sized> {
    manager: &'a mut M,
    enumerator: TreeEnumerator<K, V>,

    /// Exact-match key; the scan ends at the first entry with another key
    stop_at: Option<K>,

    done: bool,
}

impl<'a, K, V, M> TreeScanner<'a, K, V, M>
where
    K: Clone,
    V: Clone,
    M: TreeNodeManager<K, V> + ?Sized,
{
    pub fn new(manager: &'a mut M, enumerator: TreeEnumerator<K, V>) -> Self {
        Self {
            manager,
            enumerator,
            stop_at: None,
            done: false,
        }
    }

    /// Stop at the first entry whose key differs from `key`
    pub fn stop_at(mut self, key: K) -> Self {
        self.stop_at = Some(key);
        self
    }
}

impl<'a, K, V, M> Iterator for TreeScanner<'a, K, V, M>
where
    K: Clone,
    V: Clone,
    M: TreeNodeManager<K, V> + ?Sized,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.enumerator.move_next(&mut *self.manager) {
            Ok(true) => {}
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        }

        let Some(entry) = self.enumerator.current().cloned() else {
            self.done = true;
            return None;
        };

        if let Some(key) = &self.stop_at {
            if self.manager.key_comparer().compare(&entry.0, key) != Ordering::Equal {
                self.done = true;
                return None;
            }
        }

        Some(Ok(entry))
    }
}

/// Iterator over the entries whose keys satisfy a matcher
pub struct TreeMatchScanner<'a, K, V, M: ?Sized> {
    inner: TreeScanner<'a, K, V, M>,
    matcher: Box<dyn Matcher<K> + 'a>,
}

impl<'a, K, V, M> TreeMatchScanner<'a, K, V, M>
where
    K: Clone,
    V: Clone,
    M: TreeNodeManager<K, V> + ?Sized,
{
    pub fn new(inner: TreeScanner<'a, K, V, M>, matcher: Box<dyn Matcher<K> + 'a>) -> Self {
        Self { inner, matcher }
    }
}

impl<'a, K, V, M> Iterator for TreeMatchScanner<'a, K, V, M>
where
    K: Clone,
    V: Clone,
    M: TreeNodeManager<K, V> + ?Sized,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(entry) if !self.matcher.is_match(&entry.0) => continue,
                other => return Some(other),
            }
        }
    }
}
