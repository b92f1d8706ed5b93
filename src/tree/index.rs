//! Index Tree
//!
//! Ordered index over a `TreeNodeManager`, with unique or duplicate keys.
//!
//! ## Operations
//! - `insert`: descend to a leaf, insert, split on overflow, save
//! - `delete` / `delete_value`: remove entries, rebalancing on underflow
//! - `get`, `get_all`, `get_exact_match`, `get_option_match`: lookups and
//!   lazy scans in either direction

use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::error::{Result, RookError};

use super::manager::TreeNodeManager;
use super::node::TreeNode;
use super::scanner::{TreeEnumerator, TreeMatchScanner, TreeScanner};
use super::Matcher;

/// Boxed lazy sequence of index entries
pub type EntryIter<'a, K, V> = Box<dyn Iterator<Item = Result<(K, V)>> + 'a>;

/// Ordered key/value index contract
pub trait OrderedIndex<K, V> {
    fn insert(&mut self, key: K, value: V) -> Result<()>;

    /// Remove the entry with `key` (unique-key indexes only)
    fn delete(&mut self, key: &K) -> Result<bool>;

    /// Remove every entry with `key` whose value `eq` accepts (duplicate-key indexes only)
    fn delete_value_by(
        &mut self,
        key: &K,
        value: &V,
        eq: &dyn Fn(&V, &V) -> bool,
    ) -> Result<bool>;

    /// Remove every entry with `key` and `value` (duplicate-key indexes only)
    fn delete_value(&mut self, key: &K, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.delete_value_by(key, value, &|a: &V, b: &V| a == b)
    }

    fn get(&mut self, key: &K) -> Result<Option<(K, V)>>;

    fn get_all(&mut self, ascending: bool) -> Result<EntryIter<'_, K, V>>;

    fn get_exact_match(&mut self, key: &K, ascending: bool) -> Result<EntryIter<'_, K, V>>;

    fn get_option_match<'a>(
        &'a mut self,
        ascending: bool,
        matcher: Box<dyn Matcher<K> + 'a>,
    ) -> Result<EntryIter<'a, K, V>>;
}

/// B+Tree index over a node manager
pub struct IndexTree<K, V, M> {
    /// Owns every node and the root pointer
    manager: M,

    /// When false, inserting an existing key fails with `DuplicateKey`
    allow_duplicate_keys: bool,

    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, M> IndexTree<K, V, M>
where
    K: Clone + Debug,
    V: Clone,
    M: TreeNodeManager<K, V>,
{
    pub fn new(manager: M, allow_duplicate_keys: bool) -> Self {
        Self {
            manager,
            allow_duplicate_keys,
            _marker: PhantomData,
        }
    }

    pub fn allows_duplicate_keys(&self) -> bool {
        self.allow_duplicate_keys
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut M {
        &mut self.manager
    }

    pub fn into_manager(self) -> M {
        self.manager
    }

    /// Insert an entry
    ///
    /// With unique keys an existing key fails with `DuplicateKey`, and an entry
    /// too large for the manager's nodes fails with `NodeTooLarge`, both before
    /// the tree is touched.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        self.manager.check_entry(&key, &value)?;
        let mut node = self.manager.root_node()?;

        let index = loop {
            let search = node.binary_search(&key, self.manager.key_comparer());
            if search.is_ok() && !self.allow_duplicate_keys {
                return Err(RookError::DuplicateKey(format!("{:?}", key)));
            }

            let index = search.unwrap_or_else(|insert_at| insert_at);
            if node.is_leaf() {
                break index;
            }
            node = self.manager.find_existing(node.child_id(index)?)?;
        };

        node.insert_as_leaf(index, (key, value))?;
        self.manager.mark_as_changed(&node)?;

        if node.is_overflow(self.manager.max_entries_per_node()) {
            node.split(&mut self.manager)?;
        }

        self.manager.save()
    }

    /// Remove the entry with `key`; unique-key indexes only
    ///
    /// Returns whether an entry was removed.
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        if self.allow_duplicate_keys {
            return Err(RookError::Unsupported(
                "delete(key) requires unique keys; use delete_value".to_string(),
            ));
        }

        let Some((node, index)) = self.locate(key)? else {
            return Ok(false);
        };
        node.remove(&mut self.manager, index)?;
        self.manager.save()?;
        Ok(true)
    }

    /// Remove every entry matching `key` and `value`; duplicate-key indexes only
    pub fn delete_value(&mut self, key: &K, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.delete_value_by(key, value, |a, b| a == b)
    }

    /// Like `delete_value`, comparing values with `eq`
    ///
    /// Each removal restructures the tree, so the exact-match scan restarts
    /// from the top after every removal until a pass finds nothing.
    pub fn delete_value_by<F>(&mut self, key: &K, value: &V, eq: F) -> Result<bool>
    where
        F: Fn(&V, &V) -> bool,
    {
        if !self.allow_duplicate_keys {
            return Err(RookError::Unsupported(
                "delete_value requires duplicate keys; use delete".to_string(),
            ));
        }

        let mut deleted = false;
        loop {
            let mut enumerator = self.exact_match_start(key, true)?;
            let mut target = None;

            while enumerator.move_next(&mut self.manager)? {
                let Some((entry_key, entry_value)) = enumerator.current() else {
                    break;
                };
                if self.manager.key_comparer().compare(entry_key, key) != Ordering::Equal {
                    break;
                }
                if eq(entry_value, value) {
                    target = Some((enumerator.current_node().clone(), enumerator.current_index()));
                    break;
                }
            }

            let Some((node, index)) = target else {
                break;
            };
            node.remove(&mut self.manager, index)?;
            deleted = true;
        }

        self.manager.save()?;
        Ok(deleted)
    }

    /// Find an entry with `key`
    ///
    /// With duplicate keys this returns one of the matching entries.
    pub fn get(&mut self, key: &K) -> Result<Option<(K, V)>> {
        Ok(self
            .locate(key)?
            .and_then(|(node, index)| node.entry(index).cloned()))
    }

    /// Every entry in key order
    pub fn get_all(&mut self, ascending: bool) -> Result<TreeScanner<'_, K, V, M>> {
        let enumerator = self.edge_start(ascending)?;
        Ok(TreeScanner::new(&mut self.manager, enumerator))
    }

    /// Every entry whose key equals `key`
    pub fn get_exact_match(
        &mut self,
        key: &K,
        ascending: bool,
    ) -> Result<TreeScanner<'_, K, V, M>> {
        let enumerator = self.exact_match_start(key, ascending)?;
        Ok(TreeScanner::new(&mut self.manager, enumerator).stop_at(key.clone()))
    }

    /// Every entry whose key satisfies `matcher`, scanning the whole tree
    pub fn get_option_match<'a, T>(
        &'a mut self,
        ascending: bool,
        matcher: T,
    ) -> Result<TreeMatchScanner<'a, K, V, M>>
    where
        T: Matcher<K> + 'a,
    {
        let enumerator = self.edge_start(ascending)?;
        Ok(TreeMatchScanner::new(
            TreeScanner::new(&mut self.manager, enumerator),
            Box::new(matcher),
        ))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Node and index of some entry with `key`, searching from the root
    fn locate(&mut self, key: &K) -> Result<Option<(TreeNode<K, V>, usize)>> {
        let mut node = self.manager.root_node()?;
        loop {
            match node.binary_search(key, self.manager.key_comparer()) {
                Ok(index) => return Ok(Some((node, index))),
                Err(_) if node.is_leaf() => return Ok(None),
                Err(index) => node = self.manager.find_existing(node.child_id(index)?)?,
            }
        }
    }

    /// Enumerator positioned just outside the first or last leaf
    fn edge_start(&mut self, ascending: bool) -> Result<TreeEnumerator<K, V>> {
        let mut node = self.manager.root_node()?;
        while !node.is_leaf() {
            let child = if ascending {
                node.child_id(0)?
            } else {
                node.child_id(node.child_count() - 1)?
            };
            node = self.manager.find_existing(child)?;
        }

        let start = if ascending {
            -1
        } else {
            node.entry_count() as isize
        };
        Ok(TreeEnumerator::new(node, start, ascending))
    }

    /// Enumerator positioned just before the first (or after the last) `key`
    fn exact_match_start(&mut self, key: &K, ascending: bool) -> Result<TreeEnumerator<K, V>> {
        let mut node = self.manager.root_node()?;
        loop {
            let comparer = self.manager.key_comparer();
            let search = if ascending {
                node.binary_search_first(key, comparer)
            } else {
                node.binary_search_last(key, comparer)
            };

            if node.is_leaf() {
                let start = match search {
                    Ok(index) | Err(index) if ascending => index as isize - 1,
                    Ok(index) => index as isize + 1,
                    Err(index) => index as isize,
                };
                return Ok(TreeEnumerator::new(node, start, ascending));
            }

            // Duplicates of an internal entry can sit in the subtree on its
            // left (ascending) or its right (descending)
            let child = match search {
                Ok(index) if !ascending => index + 1,
                Ok(index) | Err(index) => index,
            };
            node = self.manager.find_existing(node.child_id(child)?)?;
        }
    }
}

impl<K, V, M> OrderedIndex<K, V> for IndexTree<K, V, M>
where
    K: Clone + Debug,
    V: Clone,
    M: TreeNodeManager<K, V>,
{
    fn insert(&mut self, key: K, value: V) -> Result<()> {
        IndexTree::insert(self, key, value)
    }

    fn delete(&mut self, key: &K) -> Result<bool> {
        IndexTree::delete(self, key)
    }

    fn delete_value_by(
        &mut self,
        key: &K,
        value: &V,
        eq: &dyn Fn(&V, &V) -> bool,
    ) -> Result<bool> {
        IndexTree::delete_value_by(self, key, value, eq)
    }

    fn get(&mut self, key: &K) -> Result<Option<(K, V)>> {
        IndexTree::get(self, key)
    }

    fn get_all(&mut self, ascending: bool) -> Result<EntryIter<'_, K, V>> {
        Ok(Box::new(IndexTree::get_all(self, ascending)?))
    }

    fn get_exact_match(&mut self, key: &K, ascending: bool) -> Result<EntryIter<'_, K, V>> {
        Ok(Box::new(IndexTree::get_exact_match(self, key, ascending)?))
    }

    fn get_option_match<'a>(
        &'a mut self,
        ascending: bool,
        matcher: Box<dyn Matcher<K> + 'a>,
    ) -> Result<EntryIter<'a, K, V>> {
        let enumerator = self.edge_start(ascending)?;
        Ok(Box::new(TreeMatchScanner::new(
            TreeScanner::new(&mut self.manager, enumerator),
            matcher,
        )))
    }
}
