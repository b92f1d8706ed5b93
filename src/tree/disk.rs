//! Disk-backed tree node manager
//!
//! Every node is one record in a `RecordStorage`. Record 1 holds the root
//! node id as 4 little-endian bytes.
//!
//! ## Node Cache
//! ```text
//!   find(id) ──► dirty map ──► LRU of clean nodes ──► record storage
//!                   ▲                                      │
//!   mark_as_changed ┘            save() ◄── write back ────┘
//! ```
//! Dirty nodes are never evicted; `save()` writes them back and moves them
//! into the LRU. Each id lives in at most one of the two, so there is a
//! single current copy of every node.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;

use crate::config::Config;
use crate::error::{Result, RookError};
use crate::serializer::Serializer;
use crate::storage::{RecordStorage, Stream};

use super::codec::NodeCodec;
use super::manager::TreeNodeManager;
use super::node::TreeNode;
use super::{KeyComparer, NaturalOrder};

/// Record holding the current root node id
pub const ROOT_RECORD_ID: u32 = 1;

/// Node manager persisting every node as one record
pub struct DiskTreeNodeManager<K, V, S: Stream = File> {
    /// Node records plus the root pointer in record 1
    records: RecordStorage<S>,

    /// Node encoding; values are always fixed-size
    codec: NodeCodec<K, V>,

    comparer: Box<dyn KeyComparer<K>>,
    min_entries_per_node: usize,

    /// Clean nodes, identical to their records; safe to evict
    cache: LruCache<u32, TreeNode<K, V>>,

    /// Changed nodes not yet written back; never evicted, drained by `save()`.
    /// An id is in `cache` or `dirty`, never both.
    dirty: HashMap<u32, TreeNode<K, V>>,

    /// Mirrors the id stored in record 1
    root_id: u32,
}

impl<K, V> DiskTreeNodeManager<K, V, File>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Open (or create) a file-backed tree using natural key order
    pub fn open<P, KS, VS>(
        path: P,
        config: &Config,
        key_serializer: KS,
        value_serializer: VS,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        KS: Serializer<K> + 'static,
        VS: Serializer<V> + 'static,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let records = RecordStorage::open(file, config)?;
        Self::new(records, config, key_serializer, value_serializer, NaturalOrder)
    }
}

impl<K: Clone, V: Clone, S: Stream> DiskTreeNodeManager<K, V, S> {
    /// Create a manager over `records`, recovering or bootstrapping the root
    pub fn new<KS, VS, C>(
        records: RecordStorage<S>,
        config: &Config,
        key_serializer: KS,
        value_serializer: VS,
        comparer: C,
    ) -> Result<Self>
    where
        KS: Serializer<K> + 'static,
        VS: Serializer<V> + 'static,
        C: KeyComparer<K> + 'static,
    {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_cached_nodes).ok_or_else(|| {
            RookError::Config("max_cached_nodes must be at least 1".to_string())
        })?;

        let mut manager = Self {
            records,
            codec: NodeCodec::new(key_serializer, value_serializer)?,
            comparer: Box::new(comparer),
            min_entries_per_node: config.min_entries_per_node,
            cache: LruCache::new(capacity),
            dirty: HashMap::new(),
            root_id: 0,
        };

        match manager.records.find(ROOT_RECORD_ID)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    RookError::Corruption(format!(
                        "Root record holds {} bytes, expected 4",
                        bytes.len()
                    ))
                })?;
                manager.root_id = u32::from_le_bytes(raw);
                tracing::info!("Recovered tree root node {}", manager.root_id);
            }
            None => manager.bootstrap()?,
        }

        Ok(manager)
    }

    /// Number of clean nodes held in the cache
    pub fn cached_node_count(&self) -> usize {
        self.cache.len()
    }

    /// Number of changed nodes waiting for `save()`
    pub fn dirty_node_count(&self) -> usize {
        self.dirty.len()
    }

    /// The record storage nodes are persisted in
    pub fn record_storage(&self) -> &RecordStorage<S> {
        &self.records
    }

    /// Save all changed nodes and hand back the underlying stream
    pub fn close(mut self) -> Result<S> {
        self.save()?;
        self.cache.clear();
        self.records.flush()?;
        self.records.into_stream()
    }

    /// Create the root record and an empty root node on a fresh store
    fn bootstrap(&mut self) -> Result<()> {
        let root_record = self.records.create(&0u32.to_le_bytes())?;
        if root_record != ROOT_RECORD_ID {
            return Err(RookError::Corruption(format!(
                "Root record was assigned id {} instead of {}",
                root_record, ROOT_RECORD_ID
            )));
        }

        let root = self.create(Vec::new(), Vec::new())?;
        self.make_root(&root)?;
        self.save()?;

        tracing::info!("Created new tree with root node {}", root.id());
        Ok(())
    }
}

impl<K: Clone, V: Clone, S: Stream> TreeNodeManager<K, V> for DiskTreeNodeManager<K, V, S> {
    fn min_entries_per_node(&self) -> usize {
        self.min_entries_per_node
    }

    fn key_comparer(&self) -> &dyn KeyComparer<K> {
        self.comparer.as_ref()
    }

    fn root_id(&self) -> u32 {
        self.root_id
    }

    fn check_entry(&self, key: &K, value: &V) -> Result<()> {
        self.codec.check_entry(key, value, self.max_entries_per_node())
    }

    fn create(&mut self, entries: Vec<(K, V)>, children: Vec<u32>) -> Result<TreeNode<K, V>> {
        let codec = &self.codec;
        let mut created = None;

        let id = self.records.create_with(|id| {
            let node = TreeNode::new(id, 0, entries, children);
            let bytes = codec.encode(&node)?;
            created = Some(node);
            Ok(bytes)
        })?;

        let node = created.ok_or_else(|| {
            RookError::Corruption(format!("Tree node {} was not initialised", id))
        })?;
        self.cache.put(id, node.clone());

        tracing::trace!("Created tree node {}", id);
        Ok(node)
    }

    fn find(&mut self, id: u32) -> Result<Option<TreeNode<K, V>>> {
        // Records 0 and 1 hold the free list and the root pointer
        if id <= ROOT_RECORD_ID {
            return Ok(None);
        }

        if let Some(node) = self.dirty.get(&id) {
            return Ok(Some(node.clone()));
        }
        if let Some(node) = self.cache.get(&id) {
            return Ok(Some(node.clone()));
        }

        let Some(bytes) = self.records.find(id)? else {
            return Ok(None);
        };
        let node = self.codec.decode(id, &bytes)?;

        tracing::trace!("Loaded tree node {} from storage", id);
        self.cache.put(id, node.clone());
        Ok(Some(node))
    }

    fn make_root(&mut self, node: &TreeNode<K, V>) -> Result<()> {
        self.records
            .update(ROOT_RECORD_ID, &node.id().to_le_bytes())?;
        tracing::debug!("Tree root changed from {} to {}", self.root_id, node.id());
        self.root_id = node.id();
        Ok(())
    }

    fn mark_as_changed(&mut self, node: &TreeNode<K, V>) -> Result<()> {
        self.cache.pop(&node.id());
        self.dirty.insert(node.id(), node.clone());
        Ok(())
    }

    fn delete(&mut self, node: &TreeNode<K, V>) -> Result<()> {
        self.cache.pop(&node.id());
        self.dirty.remove(&node.id());
        self.records.delete(node.id())
    }

    fn save(&mut self) -> Result<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }

        let mut ids: Vec<u32> = self.dirty.keys().copied().collect();
        ids.sort_unstable();

        for &id in &ids {
            let bytes = match self.dirty.get(&id) {
                Some(node) => self.codec.encode(node)?,
                None => continue,
            };
            self.records.update(id, &bytes)?;

            if let Some(node) = self.dirty.remove(&id) {
                self.cache.put(id, node);
            }
        }

        self.records.flush()?;
        tracing::debug!("Saved {} tree nodes", ids.len());
        Ok(())
    }
}
