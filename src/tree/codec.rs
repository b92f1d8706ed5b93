//! Node serialization for disk-backed trees
//!
//! ## Node Format
//! ```text
//! ┌──────────────┬────────────────┬────────────────┐
//! │ parent (u32) │ entries (u32)  │ children (u32) │
//! ├──────────────┴────────────────┴────────────────┤
//! │ entries × ( [key_len u32]? key  value )        │  key_len only for variable keys
//! ├────────────────────────────────────────────────┤
//! │ children × child id (u32)                      │
//! └────────────────────────────────────────────────┘
//! ```
//! All integers little-endian.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, RookError};
use crate::serializer::Serializer;

use super::node::TreeNode;

/// Serialized nodes must stay below this size (64 KiB)
pub const MAX_NODE_SIZE: usize = 64 * 1024;

/// Fixed part of every serialized node
const NODE_HEADER_SIZE: usize = 12;

/// Encodes tree nodes to bytes and back
pub struct NodeCodec<K, V> {
    key_serializer: Box<dyn Serializer<K>>,
    value_serializer: Box<dyn Serializer<V>>,
}

impl<K, V> NodeCodec<K, V> {
    /// Create a codec; the value serializer must be fixed-size
    pub fn new<KS, VS>(key_serializer: KS, value_serializer: VS) -> Result<Self>
    where
        KS: Serializer<K> + 'static,
        VS: Serializer<V> + 'static,
    {
        if !value_serializer.is_fixed_size() {
            return Err(RookError::Unsupported(
                "Tree values require a fixed-size serializer".to_string(),
            ));
        }

        Ok(Self {
            key_serializer: Box::new(key_serializer),
            value_serializer: Box::new(value_serializer),
        })
    }

    /// Whether keys are written without a length prefix
    pub fn has_fixed_keys(&self) -> bool {
        self.key_serializer.is_fixed_size()
    }

    /// Bytes one entry occupies in a serialized node
    pub fn entry_size(&self, key: &K, value: &V) -> Result<usize> {
        let key_len = if self.has_fixed_keys() {
            self.key_serializer.length()
        } else {
            self.key_serializer.serialize(key)?.len() + 4
        };
        let value_len = self.value_serializer.serialize(value)?.len();
        Ok(key_len + value_len)
    }

    /// Largest entry that still lets a node of `max_entries` entries encode
    ///
    /// Entries within this size can never push a node over `MAX_NODE_SIZE`.
    pub fn max_entry_size(max_entries: usize) -> usize {
        let children = (max_entries + 1) * 4;
        (MAX_NODE_SIZE - 1)
            .saturating_sub(NODE_HEADER_SIZE + children)
            .checked_div(max_entries)
            .unwrap_or(0)
    }

    /// Fail with `NodeTooLarge` if a node full of entries this size could not be stored
    pub fn check_entry(&self, key: &K, value: &V, max_entries: usize) -> Result<()> {
        let size = self.entry_size(key, value)?;
        let max = Self::max_entry_size(max_entries);
        if size > max {
            return Err(RookError::NodeTooLarge { size, max });
        }
        Ok(())
    }

    pub fn encode(&self, node: &TreeNode<K, V>) -> Result<Vec<u8>> {
        let fixed_keys = self.has_fixed_keys();
        let mut buf = BytesMut::with_capacity(NODE_HEADER_SIZE + node.child_count() * 4);

        buf.put_u32_le(node.parent_id());
        buf.put_u32_le(node.entry_count() as u32);
        buf.put_u32_le(node.child_count() as u32);

        for (key, value) in node.entries() {
            let key_bytes = self.key_serializer.serialize(key)?;
            if fixed_keys {
                check_width(&key_bytes, self.key_serializer.length(), "key")?;
            } else {
                let len = u32::try_from(key_bytes.len()).map_err(|_| RookError::NodeTooLarge {
                    size: key_bytes.len(),
                    max: MAX_NODE_SIZE,
                })?;
                buf.put_u32_le(len);
            }
            buf.put_slice(&key_bytes);

            let value_bytes = self.value_serializer.serialize(value)?;
            check_width(&value_bytes, self.value_serializer.length(), "value")?;
            buf.put_slice(&value_bytes);

            if buf.len() >= MAX_NODE_SIZE {
                return Err(RookError::NodeTooLarge {
                    size: buf.len(),
                    max: MAX_NODE_SIZE,
                });
            }
        }

        for &child in node.children() {
            buf.put_u32_le(child);
        }

        if buf.len() >= MAX_NODE_SIZE {
            return Err(RookError::NodeTooLarge {
                size: buf.len(),
                max: MAX_NODE_SIZE,
            });
        }

        Ok(buf.to_vec())
    }

    /// Decode the node stored under record `id`
    pub fn decode(&self, id: u32, data: &[u8]) -> Result<TreeNode<K, V>> {
        if data.len() >= MAX_NODE_SIZE {
            return Err(RookError::NodeTooLarge {
                size: data.len(),
                max: MAX_NODE_SIZE,
            });
        }

        let fixed_keys = self.has_fixed_keys();
        let value_len = self.value_serializer.length();
        let mut buf = data;

        ensure_remaining(buf, NODE_HEADER_SIZE, id, "header")?;
        let parent_id = buf.get_u32_le();
        let entry_count = buf.get_u32_le() as usize;
        let child_count = buf.get_u32_le() as usize;

        if child_count != 0 && child_count != entry_count + 1 {
            return Err(RookError::Corruption(format!(
                "Node {} has {} entries but {} children",
                id, entry_count, child_count
            )));
        }

        let mut entries = Vec::with_capacity(entry_count.min(data.len()));
        for _ in 0..entry_count {
            let key_len = if fixed_keys {
                self.key_serializer.length()
            } else {
                ensure_remaining(buf, 4, id, "key length")?;
                buf.get_u32_le() as usize
            };

            ensure_remaining(buf, key_len, id, "key")?;
            let key = self.key_serializer.deserialize(&buf[..key_len])?;
            buf.advance(key_len);

            ensure_remaining(buf, value_len, id, "value")?;
            let value = self.value_serializer.deserialize(&buf[..value_len])?;
            buf.advance(value_len);

            entries.push((key, value));
        }

        ensure_remaining(buf, child_count * 4, id, "child ids")?;
        let children = (0..child_count).map(|_| buf.get_u32_le()).collect();

        if buf.has_remaining() {
            return Err(RookError::Corruption(format!(
                "Node {} has {} trailing bytes",
                id,
                buf.remaining()
            )));
        }

        Ok(TreeNode::new(id, parent_id, entries, children))
    }
}

fn check_width(bytes: &[u8], expected: usize, what: &str) -> Result<()> {
    if bytes.len() != expected {
        return Err(RookError::Serialization(format!(
            "Fixed-size {} serialized to {} bytes, expected {}",
            what,
            bytes.len(),
            expected
        )));
    }
    Ok(())
}

fn ensure_remaining(buf: &[u8], needed: usize, id: u32, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(RookError::Corruption(format!(
            "Node {} truncated reading {} ({} of {} bytes)",
            id,
            what,
            buf.remaining(),
            needed
        )));
    }
    Ok(())
}
