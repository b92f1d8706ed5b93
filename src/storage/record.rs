//! Record Storage
//!
//! Variable-length records stored as chains of fixed-size blocks.
//!
//! ## Record Chain
//! ```text
//!  head block            continuation           continuation
//! ┌────────────────┐    ┌────────────────┐    ┌────────────────┐
//! │ prev = 0       │◄───┤ prev = head    │◄───┤ prev = …       │
//! │ next ──────────┼───►│ next ──────────┼───►│ next = 0       │
//! │ rec_len = N    │    │ rec_len = 0    │    │ rec_len = 0    │
//! │ blk_len        │    │ blk_len        │    │ blk_len        │
//! └────────────────┘    └────────────────┘    └────────────────┘
//! ```
//!
//! Deleted blocks are flagged and appended to the chain rooted at block 0,
//! which doubles as the free list. Allocation takes the tail of that chain
//! before growing the stream.

use crate::config::Config;
use crate::error::{Result, RookError};

use super::block::Block;
use super::block_fields::{
    BLOCK_CONTENT_LENGTH, IS_DELETED, NEXT_BLOCK_ID, PREVIOUS_BLOCK_ID, RECORD_LENGTH,
    TOTAL_HEADER_SIZE,
};
use super::block_storage::BlockStorage;
use super::stream::Stream;

/// Largest record length accepted (1 GiB); guards against corrupt headers
pub const MAX_RECORD_SIZE: u64 = 1024 * 1024 * 1024;

/// Id of the reserved free-list record
const FREE_LIST_ID: u32 = 0;

/// Stores variable-length records on top of a `BlockStorage`
pub struct RecordStorage<S: Stream> {
    blocks: BlockStorage<S>,
}

impl<S: Stream> RecordStorage<S> {
    /// Wrap an existing block storage
    pub fn new(blocks: BlockStorage<S>) -> Result<Self> {
        if blocks.block_header_size() < TOTAL_HEADER_SIZE {
            return Err(RookError::Config(format!(
                "Record storage requires at least {} bytes of block header (got {})",
                TOTAL_HEADER_SIZE,
                blocks.block_header_size()
            )));
        }
        Ok(Self { blocks })
    }

    /// Create record storage directly over a stream
    pub fn open(stream: S, config: &Config) -> Result<Self> {
        Self::new(BlockStorage::new(stream, config)?)
    }

    /// The underlying block storage
    pub fn block_storage(&self) -> &BlockStorage<S> {
        &self.blocks
    }

    /// Create a zero-length record
    pub fn create_empty(&self) -> Result<u32> {
        self.create(&[])
    }

    /// Create a new record holding `data`, returning its id
    pub fn create(&self, data: &[u8]) -> Result<u32> {
        self.create_with(|_| Ok(data.to_vec()))
    }

    /// Create a new record whose contents depend on its own id
    ///
    /// The provider is called once the first block has been allocated, so a
    /// record can embed the id it is stored under.
    pub fn create_with<F>(&self, provider: F) -> Result<u32>
    where
        F: FnOnce(u32) -> Result<Vec<u8>>,
    {
        let first = self.allocate_block()?;
        let id = first.id();

        let data = match provider(id) {
            Ok(data) => data,
            Err(e) => {
                self.recycle(&first)?;
                return Err(e);
            }
        };

        if data.len() as u64 > MAX_RECORD_SIZE {
            self.recycle(&first)?;
            return Err(RookError::RecordTooLarge {
                size: data.len() as u64,
                max: MAX_RECORD_SIZE,
            });
        }

        first.set_header(RECORD_LENGTH, data.len() as i64)?;
        self.write_chain(first, &data)?;

        tracing::trace!("Created record {} ({} bytes)", id, data.len());
        Ok(id)
    }

    /// Replace the contents of record `id`
    ///
    /// Existing chain blocks are reused in order; extra blocks are allocated
    /// as needed and surplus blocks are recycled into the free list.
    pub fn update(&self, id: u32, data: &[u8]) -> Result<()> {
        if id == FREE_LIST_ID {
            return Err(RookError::InvalidArgument(
                "Record 0 is reserved for the free list".to_string(),
            ));
        }
        if data.len() as u64 > MAX_RECORD_SIZE {
            return Err(RookError::RecordTooLarge {
                size: data.len() as u64,
                max: MAX_RECORD_SIZE,
            });
        }
        self.find_head(id)?.ok_or(RookError::RecordNotFound(id))?;

        let mut blocks = self.find_blocks(id)?;
        let content_size = self.blocks.block_content_size();
        let needed = data.len().div_ceil(content_size).max(1);

        for index in 0..needed {
            if index == blocks.len() {
                blocks.push(self.allocate_block()?);
            }

            let target = &blocks[index];
            if index > 0 {
                let prev = &blocks[index - 1];
                prev.set_header(NEXT_BLOCK_ID, target.id() as i64)?;
                target.set_header(PREVIOUS_BLOCK_ID, prev.id() as i64)?;
            }

            let start = index * content_size;
            let end = (start + content_size).min(data.len());
            target.write(&data[start..end], 0)?;
            target.set_header(BLOCK_CONTENT_LENGTH, (end - start) as i64)?;
            target.set_header(NEXT_BLOCK_ID, 0)?;
            if index == 0 {
                target.set_header(RECORD_LENGTH, data.len() as i64)?;
            }
        }

        // Chain blocks past the new length go back to the free list
        for surplus in &blocks[needed..] {
            self.recycle(surplus)?;
        }

        for block in &blocks {
            block.flush()?;
        }

        tracing::trace!(
            "Updated record {} ({} bytes, {} blocks)",
            id,
            data.len(),
            needed
        );
        Ok(())
    }

    /// Delete record `id`, recycling every block of its chain
    ///
    /// Content bytes are left in place; blocks are only flagged and relinked.
    pub fn delete(&self, id: u32) -> Result<()> {
        if id == FREE_LIST_ID {
            return Err(RookError::InvalidArgument(
                "Record 0 is reserved for the free list".to_string(),
            ));
        }

        let mut current = self.find_head(id)?.ok_or(RookError::RecordNotFound(id))?;
        let limit = self.blocks.block_count()?;
        let mut visited = 0u64;

        loop {
            // Read the successor before the block is relinked into the free list
            let next = link_id(&current, NEXT_BLOCK_ID)?;
            self.recycle(&current)?;

            if next == 0 {
                break;
            }

            visited += 1;
            if visited > limit {
                return Err(RookError::Corruption(format!(
                    "Cycle detected in block chain of record {}",
                    id
                )));
            }
            current = self.blocks.find(next)?.ok_or_else(|| {
                RookError::Corruption(format!("Block not found with id: {}", next))
            })?;
        }

        tracing::trace!("Deleted record {}", id);
        Ok(())
    }

    /// Read the full contents of record `id`
    ///
    /// Returns:
    /// - `Ok(Some(data))`: record found
    /// - `Ok(None)`: id 0, beyond the stream, deleted, or a continuation block
    pub fn find(&self, id: u32) -> Result<Option<Vec<u8>>> {
        let Some(head) = self.find_head(id)? else {
            return Ok(None);
        };

        let total = head.header(RECORD_LENGTH)?;
        if total < 0 {
            return Err(RookError::Corruption(format!(
                "Record {} has negative length {}",
                id, total
            )));
        }
        if total as u64 > MAX_RECORD_SIZE {
            return Err(RookError::RecordTooLarge {
                size: total as u64,
                max: MAX_RECORD_SIZE,
            });
        }

        let total = total as usize;
        let content_size = self.blocks.block_content_size();
        let limit = self.blocks.block_count()?;
        let mut data = vec![0u8; total];
        let mut read = 0;
        let mut visited = 0u64;
        let mut current = head;

        loop {
            let length = current.header(BLOCK_CONTENT_LENGTH)?;
            if length < 0 || length as usize > content_size || read + length as usize > total {
                return Err(RookError::Corruption(format!(
                    "Block {} content size invalid: {}",
                    current.id(),
                    length
                )));
            }

            let length = length as usize;
            current.read(&mut data[read..read + length], 0)?;
            read += length;

            let next = link_id(&current, NEXT_BLOCK_ID)?;
            if next == 0 {
                break;
            }

            visited += 1;
            if visited > limit {
                return Err(RookError::Corruption(format!(
                    "Cycle detected in block chain of record {}",
                    id
                )));
            }
            current = self.blocks.find(next)?.ok_or_else(|| {
                RookError::Corruption(format!("Block not found with id: {}", next))
            })?;
        }

        if read != total {
            return Err(RookError::Corruption(format!(
                "Record {} holds {} of {} bytes",
                id, read, total
            )));
        }

        Ok(Some(data))
    }

    /// Ids of all blocks currently in the free list, oldest first
    pub fn deleted_ids(&self) -> Result<Vec<u32>> {
        let chain = self.find_blocks(FREE_LIST_ID)?;
        Ok(chain.iter().skip(1).map(Block::id).collect())
    }

    /// Flush the underlying stream
    pub fn flush(&self) -> Result<()> {
        self.blocks.flush()
    }

    /// Take back the underlying stream
    pub fn into_stream(self) -> Result<S> {
        self.blocks.into_stream()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Head block of a live record, or None if `id` does not name one
    fn find_head(&self, id: u32) -> Result<Option<Block<S>>> {
        if id == FREE_LIST_ID {
            return Ok(None);
        }

        let Some(block) = self.blocks.find(id)? else {
            return Ok(None);
        };
        if block.header(IS_DELETED)? == 1 || block.header(PREVIOUS_BLOCK_ID)? != 0 {
            return Ok(None);
        }
        Ok(Some(block))
    }

    /// Every block of the chain starting at `record_id`
    ///
    /// Block 0 is created on demand the first time the free list is walked.
    fn find_blocks(&self, record_id: u32) -> Result<Vec<Block<S>>> {
        let limit = self.blocks.block_count()?;
        let mut blocks = Vec::new();
        let mut current = record_id;

        loop {
            let block = match self.blocks.find(current)? {
                Some(block) => block,
                None if current == FREE_LIST_ID => self.blocks.create_new()?,
                None => {
                    return Err(RookError::Corruption(format!(
                        "Block not found with id: {}",
                        current
                    )))
                }
            };

            if record_id != FREE_LIST_ID && block.header(IS_DELETED)? == 1 {
                return Err(RookError::Corruption(format!(
                    "Block {} is already deleted",
                    current
                )));
            }

            current = link_id(&block, NEXT_BLOCK_ID)?;
            blocks.push(block);

            if current == 0 {
                return Ok(blocks);
            }
            if blocks.len() as u64 > limit {
                return Err(RookError::Corruption(format!(
                    "Cycle detected in block chain of record {}",
                    record_id
                )));
            }
        }
    }

    /// Write `data` across `first` and as many newly allocated blocks as needed
    fn write_chain(&self, first: Block<S>, data: &[u8]) -> Result<()> {
        let content_size = self.blocks.block_content_size();
        let mut current = first;
        let mut written = 0;

        loop {
            let count = content_size.min(data.len() - written);
            current.write(&data[written..written + count], 0)?;
            current.set_header(BLOCK_CONTENT_LENGTH, count as i64)?;
            written += count;

            if written >= data.len() {
                current.flush()?;
                return Ok(());
            }

            let next = self.allocate_block()?;
            next.set_header(PREVIOUS_BLOCK_ID, current.id() as i64)?;
            current.set_header(NEXT_BLOCK_ID, next.id() as i64)?;
            current.flush()?;
            current = next;
        }
    }

    /// Take a block from the free list, or grow the stream by one
    fn allocate_block(&self) -> Result<Block<S>> {
        let Some(id) = self.take_reusable_block()? else {
            return self.blocks.create_new();
        };

        let block = self.blocks.find(id)?.ok_or_else(|| {
            RookError::Corruption(format!("Block not found with id: {}", id))
        })?;

        for field in [
            BLOCK_CONTENT_LENGTH,
            IS_DELETED,
            NEXT_BLOCK_ID,
            PREVIOUS_BLOCK_ID,
            RECORD_LENGTH,
        ] {
            block.set_header(field, 0)?;
        }

        tracing::trace!("Reusing block {}", id);
        Ok(block)
    }

    /// Detach the tail of the free list and return its id
    fn take_reusable_block(&self) -> Result<Option<u32>> {
        let chain = self.find_blocks(FREE_LIST_ID)?;
        if chain.len() < 2 {
            return Ok(None);
        }

        let last = &chain[chain.len() - 1];
        let second_last = &chain[chain.len() - 2];
        second_last.set_header(NEXT_BLOCK_ID, 0)?;
        last.set_header(PREVIOUS_BLOCK_ID, 0)?;
        second_last.flush()?;
        last.flush()?;

        Ok(Some(last.id()))
    }

    /// Flag `block` deleted and append it to the free list
    fn recycle(&self, block: &Block<S>) -> Result<()> {
        let chain = self.find_blocks(FREE_LIST_ID)?;
        let last = chain.last().ok_or_else(|| {
            RookError::Corruption("Free list head block is missing".to_string())
        })?;

        last.set_header(NEXT_BLOCK_ID, block.id() as i64)?;
        block.set_header(PREVIOUS_BLOCK_ID, last.id() as i64)?;
        block.set_header(NEXT_BLOCK_ID, 0)?;
        block.set_header(IS_DELETED, 1)?;
        last.flush()?;
        block.flush()
    }
}

/// Read a chain link header as a block id
fn link_id<S: Stream>(block: &Block<S>, field: usize) -> Result<u32> {
    let value = block.header(field)?;
    u32::try_from(value).map_err(|_| {
        RookError::Corruption(format!(
            "Block {} has invalid link {} in header field {}",
            block.id(),
            value,
            field
        ))
    })
}
