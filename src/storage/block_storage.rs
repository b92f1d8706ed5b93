//! Block Storage
//!
//! Allocates and locates fixed-size blocks over a single stream.
//!
//! ## Responsibilities
//! - Map block ids to stream offsets (`offset = id * block_size`)
//! - Extend the stream one block at a time
//! - Keep a registry of live blocks so repeated lookups share one instance

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::rc::{Rc, Weak};

use crate::config::Config;
use crate::error::{Result, RookError};

use super::block::{Block, BlockState};
use super::stream::Stream;

/// Size parameters shared by the storage and all of its blocks
#[derive(Debug, Clone, Copy)]
pub(super) struct BlockLayout {
    pub block_size: usize,
    pub header_size: usize,
    pub content_size: usize,
    pub sector_size: usize,
}

impl BlockLayout {
    /// Stream offset of the first byte of block `id`
    pub fn offset_of(&self, id: u32) -> u64 {
        id as u64 * self.block_size as u64
    }
}

/// State shared between a `BlockStorage` and the blocks it hands out
pub(super) struct StorageCore<S: Stream> {
    stream: RefCell<S>,
    layout: BlockLayout,
    live: RefCell<HashMap<u32, Weak<RefCell<BlockState<S>>>>>,
}

impl<S: Stream> StorageCore<S> {
    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn stream_mut(&self) -> Result<RefMut<'_, S>> {
        self.stream.try_borrow_mut().map_err(|_| {
            RookError::Unsupported("Re-entrant access to the backing stream".to_string())
        })
    }

    /// Remove a disposed block from the registry
    pub fn unregister(&self, id: u32) {
        if let Ok(mut live) = self.live.try_borrow_mut() {
            live.remove(&id);
        }
    }

    /// Remove the registry entry for `id` if no handle to it remains
    pub fn forget_dead(&self, id: u32) {
        if let Ok(mut live) = self.live.try_borrow_mut() {
            let dead = live.get(&id).map_or(false, |weak| weak.strong_count() == 0);
            if dead {
                live.remove(&id);
            }
        }
    }

    fn live_block(&self, id: u32) -> Option<Rc<RefCell<BlockState<S>>>> {
        self.live.borrow().get(&id).and_then(Weak::upgrade)
    }
}

/// Fixed-size block allocator over one stream
///
/// ## Concurrency:
/// Single-threaded. Blocks and the storage share the stream through
/// `Rc<RefCell<..>>`; callers must not open two storages over one stream.
pub struct BlockStorage<S: Stream> {
    core: Rc<StorageCore<S>>,
}

impl<S: Stream> BlockStorage<S> {
    /// Create block storage over `stream` using the sizes in `config`
    pub fn new(stream: S, config: &Config) -> Result<Self> {
        config.validate()?;

        let layout = BlockLayout {
            block_size: config.block_size,
            header_size: config.block_header_size,
            content_size: config.block_size - config.block_header_size,
            sector_size: config.sector_size(),
        };

        Ok(Self {
            core: Rc::new(StorageCore {
                stream: RefCell::new(stream),
                layout,
                live: RefCell::new(HashMap::new()),
            }),
        })
    }

    /// Total number of bytes in a block
    pub fn block_size(&self) -> usize {
        self.core.layout.block_size
    }

    /// Size of a block's header region
    pub fn block_header_size(&self) -> usize {
        self.core.layout.header_size
    }

    /// Size of a block's content region
    pub fn block_content_size(&self) -> usize {
        self.core.layout.content_size
    }

    /// Unit of I/O used for the cached first sector
    pub fn sector_size(&self) -> usize {
        self.core.layout.sector_size
    }

    /// Find the block with the given id
    ///
    /// Returns:
    /// - `Ok(Some(block))`: the live instance if one is open, else a fresh load
    /// - `Ok(None)`: the block lies beyond the end of the stream
    pub fn find(&self, id: u32) -> Result<Option<Block<S>>> {
        if let Some(state) = self.core.live_block(id) {
            return Ok(Some(Block::from_state(state)));
        }

        let layout = self.core.layout;
        let position = layout.offset_of(id);
        let mut first_sector = vec![0u8; layout.sector_size];
        {
            let mut stream = self.core.stream_mut()?;
            if position + layout.block_size as u64 > stream.byte_len()? {
                return Ok(None);
            }
            stream.seek(SeekFrom::Start(position))?;
            stream.read_exact(&mut first_sector)?;
        }

        Ok(Some(self.register(id, first_sector)))
    }

    /// Extend the stream by one zeroed block and return it
    pub fn create_new(&self) -> Result<Block<S>> {
        let block_size = self.core.layout.block_size as u64;
        let id = {
            let mut stream = self.core.stream_mut()?;
            let len = stream.byte_len()?;
            if len % block_size != 0 {
                return Err(RookError::Misaligned(format!(
                    "Unexpected stream length ({}) for block size ({})",
                    len, block_size
                )));
            }

            let id = u32::try_from(len / block_size).map_err(|_| {
                RookError::OutOfRange(format!("Block id space exhausted at {} blocks", len / block_size))
            })?;

            stream.set_len(len + block_size)?;
            stream.flush()?;
            id
        };

        tracing::debug!("Extended stream with block {}", id);
        Ok(self.register(id, vec![0u8; self.core.layout.sector_size]))
    }

    /// Number of whole blocks currently in the stream
    pub fn block_count(&self) -> Result<u64> {
        let len = self.core.stream_mut()?.byte_len()?;
        Ok(len / self.core.layout.block_size as u64)
    }

    /// Number of blocks with at least one open handle
    pub fn live_block_count(&self) -> usize {
        self.core
            .live
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Flush the underlying stream
    pub fn flush(&self) -> Result<()> {
        self.core.stream_mut()?.flush()?;
        Ok(())
    }

    /// Take back the underlying stream
    ///
    /// Fails if any block handle is still open.
    pub fn into_stream(self) -> Result<S> {
        match Rc::try_unwrap(self.core) {
            Ok(core) => Ok(core.stream.into_inner()),
            Err(core) => Err(RookError::InvalidArgument(format!(
                "{} block handle(s) still open",
                Rc::strong_count(&core) - 1
            ))),
        }
    }

    fn register(&self, id: u32, first_sector: Vec<u8>) -> Block<S> {
        let block = Block::new(Rc::clone(&self.core), id, first_sector);
        self.core.live.borrow_mut().insert(id, block.downgrade());
        block
    }
}
