//! Block
//!
//! A fixed-size page of the backing stream: header words followed by content.
//!
//! The first disk sector of a block is kept in memory. Header reads/writes and
//! content that falls inside the first sector go to that copy; content beyond
//! it is read from and written to the stream directly. The cached sector is
//! written back on `flush()`, `dispose()`, or when the last handle is dropped.

use std::cell::RefCell;
use std::fmt;
use std::io::SeekFrom;
use std::rc::{Rc, Weak};

use crate::error::{Result, RookError};

use super::block_fields::RESERVED_HEADER_COUNT;
use super::block_storage::StorageCore;
use super::stream::Stream;

/// Handle to a block owned by a `BlockStorage`
///
/// Cloning a handle is cheap; all handles of one block share the same cached
/// header words and first sector. `BlockStorage::find` hands out the same
/// shared state for as long as any handle is alive.
pub struct Block<S: Stream> {
    state: Rc<RefCell<BlockState<S>>>,
}

/// Shared state behind every handle of one block
pub(super) struct BlockState<S: Stream> {
    id: u32,

    /// In-memory copy of the first disk sector, headers included
    first_sector: Vec<u8>,

    /// Reserved header words already read; kept in step with `first_sector`
    cached_headers: [Option<i64>; RESERVED_HEADER_COUNT],

    /// `first_sector` differs from the stream
    dirty: bool,

    /// Every handle fails with `Disposed` once set
    disposed: bool,

    core: Rc<StorageCore<S>>,
}

impl<S: Stream> Block<S> {
    pub(super) fn new(core: Rc<StorageCore<S>>, id: u32, first_sector: Vec<u8>) -> Self {
        Self {
            state: Rc::new(RefCell::new(BlockState {
                id,
                first_sector,
                cached_headers: [None; RESERVED_HEADER_COUNT],
                dirty: false,
                disposed: false,
                core,
            })),
        }
    }

    pub(super) fn from_state(state: Rc<RefCell<BlockState<S>>>) -> Self {
        Self { state }
    }

    pub(super) fn downgrade(&self) -> Weak<RefCell<BlockState<S>>> {
        Rc::downgrade(&self.state)
    }

    /// Block id (its ordinal position in the stream)
    pub fn id(&self) -> u32 {
        self.state.borrow().id
    }

    /// Whether this block has been disposed
    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// Whether the cached first sector has unflushed changes
    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    /// Read the 64-bit header word at `field`
    ///
    /// The reserved fields are cached after the first read.
    pub fn header(&self, field: usize) -> Result<i64> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.check_field(field)?;

        if field < RESERVED_HEADER_COUNT {
            if let Some(value) = state.cached_headers[field] {
                return Ok(value);
            }
            let value = state.read_word(field);
            state.cached_headers[field] = Some(value);
            return Ok(value);
        }

        Ok(state.read_word(field))
    }

    /// Write the 64-bit header word at `field`
    pub fn set_header(&self, field: usize, value: i64) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.check_field(field)?;

        if field < RESERVED_HEADER_COUNT {
            state.cached_headers[field] = Some(value);
        }

        let start = field * 8;
        state.first_sector[start..start + 8].copy_from_slice(&value.to_le_bytes());
        state.dirty = true;
        Ok(())
    }

    /// Fill `buf` with content bytes starting at `content_offset`
    pub fn read(&self, buf: &mut [u8], content_offset: usize) -> Result<()> {
        let state = self.state.borrow();
        state.ensure_live()?;
        let layout = state.core.layout();
        state.check_range(content_offset, buf.len())?;

        let start = layout.header_size + content_offset;
        let mut done = 0;

        // Part of the range that lives in the cached first sector
        if start < layout.sector_size {
            let count = (layout.sector_size - start).min(buf.len());
            buf[..count].copy_from_slice(&state.first_sector[start..start + count]);
            done = count;
        }

        // Remainder straight from the stream
        if done < buf.len() {
            let position = layout.offset_of(state.id) + (start + done) as u64;
            let mut stream = state.core.stream_mut()?;
            stream.seek(SeekFrom::Start(position))?;
            stream.read_exact(&mut buf[done..])?;
        }

        Ok(())
    }

    /// Write `data` into the content region starting at `content_offset`
    pub fn write(&self, data: &[u8], content_offset: usize) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        let layout = state.core.layout();
        state.check_range(content_offset, data.len())?;

        let start = layout.header_size + content_offset;
        let mut done = 0;

        if start < layout.sector_size {
            let count = (layout.sector_size - start).min(data.len());
            state.first_sector[start..start + count].copy_from_slice(&data[..count]);
            state.dirty = true;
            done = count;
        }

        if done < data.len() {
            let position = layout.offset_of(state.id) + (start + done) as u64;
            let mut stream = state.core.stream_mut()?;
            stream.seek(SeekFrom::Start(position))?;
            stream.write_all(&data[done..])?;
            stream.flush()?;
        }

        Ok(())
    }

    /// Write the cached first sector back to the stream if it changed
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.flush_first_sector()
    }

    /// Flush and release this block
    ///
    /// Every other handle to the same block becomes unusable, and the next
    /// `BlockStorage::find` for this id reads a fresh copy from the stream.
    pub fn dispose(self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.flush_first_sector()?;
        state.disposed = true;
        state.core.unregister(state.id);
        tracing::trace!("Disposed block {}", state.id);
        Ok(())
    }
}

impl<S: Stream> Clone for Block<S> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<S: Stream> fmt::Debug for Block<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Block")
            .field("id", &state.id)
            .field("dirty", &state.dirty)
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl<S: Stream> BlockState<S> {
    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(RookError::Disposed(self.id));
        }
        Ok(())
    }

    fn check_field(&self, field: usize) -> Result<()> {
        let header_size = self.core.layout().header_size;
        if (field + 1) * 8 > header_size {
            return Err(RookError::InvalidArgument(format!(
                "Invalid header field {} (header holds {} words)",
                field,
                header_size / 8
            )));
        }
        Ok(())
    }

    fn check_range(&self, content_offset: usize, length: usize) -> Result<()> {
        let content_size = self.core.layout().content_size;
        match content_offset.checked_add(length) {
            Some(end) if end <= content_size => Ok(()),
            _ => Err(RookError::OutOfRange(format!(
                "Content range {}+{} exceeds block content size {}",
                content_offset, length, content_size
            ))),
        }
    }

    fn read_word(&self, field: usize) -> i64 {
        let start = field * 8;
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.first_sector[start..start + 8]);
        i64::from_le_bytes(word)
    }

    fn flush_first_sector(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let position = self.core.layout().offset_of(self.id);
        {
            let mut stream = self.core.stream_mut()?;
            stream.seek(SeekFrom::Start(position))?;
            stream.write_all(&self.first_sector)?;
            stream.flush()?;
        }
        self.dirty = false;
        Ok(())
    }
}

impl<S: Stream> Drop for BlockState<S> {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        if let Err(e) = self.flush_first_sector() {
            tracing::error!("Failed to flush block {} on drop: {}", self.id, e);
        }
        self.core.forget_dead(self.id);
    }
}
