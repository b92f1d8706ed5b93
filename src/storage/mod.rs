//! Storage Module
//!
//! Fixed-size blocks over a stream, and variable-length records built from
//! chains of blocks.
//!
//! ## Responsibilities
//! - Allocate and locate blocks by id
//! - Cache each block's first sector, flushing it when changed
//! - Store records of any length as linked block chains
//! - Recycle deleted blocks through the free list rooted at record 0
//!
//! ## Block Layout
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Header (block_header_size bytes, little-endian i64 words)  │
//! │ ┌────────┬────────┬──────────┬────────────┬─────────────┐  │
//! │ │Next (8)│Prev (8)│RecLen (8)│BlockLen (8)│ Deleted (8) │… │
//! │ └────────┴────────┴──────────┴────────────┴─────────────┘  │
//! ├────────────────────────────────────────────────────────────┤
//! │ Content (block_size - block_header_size bytes)             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reserved Records
//! - Record 0: head of the free-block list, never returned to callers
//! - Record 1: claimed by the disk tree to hold the root node id

mod block;
mod block_storage;
mod record;
mod stream;

pub use block::Block;
pub use block_storage::BlockStorage;
pub use record::{RecordStorage, MAX_RECORD_SIZE};
pub use stream::Stream;

/// Indexes of the reserved header words every block carries
pub mod block_fields {
    /// Id of the next block in the chain (0 = end)
    pub const NEXT_BLOCK_ID: usize = 0;

    /// Id of the previous block in the chain (0 = head of a record)
    pub const PREVIOUS_BLOCK_ID: usize = 1;

    /// Total record length; only meaningful on a record's first block
    pub const RECORD_LENGTH: usize = 2;

    /// Number of content bytes used in this block
    pub const BLOCK_CONTENT_LENGTH: usize = 3;

    /// 1 when the block has been recycled into the free list
    pub const IS_DELETED: usize = 4;

    /// Number of reserved header words
    pub const RESERVED_HEADER_COUNT: usize = 5;

    /// Bytes needed for the reserved header words
    pub const TOTAL_HEADER_SIZE: usize = 8 * RESERVED_HEADER_COUNT;
}
