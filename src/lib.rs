//! # RookDB
//!
//! An embedded storage engine with:
//! - Fixed-size block allocation over a single stream
//! - Variable-length records stored as block chains, with block recycling
//! - A B+Tree index persisted as records or held in memory
//! - Unique or duplicate keys, with lazy ordered scans
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        IndexTree                            │
//! │        (insert / delete / get / ordered scans)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   TreeNodeManager                           │
//! │       (node identity, root pointer, split / rebalance)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Memory    │          │    Disk     │
//!   │  (HashMap)  │          │ (LRU+dirty) │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ NodeCodec
//!                                   ▼
//!                           ┌───────────────┐
//!                           │ RecordStorage │
//!                           │ (block chains)│
//!                           └──────┬────────┘
//!                                  ▼
//!                           ┌───────────────┐
//!                           │ BlockStorage  │
//!                           │   (Stream)    │
//!                           └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod serializer;
pub mod tree;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, RookError};
pub use config::Config;
pub use storage::{BlockStorage, RecordStorage};
pub use tree::{DiskTreeNodeManager, IndexTree, MemoryTreeNodeManager, OrderedIndex};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of RookDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
