//! Configuration for RookDB
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, RookError};
use crate::storage::block_fields;

/// Smallest block (and disk sector) size accepted by block storage
pub const MIN_SECTOR_SIZE: usize = 128;

/// Largest disk sector size; blocks bigger than this cache only their first 4 KB
pub const MAX_SECTOR_SIZE: usize = 4096;

/// Main configuration for a RookDB storage instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Block Storage Configuration
    // -------------------------------------------------------------------------
    /// Total size of every block in bytes (header + content)
    pub block_size: usize,

    /// Size of the header region at the start of each block.
    /// Must hold at least the five reserved 8-byte header words.
    pub block_header_size: usize,

    // -------------------------------------------------------------------------
    // Tree Configuration
    // -------------------------------------------------------------------------
    /// Minimum entries per non-root node (maximum is twice this)
    pub min_entries_per_node: usize,

    /// Number of clean tree nodes kept resident by the disk node manager
    pub max_cached_nodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: MAX_SECTOR_SIZE,
            block_header_size: block_fields::TOTAL_HEADER_SIZE,
            min_entries_per_node: 36,
            max_cached_nodes: 200,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Disk sector size derived from the block size
    ///
    /// `min(block_size, 4096)`, never below 128.
    pub fn sector_size(&self) -> usize {
        self.block_size.min(MAX_SECTOR_SIZE).max(MIN_SECTOR_SIZE)
    }

    /// Check that the configured sizes can be used together
    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_SECTOR_SIZE {
            return Err(RookError::Config(format!(
                "block_size must be at least {} (got {})",
                MIN_SECTOR_SIZE, self.block_size
            )));
        }
        if self.block_size > u32::MAX as usize {
            return Err(RookError::Config(format!(
                "block_size too large: {}",
                self.block_size
            )));
        }
        if self.block_header_size >= self.block_size {
            return Err(RookError::Config(format!(
                "block_header_size ({}) must be less than block_size ({})",
                self.block_header_size, self.block_size
            )));
        }
        if self.block_header_size > self.sector_size() {
            return Err(RookError::Config(format!(
                "block_header_size ({}) must fit in the first disk sector ({})",
                self.block_header_size,
                self.sector_size()
            )));
        }
        if self.min_entries_per_node == 0 {
            return Err(RookError::Config(
                "min_entries_per_node must be at least 1".to_string(),
            ));
        }
        if self.max_cached_nodes == 0 {
            return Err(RookError::Config(
                "max_cached_nodes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the block size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the block header size (in bytes)
    pub fn block_header_size(mut self, size: usize) -> Self {
        self.config.block_header_size = size;
        self
    }

    /// Set the minimum number of entries per tree node
    pub fn min_entries_per_node(mut self, count: usize) -> Self {
        self.config.min_entries_per_node = count;
        self
    }

    /// Set the number of clean nodes the disk node manager keeps cached
    pub fn max_cached_nodes(mut self, count: usize) -> Self {
        self.config.max_cached_nodes = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
