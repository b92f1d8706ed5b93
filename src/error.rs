//! Error types for RookDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RookError
pub type Result<T> = std::result::Result<T, RookError>;

/// Unified error type for RookDB operations
#[derive(Debug, Error)]
pub enum RookError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Record not found: {0}")]
    RecordNotFound(u32),

    // -------------------------------------------------------------------------
    // State Errors
    // -------------------------------------------------------------------------
    #[error("Block {0} has already been disposed")]
    Disposed(u32),

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Data misaligned: {0}")]
    Misaligned(String),

    #[error("Storage corruption detected: {0}")]
    Corruption(String),

    #[error("Record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: u64, max: u64 },

    #[error("Serialized node too large: {size} bytes (max {max})")]
    NodeTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Key already exists: {0}")]
    DuplicateKey(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
