//! Serializer Module
//!
//! Converts keys and values to bytes for node persistence.
//!
//! ## Fixed vs Variable Size
//! ```text
//! fixed:    [value bytes; length()]              (no prefix needed)
//! variable: [len:u32][value bytes; len]          (prefix written by the caller)
//! ```
//! Tree values must always use a fixed-size serializer; keys may use either.

mod serde_backed;
mod primitives;

pub use serde_backed::BincodeSerializer;
pub use primitives::{
    FixedBytesSerializer, I32Serializer, I64Serializer, StringSerializer, U32Serializer,
    U64Serializer,
};

use crate::error::Result;

/// Converts values of type `T` to and from bytes
pub trait Serializer<T> {
    /// Whether every serialized value has exactly `length()` bytes
    fn is_fixed_size(&self) -> bool;

    /// Serialized length in bytes; only meaningful when `is_fixed_size()`
    fn length(&self) -> usize;

    fn serialize(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value from exactly the bytes it was serialized to
    fn deserialize(&self, bytes: &[u8]) -> Result<T>;
}
