//! Serde-backed serializer using bincode

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, RookError};

use super::Serializer;

/// Variable-size serializer for any serde type
pub struct BincodeSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BincodeSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BincodeSerializer")
    }
}

impl<T: Serialize + DeserializeOwned> Serializer<T> for BincodeSerializer<T> {
    fn is_fixed_size(&self) -> bool {
        false
    }

    fn length(&self) -> usize {
        0
    }

    fn serialize(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| RookError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| RookError::Serialization(e.to_string()))
    }
}
