//! Built-in serializers for integers, fixed byte arrays and strings

use crate::error::{Result, RookError};

use super::Serializer;

macro_rules! int_serializer {
    ($name:ident, $ty:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Serializer<$ty> for $name {
            fn is_fixed_size(&self) -> bool {
                true
            }

            fn length(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn serialize(&self, value: &$ty) -> Result<Vec<u8>> {
                Ok(value.to_le_bytes().to_vec())
            }

            fn deserialize(&self, bytes: &[u8]) -> Result<$ty> {
                let raw = bytes.try_into().map_err(|_| {
                    RookError::Serialization(format!(
                        "Expected {} bytes for {}, got {}",
                        std::mem::size_of::<$ty>(),
                        stringify!($ty),
                        bytes.len()
                    ))
                })?;
                Ok(<$ty>::from_le_bytes(raw))
            }
        }
    };
}

int_serializer!(U32Serializer, u32, "Little-endian `u32` (4 bytes)");
int_serializer!(I32Serializer, i32, "Little-endian `i32` (4 bytes)");
int_serializer!(U64Serializer, u64, "Little-endian `u64` (8 bytes)");
int_serializer!(I64Serializer, i64, "Little-endian `i64` (8 bytes)");

/// Raw `[u8; N]` arrays, e.g. 16-byte GUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedBytesSerializer<const N: usize>;

impl<const N: usize> Serializer<[u8; N]> for FixedBytesSerializer<N> {
    fn is_fixed_size(&self) -> bool {
        true
    }

    fn length(&self) -> usize {
        N
    }

    fn serialize(&self, value: &[u8; N]) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<[u8; N]> {
        bytes.try_into().map_err(|_| {
            RookError::Serialization(format!("Expected {} bytes, got {}", N, bytes.len()))
        })
    }
}

/// UTF-8 strings, variable length
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn is_fixed_size(&self) -> bool {
        false
    }

    fn length(&self) -> usize {
        0
    }

    fn serialize(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| RookError::Serialization(format!("Invalid UTF-8 key: {}", e)))
    }
}
