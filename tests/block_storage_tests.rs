//! Tests for BlockStorage and Block
//!
//! These tests verify:
//! - Block allocation and lookup by id
//! - Header caching and persistence through the first sector
//! - Content I/O spanning past the first sector
//! - Bounds checking, disposal, and misaligned streams

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use rookdb::storage::block_fields::{NEXT_BLOCK_ID, RECORD_LENGTH};
use rookdb::storage::{BlockStorage, Stream};
use rookdb::{Config, RookError};

// =============================================================================
// Helper Functions
// =============================================================================

fn small_config() -> Config {
    Config::builder().block_size(128).build()
}

fn memory_storage(config: &Config) -> BlockStorage<Cursor<Vec<u8>>> {
    BlockStorage::new(Cursor::new(Vec::new()), config).unwrap()
}

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_create_new_assigns_sequential_ids() {
    let storage = memory_storage(&small_config());

    let first = storage.create_new().unwrap();
    let second = storage.create_new().unwrap();

    assert_eq!(first.id(), 0);
    assert_eq!(second.id(), 1);
    assert_eq!(storage.block_count().unwrap(), 2);
}

#[test]
fn test_sizes_follow_config() {
    let storage = memory_storage(&small_config());

    assert_eq!(storage.block_size(), 128);
    assert_eq!(storage.block_header_size(), 40);
    assert_eq!(storage.block_content_size(), 88);
    assert_eq!(storage.sector_size(), 128);
}

#[test]
fn test_sector_size_is_capped() {
    let config = Config::builder().block_size(16384).build();
    let storage = memory_storage(&config);

    assert_eq!(storage.sector_size(), 4096);
}

#[test]
fn test_create_new_rejects_misaligned_stream() {
    let storage = BlockStorage::new(Cursor::new(vec![0u8; 100]), &small_config()).unwrap();

    let err = storage.create_new().unwrap_err();
    assert!(matches!(err, RookError::Misaligned(_)));
}

#[test]
fn test_invalid_config_rejected() {
    let too_small = Config::builder().block_size(64).build();
    let result = BlockStorage::new(Cursor::new(Vec::new()), &too_small);
    assert!(matches!(result, Err(RookError::Config(_))));

    let header_too_big = Config::builder()
        .block_size(128)
        .block_header_size(128)
        .build();
    let result = BlockStorage::new(Cursor::new(Vec::new()), &header_too_big);
    assert!(matches!(result, Err(RookError::Config(_))));
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_find_beyond_stream_returns_none() {
    let storage = memory_storage(&small_config());
    storage.create_new().unwrap();

    assert!(storage.find(1).unwrap().is_none());
    assert!(storage.find(1000).unwrap().is_none());
}

#[test]
fn test_find_returns_shared_live_instance() {
    let storage = memory_storage(&small_config());
    let block = storage.create_new().unwrap();
    block.set_header(RECORD_LENGTH, 77).unwrap();

    // Unflushed change is visible through the shared instance
    let again = storage.find(block.id()).unwrap().unwrap();
    assert_eq!(again.header(RECORD_LENGTH).unwrap(), 77);
    assert_eq!(storage.live_block_count(), 1);
}

#[test]
fn test_headers_persist_after_drop() {
    let storage = memory_storage(&small_config());
    {
        let block = storage.create_new().unwrap();
        block.set_header(NEXT_BLOCK_ID, 42).unwrap();
        block.set_header(RECORD_LENGTH, -1).unwrap();
    }
    assert_eq!(storage.live_block_count(), 0);

    let block = storage.find(0).unwrap().unwrap();
    assert_eq!(block.header(NEXT_BLOCK_ID).unwrap(), 42);
    assert_eq!(block.header(RECORD_LENGTH).unwrap(), -1);
}

#[test]
fn test_extra_header_fields() {
    let config = Config::builder()
        .block_size(128)
        .block_header_size(48)
        .build();
    let storage = memory_storage(&config);
    let block = storage.create_new().unwrap();

    block.set_header(5, 1234).unwrap();
    assert_eq!(block.header(5).unwrap(), 1234);

    let err = block.set_header(6, 1).unwrap_err();
    assert!(matches!(err, RookError::InvalidArgument(_)));
}

#[test]
fn test_header_field_outside_header_rejected() {
    let storage = memory_storage(&small_config());
    let block = storage.create_new().unwrap();

    assert!(matches!(block.header(5), Err(RookError::InvalidArgument(_))));
}

// =============================================================================
// Content I/O Tests
// =============================================================================

#[test]
fn test_content_round_trip_in_first_sector() {
    let storage = memory_storage(&small_config());
    let block = storage.create_new().unwrap();

    block.write(b"hello", 10).unwrap();
    let mut buf = [0u8; 5];
    block.read(&mut buf, 10).unwrap();

    assert_eq!(&buf, b"hello");
}

#[test]
fn test_content_spanning_past_first_sector() {
    let config = Config::builder().block_size(8192).build();
    let storage = memory_storage(&config);
    let data: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();

    {
        let block = storage.create_new().unwrap();
        // Header (40) + 3900 puts the write across the 4096-byte sector boundary
        block.write(&data, 3900).unwrap();
    }

    let block = storage.find(0).unwrap().unwrap();
    let mut buf = vec![0u8; data.len()];
    block.read(&mut buf, 3900).unwrap();
    assert_eq!(buf, data);
}

#[test]
fn test_content_out_of_range_rejected() {
    let storage = memory_storage(&small_config());
    let block = storage.create_new().unwrap();

    let err = block.write(&[0u8; 89], 0).unwrap_err();
    assert!(matches!(err, RookError::OutOfRange(_)));

    let mut buf = [0u8; 10];
    let err = block.read(&mut buf, 80).unwrap_err();
    assert!(matches!(err, RookError::OutOfRange(_)));
}

#[test]
fn test_blocks_do_not_overlap() {
    let storage = memory_storage(&small_config());
    let a = storage.create_new().unwrap();
    let b = storage.create_new().unwrap();

    a.write(&[0xAA; 88], 0).unwrap();
    b.write(&[0xBB; 88], 0).unwrap();
    a.flush().unwrap();
    b.flush().unwrap();
    drop((a, b));

    let mut buf = [0u8; 88];
    storage.find(0).unwrap().unwrap().read(&mut buf, 0).unwrap();
    assert!(buf.iter().all(|&x| x == 0xAA));
    storage.find(1).unwrap().unwrap().read(&mut buf, 0).unwrap();
    assert!(buf.iter().all(|&x| x == 0xBB));
}

// =============================================================================
// Disposal Tests
// =============================================================================

#[test]
fn test_disposed_block_rejects_use() {
    let storage = memory_storage(&small_config());
    let block = storage.create_new().unwrap();
    let other = block.clone();

    block.set_header(RECORD_LENGTH, 9).unwrap();
    block.dispose().unwrap();

    assert!(other.is_disposed());
    assert!(matches!(other.header(RECORD_LENGTH), Err(RookError::Disposed(0))));
    assert!(matches!(other.write(b"x", 0), Err(RookError::Disposed(0))));

    // A fresh lookup sees the flushed header
    let fresh = storage.find(0).unwrap().unwrap();
    assert_eq!(fresh.header(RECORD_LENGTH).unwrap(), 9);
}

#[test]
fn test_into_stream_returns_flushed_bytes() {
    let storage = memory_storage(&small_config());
    let block = storage.create_new().unwrap();
    block.set_header(RECORD_LENGTH, 5).unwrap();

    drop(block);
    let stream = storage.into_stream().unwrap();
    let bytes = stream.into_inner();

    assert_eq!(bytes.len(), 128);
    assert_eq!(&bytes[16..24], &5i64.to_le_bytes());
}

// =============================================================================
// Custom Stream Tests
// =============================================================================

/// Memory stream that counts how often its length is queried
#[derive(Default)]
struct CountingStream {
    inner: Cursor<Vec<u8>>,
    length_queries: usize,
}

impl Read for CountingStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for CountingStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for CountingStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Stream for CountingStream {
    fn byte_len(&mut self) -> io::Result<u64> {
        self.length_queries += 1;
        Ok(self.inner.get_ref().len() as u64)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.inner.get_mut().resize(len as usize, 0);
        Ok(())
    }
}

#[test]
fn test_custom_stream_backs_storage() {
    let storage = BlockStorage::new(CountingStream::default(), &small_config()).unwrap();

    let block = storage.create_new().unwrap();
    block.write(b"custom", 0).unwrap();
    block.flush().unwrap();
    drop(block);

    assert_eq!(storage.block_count().unwrap(), 1);
    assert!(storage.find(1).unwrap().is_none());

    let stream = storage.into_stream().unwrap();
    assert!(stream.length_queries >= 3);
    let bytes = stream.inner.into_inner();
    assert_eq!(bytes.len(), 128);
    assert_eq!(&bytes[40..46], b"custom");
}
