//! Backing stream abstraction
//!
//! Block storage only needs positioned reads/writes plus the ability to
//! query and extend the length of the underlying byte range.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

/// A seekable byte stream whose length can be queried and changed
pub trait Stream: Read + Write + Seek {
    /// Current length of the stream in bytes
    fn byte_len(&mut self) -> io::Result<u64>;

    /// Truncate or zero-extend the stream to `len` bytes
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl Stream for File {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl Stream for Cursor<Vec<u8>> {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds memory"))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}
