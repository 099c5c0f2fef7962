//! Seekable byte sources consumed by the database decoders.
//!
//! Database files arrive from plain files, memory buffers, or archive
//! extraction layers. [`ByteSource`] is the minimal contract the decoders
//! need: a size, a cursor, and positioned reads.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::{Error, Result};

/// A seekable stream of bytes backing a database file.
///
/// A decoder owns its source exclusively and consumes it sequentially;
/// implementations are not required to be thread-safe. Setting the position
/// past the end is allowed transiently, the next read fails instead.
pub trait ByteSource {
    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Current read position.
    fn pos(&self) -> u64;

    /// Move the read position.
    fn set_pos(&mut self, pos: u64);

    /// Fill `dest` from the current position, advancing it by `dest.len()`.
    fn read(&mut self, dest: &mut [u8]) -> Result<()>;
}

fn read_from_slice(data: &[u8], pos: &mut u64, dest: &mut [u8]) -> Result<()> {
    let available = (data.len() as u64).saturating_sub(*pos);
    if (dest.len() as u64) > available {
        return Err(Error::UnexpectedEof {
            needed: dest.len() as u64,
            available,
        });
    }

    let start = *pos as usize;
    dest.copy_from_slice(&data[start..start + dest.len()]);
    *pos += dest.len() as u64;
    Ok(())
}

/// An in-memory byte source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    pos: u64,
}

impl MemorySource {
    /// Create a source over an owned buffer.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Drain another source into memory.
    ///
    /// Reads the full contents of `source` starting from position zero.
    pub fn from_source<S: ByteSource>(source: &mut S) -> Result<Self> {
        source.set_pos(0);
        let mut data = vec![0u8; source.size() as usize];
        source.read(&mut data)?;
        Ok(Self::new(data))
    }

    /// The underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    #[inline]
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    #[inline]
    fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    fn set_pos(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn read(&mut self, dest: &mut [u8]) -> Result<()> {
        read_from_slice(&self.data, &mut self.pos, dest)
    }
}

/// A memory-mapped file source.
pub struct MmapSource {
    map: Mmap,
    pos: u64,
}

impl MmapSource {
    /// Map the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and lives as long as this source.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map, pos: 0 })
    }
}

impl ByteSource for MmapSource {
    #[inline]
    fn size(&self) -> u64 {
        self.map.len() as u64
    }

    #[inline]
    fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    fn set_pos(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn read(&mut self, dest: &mut [u8]) -> Result<()> {
        read_from_slice(&self.map, &mut self.pos, dest)
    }
}

impl std::fmt::Debug for MmapSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapSource")
            .field("size", &self.map.len())
            .field("pos", &self.pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_reads() {
        let mut source = MemorySource::new(vec![1, 2, 3, 4, 5]);

        let mut buf = [0u8; 2];
        source.read(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        assert_eq!(source.pos(), 2);

        source.set_pos(4);
        let mut buf = [0u8; 1];
        source.read(&mut buf).unwrap();
        assert_eq!(buf, [5]);
    }

    #[test]
    fn test_memory_source_eof() {
        let mut source = MemorySource::new(vec![1, 2]);
        let mut buf = [0u8; 4];
        assert!(source.read(&mut buf).is_err());

        // Out-of-range positions are allowed until the next read.
        source.set_pos(10);
        assert!(source.read(&mut [0u8; 1]).is_err());
    }

    #[test]
    fn test_from_source_copies_everything() {
        let mut original = MemorySource::new(vec![9, 8, 7]);
        original.set_pos(0);
        let copy = MemorySource::from_source(&mut original).unwrap();
        assert_eq!(copy.as_bytes(), &[9, 8, 7]);
    }
}
