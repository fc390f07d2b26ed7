//! # Chunk Writer
//!
//! An in-memory sink for one chunk. Bytes are buffered until `finish`, which
//! compresses them and commits the chunk to its region file. Dropping an unfinished
//! writer commits it as well, the same way a buffered writer flushes on drop.

use std::io::{self, Write};

use super::RegionFile;

/// Initial buffer size, enough for a typical chunk.
const INITIAL_CAPACITY: usize = 8096;

/// A buffering sink for chunk `(x, z)` of a region file.
///
/// # Example
/// ```no_run
/// use std::io::Write;
/// use region_map::map_state::region::RegionFile;
///
/// let mut region = RegionFile::open("regions/region/r.0.0.mca").unwrap();
/// let mut writer = region.write(5, 9);
/// writer.write_all(b"chunk payload").unwrap();
/// assert!(writer.finish());
/// ```
pub struct ChunkWriter<'a> {
    region: &'a mut RegionFile,
    x: i32,
    z: i32,
    buffer: Vec<u8>,
    finished: bool,
}

impl<'a> ChunkWriter<'a> {
    pub(super) fn new(region: &'a mut RegionFile, x: i32, z: i32) -> Self {
        ChunkWriter {
            region,
            x,
            z,
            buffer: Vec::with_capacity(INITIAL_CAPACITY),
            finished: false,
        }
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Compresses the buffered bytes and commits the chunk. Returns whether it succeeded.
    pub fn finish(mut self) -> bool {
        self.commit()
    }

    fn commit(&mut self) -> bool {
        self.finished = true;
        let buffer = std::mem::take(&mut self.buffer);
        self.region.write_chunk(self.x, self.z, &buffer)
    }
}

impl Write for ChunkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ChunkWriter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.commit();
        }
    }
}
