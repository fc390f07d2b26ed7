//! # Region Storage
//!
//! A region file holds up to 1024 chunks arranged on a 32x32 grid. The file is
//! divided into 4096-byte sectors:
//!
//! - Sector 0: location table, 1024 big-endian entries of `(start_sector << 8) | sector_count`
//! - Sector 1: timestamp table, 1024 big-endian Unix timestamps
//! - Sector 2+: chunk data, each chunk a contiguous run of whole sectors
//!
//! A stored chunk starts with a 4-byte big-endian length (compressed bytes + 1),
//! a 1-byte compression version, then the zlib-compressed payload.
//!
//! ## Key Components
//! - `RegionFile`: the on-disk store for one region, with its sector allocator
//! - `SectorMap`: the in-memory free-space index, one bit per sector
//! - `ChunkWriter`: a sink that buffers a chunk and commits it on `finish`
//! - `RegionCache`: maps world chunk coordinates to open region files
//!
//! ## Thread Safety
//! None of these types synchronize internally. A region file is meant to be
//! driven from the background worker only; the cache is shared with tasks through
//! an `MtResource`.

use num_derive::FromPrimitive;

pub mod chunk_writer;
pub mod error;
pub mod region_cache;
pub mod region_file;
pub mod sector_map;

pub use chunk_writer::ChunkWriter;
pub use error::RegionError;
pub use region_cache::{RegionCache, RegionKey};
pub use region_file::{ChunkReader, RegionFile};
pub use sector_map::SectorMap;

/// Size of one sector in bytes.
pub const SECTOR_SIZE: usize = 4096;
/// Sectors reserved for the location and timestamp tables.
pub const HEADER_SECTORS: usize = 2;
/// Number of chunks along one side of a region.
pub const REGION_DIMENSION: i32 = 32;
/// Number of chunks in a region.
pub const CHUNK_COUNT: usize = (REGION_DIMENSION * REGION_DIMENSION) as usize;
/// Length prefix plus version byte in front of every stored chunk.
pub const CHUNK_HEADER_SIZE: usize = 5;
/// The sector count of a location entry is a single byte.
pub const MAX_SECTORS_PER_CHUNK: usize = 255;
/// Upper bound on the sectors a region file can address.
pub const MAX_SECTOR_COUNT: usize = HEADER_SECTORS + CHUNK_COUNT * MAX_SECTORS_PER_CHUNK;

/// Compression tag stored after a chunk's length prefix.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum CompressionScheme {
    /// Gzip stream. Recognised in legacy files but not supported.
    Gzip = 1,
    /// Zlib (deflate) stream. The only format this store reads or writes.
    Zlib = 2,
}

impl CompressionScheme {
    /// Decodes a version byte.
    pub fn from_version(version: u8) -> Option<Self> {
        num::FromPrimitive::from_u8(version)
    }
}

/// Index of a chunk's entry in the location and timestamp tables.
///
/// Coordinates wrap into the region, so world chunk coordinates can be passed directly.
pub fn chunk_index(x: i32, z: i32) -> usize {
    (((z & 31) << 5) | (x & 31)) as usize
}

/// Number of whole sectors needed to hold `bytes` bytes.
pub fn required_sectors(bytes: usize) -> usize {
    bytes.div_ceil(SECTOR_SIZE)
}

/// A contiguous run of sectors owned by one chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Section {
    /// First sector of the run.
    pub start: usize,
    /// Number of sectors in the run.
    pub count: usize,
}

impl Section {
    /// Creates a section covering `count` sectors from `start`.
    pub fn new(start: usize, count: usize) -> Self {
        Section { start, count }
    }

    /// Decodes a location table entry. Zero-length entries are absent.
    pub fn from_location(entry: u32) -> Option<Self> {
        let start = ((entry >> 8) & 0x00ff_ffff) as usize;
        let count = (entry & 0xff) as usize;
        if count == 0 {
            return None;
        }
        Some(Section::new(start, count))
    }

    /// Encodes this section as a location table entry.
    pub fn to_location(&self) -> u32 {
        ((self.start as u32) << 8) | (self.count as u32 & 0xff)
    }

    /// One past the last sector of the run.
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// Byte offset of the run within the file.
    pub fn byte_offset(&self) -> u64 {
        (self.start * SECTOR_SIZE) as u64
    }

    /// Number of bytes the run can hold.
    pub fn byte_len(&self) -> usize {
        self.count * SECTOR_SIZE
    }

    /// Whether two runs share any sector.
    pub fn overlaps(&self, other: &Section) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_entry_packs_start_and_count() {
        let section = Section::new(0x01_2345, 3);
        assert_eq!(section.to_location(), 0x0123_4503);
        assert_eq!(Section::from_location(0x0123_4503), Some(section));
    }

    #[test]
    fn zero_count_entry_is_absent() {
        assert_eq!(Section::from_location(0), None);
        assert_eq!(Section::from_location(0x0000_0500), None);
    }

    #[test]
    fn chunk_index_wraps_world_coordinates() {
        assert_eq!(chunk_index(5, 9), (9 << 5) | 5);
        assert_eq!(chunk_index(-1, 0), 31);
        assert_eq!(chunk_index(32, 33), 32);
    }

    #[test]
    fn required_sectors_rounds_up() {
        assert_eq!(required_sectors(1), 1);
        assert_eq!(required_sectors(SECTOR_SIZE), 1);
        assert_eq!(required_sectors(SECTOR_SIZE + 1), 2);
    }

    #[test]
    fn version_byte_decoding() {
        assert_eq!(CompressionScheme::from_version(2), Some(CompressionScheme::Zlib));
        assert_eq!(CompressionScheme::from_version(1), Some(CompressionScheme::Gzip));
        assert_eq!(CompressionScheme::from_version(7), None);
    }

    #[test]
    fn adjacent_sections_do_not_overlap() {
        let a = Section::new(2, 3);
        assert!(!a.overlaps(&Section::new(5, 1)));
        assert!(a.overlaps(&Section::new(4, 4)));
        assert!(Section::new(4, 4).overlaps(&a));
    }
}
