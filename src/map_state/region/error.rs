//! # Region Error Types

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised inside the region store.
///
/// These never leave the public chunk operations: `RegionFile::read` and
/// `RegionFile::write_chunk` log them and report an absent chunk or a failed write.
/// Only `RegionFile::open` hands them to the caller.
#[derive(Error, Debug)]
pub enum RegionError {
    /// The underlying file operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The parent path of a region file exists but is not a directory.
    #[error("path {0} exists and is not a directory")]
    NotADirectory(PathBuf),

    /// The stored compression version is not zlib.
    #[error("unsupported compression version {version} for chunk ({x}, {z})")]
    InvalidVersion {
        /// Chunk x within the region.
        x: i32,
        /// Chunk z within the region.
        z: i32,
        /// The version byte found on disk.
        version: u8,
    },

    /// The stored length does not fit the sectors allocated to the chunk.
    #[error("data length {length} invalid for chunk ({x}, {z}) with {allocated} allocated bytes")]
    InvalidLength {
        /// Chunk x within the region.
        x: i32,
        /// Chunk z within the region.
        z: i32,
        /// The length prefix found on disk.
        length: u32,
        /// Bytes covered by the chunk's sectors.
        allocated: usize,
    },

    /// The chunk needs more sectors than a location entry can record.
    #[error("chunk ({x}, {z}) needs {sectors} sectors")]
    ChunkTooLarge {
        /// Chunk x within the region.
        x: i32,
        /// Chunk z within the region.
        z: i32,
        /// Sectors the compressed chunk would need.
        sectors: usize,
    },

    /// Placing the chunk would run past the addressable sectors.
    #[error("chunk ({x}, {z}) would end at sector {end}, past the region capacity")]
    SectorOverflow {
        /// Chunk x within the region.
        x: i32,
        /// Chunk z within the region.
        z: i32,
        /// One past the last sector the chunk would occupy.
        end: usize,
    },

    /// The region file has been closed.
    #[error("region file {0} is closed")]
    Closed(PathBuf),
}
