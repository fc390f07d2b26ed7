//! # Map Rendering
//!
//! Turns chunk block data into map pixels. Everything here is pure computation:
//! no I/O and no shared state, so it runs equally well on the worker or in tests.
//!
//! * `column` - the compositor that reduces one block column to one pixel
//! * `chunk_render` - raster passes over the 16x16 columns of a chunk
//! * `snapshot` - an owned copy of a chunk's block data for background rendering
//! * `tile` - the rendered image of a chunk and its storage encoding

pub mod chunk_render;
pub mod column;
pub mod snapshot;
pub mod tile;

pub use chunk_render::ColumnSource;
pub use column::HeightShading;
pub use snapshot::ChunkSnapshot;
pub use tile::{Tile, TileView};

/// Width and depth of a chunk in blocks.
pub const CHUNK_DIMENSION: i32 = 16;
