//! # Map Tiles
//!
//! A tile is the rendered 16x16 pixel image of one chunk. Tiles are cached on
//! disk as chunk payloads in region files: 256 big-endian ARGB pixels, row by row.

use super::chunk_render::{render_surface, render_underground, ColumnSource};
use super::column::{pixel_height, HeightShading};
use super::CHUNK_DIMENSION;

const PIXELS: usize = (CHUNK_DIMENSION * CHUNK_DIMENSION) as usize;

/// Serialized size of a tile in bytes.
pub const TILE_BYTES: usize = PIXELS * 4;

/// How a chunk is viewed when rendering its tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TileView {
    /// The top of the world. `has_ceiling` skips a roof such as the nether's bedrock.
    Surface {
        /// Whether the dimension has a solid ceiling.
        has_ceiling: bool,
    },
    /// A cave view starting at `start_y`.
    Underground {
        /// Height the search for visible blocks starts from.
        start_y: i32,
    },
}

/// The rendered pixels of one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pixels: Vec<u32>,
}

impl Tile {
    /// A tile with every pixel cleared.
    pub fn blank() -> Self {
        Tile {
            pixels: vec![0; PIXELS],
        }
    }

    /// Renders `source` as seen through `view`.
    pub fn render<S: ColumnSource + ?Sized>(
        source: &S,
        view: TileView,
        mode: HeightShading,
    ) -> Self {
        let mut tile = Tile::blank();
        let scan_size = CHUNK_DIMENSION as usize;
        match view {
            TileView::Surface { has_ceiling } => {
                render_surface(source, &mut tile.pixels, 0, scan_size, has_ceiling, mode)
            }
            TileView::Underground { start_y } => {
                render_underground(source, &mut tile.pixels, 0, scan_size, start_y, None, mode)
            }
        }
        tile
    }

    /// All pixels, row by row.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Packed pixel at `(x, z)`.
    pub fn pixel(&self, x: usize, z: usize) -> u32 {
        self.pixels[z * CHUNK_DIMENSION as usize + x]
    }

    /// Surface height recorded for `(x, z)`.
    pub fn height(&self, x: usize, z: usize) -> i32 {
        pixel_height(self.pixel(x, z))
    }

    /// Serializes the tile for storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|pixel| pixel.to_be_bytes()).collect()
    }

    /// Deserializes a stored tile. Returns `None` if `bytes` is not a whole tile.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != TILE_BYTES {
            return None;
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Some(Tile { pixels })
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point2;

    use super::super::column::{AIR_COLOR, MAX_LIGHT};
    use super::super::snapshot::ChunkSnapshot;
    use super::*;

    const STONE: u32 = 0xFF80_8080;
    const GLASS: u32 = 0x40FF_FFFF;
    const OPEN: TileView = TileView::Surface { has_ceiling: false };
    const ROOFED: TileView = TileView::Surface { has_ceiling: true };

    fn flat_chunk(height: i32) -> ChunkSnapshot {
        let mut chunk = ChunkSnapshot::new(Point2::new(0, 0), 128);
        for z in 0..16 {
            for x in 0..16 {
                chunk.fill_column(x, z, height, STONE);
            }
        }
        chunk
    }

    #[test]
    fn flat_surface_records_height_everywhere() {
        let tile = Tile::render(&flat_chunk(63), OPEN, HeightShading::Contour);
        for z in 0..16 {
            for x in 0..16 {
                assert_eq!(tile.height(x, z), 63);
                assert_eq!(tile.pixel(x, z) & 0x00FF_FFFF, 0x0080_8080);
            }
        }
    }

    #[test]
    fn step_shades_against_west_neighbor() {
        let mut chunk = flat_chunk(60);
        for z in 0..16 {
            for x in 8..16 {
                chunk.fill_column(x, z, 70, STONE);
            }
        }
        let tile = Tile::render(&chunk, OPEN, HeightShading::Contour);

        let flat = tile.pixel(4, 4) & 0xff;
        let step_up = tile.pixel(8, 4) & 0xff;
        let past_step = tile.pixel(9, 4) & 0xff;
        assert!(step_up > flat);
        assert_eq!(past_step, flat);
    }

    #[test]
    fn ceiling_search_skips_the_roof() {
        let mut chunk = flat_chunk(30);
        for z in 0..16 {
            for x in 0..16 {
                for y in 120..128 {
                    chunk.set_block(x, y, z, STONE, 0x00FF_FFFF);
                }
            }
        }

        let roofed = Tile::render(&chunk, ROOFED, HeightShading::Contour);
        let open = Tile::render(&chunk, OPEN, HeightShading::Contour);
        assert_eq!(roofed.height(3, 3), 30);
        assert_eq!(open.height(3, 3), 127);
    }

    #[test]
    fn translucent_block_tints_surface() {
        let mut chunk = flat_chunk(60);
        chunk.set_block(2, 61, 2, GLASS, 0x00FF_FFFF);
        let tile = Tile::render(&chunk, OPEN, HeightShading::Contour);
        assert_ne!(tile.pixel(2, 2) & 0x00FF_FFFF, tile.pixel(5, 5) & 0x00FF_FFFF);
        assert_eq!(tile.height(2, 2), 60);
    }

    #[test]
    fn underground_view_starts_below_overhang() {
        let mut chunk = flat_chunk(10);
        for z in 0..16 {
            for x in 0..16 {
                chunk.set_block(x, 40, z, STONE, 0x00FF_FFFF);
                chunk.set_block(x, 11, z, AIR_COLOR, 0x00FF_FFFF);
                chunk.set_light(x, 11, z, MAX_LIGHT);
            }
        }
        let view = TileView::Underground { start_y: 20 };
        let tile = Tile::render(&chunk, view, HeightShading::Contour);
        assert_eq!(tile.height(0, 0), 10);
    }

    #[test]
    fn stored_bytes_decode_to_same_tile() {
        let tile = Tile::render(&flat_chunk(12), OPEN, HeightShading::Realistic);
        let bytes = tile.to_bytes();
        assert_eq!(bytes.len(), TILE_BYTES);
        assert_eq!(Tile::from_bytes(&bytes), Some(tile));
        assert_eq!(Tile::from_bytes(&bytes[1..]), None);
    }
}
