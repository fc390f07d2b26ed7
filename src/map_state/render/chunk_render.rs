//! # Chunk Rendering
//!
//! Renders the 16x16 columns of a chunk into a pixel buffer, one pass in raster
//! order. Each pixel reads its west and north neighbors' heights back out of the
//! buffer, so those neighbors must be rendered first.

use super::column::{block_alpha, composite, shade_pixel, ColumnLayer, HeightShading};
use super::CHUNK_DIMENSION;

/// Column mask value: column not examined yet.
pub const FLAG_UNPROCESSED: u8 = 0;
/// Column mask value: column has a non-opaque block to render.
pub const FLAG_NON_OPAQUE: u8 = 1;
/// Column mask value: column is opaque all the way through.
pub const FLAG_OPAQUE: u8 = 2;

/// Highest block a ceiling search starts from.
const CEILING_SEARCH_TOP: i32 = 127;

/// Read-only access to the block data of one chunk.
///
/// Coordinates are local: `x` and `z` in `0..16`, `y` in `0..max_y()`.
pub trait ColumnSource {
    /// One past the highest block that may be non-air.
    fn max_y(&self) -> i32;

    /// Packed ARGB color of the block at `(x, y, z)`.
    fn block_color(&self, x: i32, y: i32, z: i32) -> u32;

    /// Packed RGB biome modifier for the block at `(x, y, z)`.
    fn color_modifier(&self, x: i32, y: i32, z: i32) -> u32;

    /// Light level in `0..=15` at `(x, y, z)`.
    fn light_level(&self, x: i32, y: i32, z: i32) -> u8;
}

/// Renders the column at `(x, z)` from `y` downwards into one pixel.
pub fn column_color<S: ColumnSource + ?Sized>(
    source: &S,
    x: i32,
    y: i32,
    z: i32,
    height_w: i32,
    height_n: i32,
    mode: HeightShading,
) -> u32 {
    let layers = (1..=y).rev().map(|by| {
        ColumnLayer::new(source.block_color(x, by, z), source.color_modifier(x, by, z))
    });
    let result = composite(layers);

    let height = match result.opaque_at {
        Some(index) => y - index as i32,
        None => y.min(0),
    };
    let light = source.light_level(x, height + 1, z);
    shade_pixel(&result, height, height_w, height_n, light, mode)
}

/// Height of the pixel north of `offset`, or -1 on the first row.
fn pixel_height_n(pixels: &[u32], offset: usize, scan_size: usize) -> i32 {
    if offset >= scan_size {
        (pixels[offset - scan_size] >> 24) as i32
    } else {
        -1
    }
}

/// Height of the pixel west of `offset`, or -1 on the first column.
fn pixel_height_w(pixels: &[u32], offset: usize, scan_size: usize) -> i32 {
    if offset % scan_size >= 1 {
        (pixels[offset - 1] >> 24) as i32
    } else {
        -1
    }
}

fn render_column<S: ColumnSource + ?Sized>(
    source: &S,
    pixels: &mut [u32],
    offset: usize,
    scan_size: usize,
    (x, y, z): (i32, i32, i32),
    mode: HeightShading,
) {
    let height_w = pixel_height_w(pixels, offset, scan_size);
    let height_n = pixel_height_n(pixels, offset, scan_size);
    pixels[offset] = column_color(source, x, y, z, height_w, height_n, mode);
}

/// Renders the surface of a chunk into `pixels`.
///
/// The chunk's top-left pixel goes at `offset`; rows are `scan_size` pixels apart.
/// For dimensions with a ceiling, each column starts at the first non-opaque block
/// below y=127 instead of the top of the chunk, which skips the roof.
pub fn render_surface<S: ColumnSource + ?Sized>(
    source: &S,
    pixels: &mut [u32],
    offset: usize,
    scan_size: usize,
    has_ceiling: bool,
    mode: HeightShading,
) {
    let max_y = source.max_y();
    for z in 0..CHUNK_DIMENSION {
        for x in 0..CHUNK_DIMENSION {
            let y = if has_ceiling {
                (0..=CEILING_SEARCH_TOP)
                    .rev()
                    .find(|&y| block_alpha(source.block_color(x, y, z)) != u8::MAX)
                    .unwrap_or(-1)
            } else {
                max_y - 1
            };

            let pixel_offset = offset + z as usize * scan_size + x as usize;
            render_column(source, pixels, pixel_offset, scan_size, (x, y, z), mode);
        }
    }
}

/// Renders a cave view of a chunk into `pixels`.
///
/// Each column starts from the last visible block above `start_y` before the first
/// opaque one. With a `mask`, only columns flagged `FLAG_NON_OPAQUE` are rendered.
pub fn render_underground<S: ColumnSource + ?Sized>(
    source: &S,
    pixels: &mut [u32],
    offset: usize,
    scan_size: usize,
    start_y: i32,
    mask: Option<&[u8]>,
    mode: HeightShading,
) {
    let start_y = start_y.clamp(0, 255);
    let max_y = source.max_y();
    for z in 0..CHUNK_DIMENSION {
        for x in 0..CHUNK_DIMENSION {
            let column = (z * CHUNK_DIMENSION + x) as usize;
            if mask.is_some_and(|mask| mask[column] != FLAG_NON_OPAQUE) {
                continue;
            }

            let mut last_visible_y = start_y;
            for y in start_y..max_y {
                let alpha = block_alpha(source.block_color(x, y, z));
                if alpha == u8::MAX {
                    break;
                }
                if alpha > 0 {
                    last_visible_y = y;
                }
            }

            let pixel_offset = offset + z as usize * scan_size + x as usize;
            render_column(source, pixels, pixel_offset, scan_size, (x, last_visible_y, z), mode);
        }
    }
}
