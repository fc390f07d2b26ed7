//! # Chunk Snapshot
//!
//! An owned copy of the block colors, biome modifiers and light levels of one
//! chunk. Callers fill it on the controller thread from their world data and hand
//! it to a render task, so the worker never touches live world state.

use cgmath::Point2;

use super::chunk_render::ColumnSource;
use super::column::{AIR_COLOR, MAX_LIGHT};
use super::CHUNK_DIMENSION;

/// Modifier that leaves a block color unchanged.
pub const NO_TINT: u32 = 0x00FF_FFFF;

const COLUMNS: usize = (CHUNK_DIMENSION * CHUNK_DIMENSION) as usize;

/// Block data of one chunk, stored column by column.
#[derive(Clone, Debug)]
pub struct ChunkSnapshot {
    /// World chunk coordinates.
    pub position: Point2<i32>,
    max_y: i32,
    colors: Vec<u32>,
    modifiers: Vec<u32>,
    light: Vec<u8>,
}

impl ChunkSnapshot {
    /// Creates an all-air, fully lit chunk `max_y` blocks tall.
    pub fn new(position: Point2<i32>, max_y: i32) -> Self {
        let blocks = COLUMNS * max_y.max(0) as usize;
        ChunkSnapshot {
            position,
            max_y: max_y.max(0),
            colors: vec![AIR_COLOR; blocks],
            modifiers: vec![NO_TINT; blocks],
            light: vec![MAX_LIGHT; blocks],
        }
    }

    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        let in_column = (0..CHUNK_DIMENSION).contains(&x) && (0..CHUNK_DIMENSION).contains(&z);
        if !in_column || !(0..self.max_y).contains(&y) {
            return None;
        }
        Some(((z * CHUNK_DIMENSION + x) * self.max_y + y) as usize)
    }

    /// Sets the block at `(x, y, z)`. Out-of-range coordinates are ignored.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, color: u32, modifier: u32) {
        if let Some(index) = self.index(x, y, z) {
            self.colors[index] = color;
            self.modifiers[index] = modifier;
        }
    }

    /// Sets the light level at `(x, y, z)`. Out-of-range coordinates are ignored.
    pub fn set_light(&mut self, x: i32, y: i32, z: i32, level: u8) {
        if let Some(index) = self.index(x, y, z) {
            self.light[index] = level.min(MAX_LIGHT);
        }
    }

    /// Fills the column at `(x, z)` from `y = 0` up to `height` with `color`.
    pub fn fill_column(&mut self, x: i32, z: i32, height: i32, color: u32) {
        for y in 0..=height {
            self.set_block(x, y, z, color, NO_TINT);
        }
    }
}

impl ColumnSource for ChunkSnapshot {
    fn max_y(&self) -> i32 {
        self.max_y
    }

    fn block_color(&self, x: i32, y: i32, z: i32) -> u32 {
        self.index(x, y, z).map_or(AIR_COLOR, |index| self.colors[index])
    }

    fn color_modifier(&self, x: i32, y: i32, z: i32) -> u32 {
        self.index(x, y, z).map_or(NO_TINT, |index| self.modifiers[index])
    }

    fn light_level(&self, x: i32, y: i32, z: i32) -> u8 {
        match self.index(x, y, z) {
            Some(index) => self.light[index],
            None if y >= self.max_y => MAX_LIGHT,
            None => 0,
        }
    }
}
