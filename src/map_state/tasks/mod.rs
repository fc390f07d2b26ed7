//! # Map Tasks
//!
//! The concrete tasks the map submits to its `TaskManager`. Each one splits into a
//! job that touches only worker-side state (the shared `RegionCache`) and a
//! completion that touches only controller-side state (the tile cache and the set
//! of tiles being rendered).

use std::collections::{HashMap, HashSet};

use cgmath::Point2;

use super::render::Tile;

pub mod region_close_task;
pub mod tile_load_task;
pub mod tile_render_task;

pub use region_close_task::RegionCloseTask;
pub use tile_load_task::TileLoadTask;
pub use tile_render_task::TileRenderTask;

/// Identifies the tile of one chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Dimension id.
    pub dimension: i32,
    /// World chunk coordinates.
    pub position: Point2<i32>,
}

impl TileKey {
    /// Creates a key for the chunk at `position` in `dimension`.
    pub fn new(dimension: i32, position: Point2<i32>) -> Self {
        TileKey {
            dimension,
            position,
        }
    }
}

/// Tiles available to the controller.
pub type TileCache = HashMap<TileKey, Tile>;

/// Tiles with a render task in flight.
pub type PendingRenders = HashSet<TileKey>;
