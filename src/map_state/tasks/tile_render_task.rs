//! # Tile Render Task
//!
//! This module defines the `TileRenderTask`, which renders a chunk snapshot into a
//! map tile on the worker, saves the tile to its region file and then publishes it
//! to the controller's tile cache.

use log::warn;

use crate::{
    core::{MtResource, StResource},
    map_state::{
        region::RegionCache,
        render::{ChunkSnapshot, HeightShading, Tile, TileView},
        task_management::task::{Completion, Job, Task, TaskFault},
    },
};

use super::{PendingRenders, TileCache, TileKey};

/// A task that renders and stores the tile of one chunk.
///
/// While the task is in flight its key sits in the pending-render set, and any
/// further render of the same chunk is treated as a duplicate.
pub struct TileRenderTask {
    key: TileKey,
    snapshot: ChunkSnapshot,
    view: TileView,
    shading: HeightShading,
    regions: MtResource<RegionCache>,
    tiles: StResource<TileCache>,
    pending: StResource<PendingRenders>,
}

impl TileRenderTask {
    /// Creates a render task for `snapshot` in `dimension`.
    ///
    /// # Arguments
    /// * `dimension` - Dimension the chunk belongs to
    /// * `snapshot` - Block data of the chunk; its position keys the tile
    /// * `view` - Surface or underground view
    /// * `shading` - Height-shading curve
    /// * `regions` - Region files the tile is saved to
    /// * `tiles` - Controller tile cache the result is published to
    /// * `pending` - Tiles currently being rendered
    pub fn new(
        dimension: i32,
        snapshot: ChunkSnapshot,
        view: TileView,
        shading: HeightShading,
        regions: MtResource<RegionCache>,
        tiles: StResource<TileCache>,
        pending: StResource<PendingRenders>,
    ) -> Self {
        TileRenderTask {
            key: TileKey::new(dimension, snapshot.position),
            snapshot,
            view,
            shading,
            regions,
            tiles,
            pending,
        }
    }
}

impl Task for TileRenderTask {
    type Job = TileRenderJob;
    type Completion = TileRenderCompletion;

    fn kind(&self) -> &'static str {
        "tile render"
    }

    fn is_duplicate(&self) -> bool {
        self.pending.get().contains(&self.key)
    }

    fn split(self) -> (TileRenderJob, TileRenderCompletion) {
        self.pending.get_mut().insert(self.key);
        (
            TileRenderJob {
                key: self.key,
                snapshot: self.snapshot,
                view: self.view,
                shading: self.shading,
                regions: self.regions,
            },
            TileRenderCompletion {
                key: self.key,
                tiles: self.tiles,
                pending: self.pending,
            },
        )
    }
}

/// Worker half of a `TileRenderTask`.
pub struct TileRenderJob {
    key: TileKey,
    snapshot: ChunkSnapshot,
    view: TileView,
    shading: HeightShading,
    regions: MtResource<RegionCache>,
}

/// What a `TileRenderJob` produced.
pub struct RenderedTile {
    /// The rendered tile.
    pub tile: Tile,
    /// Whether the tile reached its region file.
    pub saved: bool,
}

impl Job for TileRenderJob {
    type Output = RenderedTile;

    fn run(self) -> RenderedTile {
        let tile = Tile::render(&self.snapshot, self.view, self.shading);
        let saved = self
            .regions
            .get_mut()
            .write_chunk(self.key.dimension, self.key.position, &tile.to_bytes());
        RenderedTile { tile, saved }
    }
}

/// Controller half of a `TileRenderTask`.
pub struct TileRenderCompletion {
    key: TileKey,
    tiles: StResource<TileCache>,
    pending: StResource<PendingRenders>,
}

impl Completion for TileRenderCompletion {
    type Output = RenderedTile;

    fn on_complete(self, outcome: Result<RenderedTile, TaskFault>) {
        self.pending.get_mut().remove(&self.key);

        // a failed render leaves whatever tile was cached before
        let Ok(rendered) = outcome else {
            return;
        };
        if !rendered.saved {
            warn!("tile {:?} rendered but not saved", self.key);
        }
        self.tiles.get_mut().insert(self.key, rendered.tile);
    }
}
