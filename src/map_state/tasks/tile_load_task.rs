//! # Tile Load Task
//!
//! Reads a previously saved tile from its region file and publishes it to the
//! controller's tile cache.

use log::warn;

use crate::{
    core::{MtResource, StResource},
    map_state::{
        region::RegionCache,
        render::Tile,
        task_management::task::{Completion, Job, Task, TaskFault},
    },
};

use super::{TileCache, TileKey};

/// A task that loads one stored tile.
///
/// A load is a duplicate when the tile is already cached.
pub struct TileLoadTask {
    key: TileKey,
    regions: MtResource<RegionCache>,
    tiles: StResource<TileCache>,
}

impl TileLoadTask {
    /// Creates a load task for the tile at `key`.
    pub fn new(
        key: TileKey,
        regions: MtResource<RegionCache>,
        tiles: StResource<TileCache>,
    ) -> Self {
        TileLoadTask {
            key,
            regions,
            tiles,
        }
    }
}

impl Task for TileLoadTask {
    type Job = TileLoadJob;
    type Completion = TileLoadCompletion;

    fn kind(&self) -> &'static str {
        "tile load"
    }

    fn is_duplicate(&self) -> bool {
        self.tiles.get().contains_key(&self.key)
    }

    fn split(self) -> (TileLoadJob, TileLoadCompletion) {
        (
            TileLoadJob {
                key: self.key,
                regions: self.regions,
            },
            TileLoadCompletion {
                key: self.key,
                tiles: self.tiles,
            },
        )
    }
}

/// Worker half of a `TileLoadTask`.
pub struct TileLoadJob {
    key: TileKey,
    regions: MtResource<RegionCache>,
}

impl Job for TileLoadJob {
    type Output = Option<Tile>;

    fn run(self) -> Option<Tile> {
        let bytes = self
            .regions
            .get_mut()
            .read_chunk(self.key.dimension, self.key.position)?;
        let tile = Tile::from_bytes(&bytes);
        if tile.is_none() {
            warn!("stored tile {:?} has {} bytes, ignoring it", self.key, bytes.len());
        }
        tile
    }
}

/// Controller half of a `TileLoadTask`.
pub struct TileLoadCompletion {
    key: TileKey,
    tiles: StResource<TileCache>,
}

impl Completion for TileLoadCompletion {
    type Output = Option<Tile>;

    fn on_complete(self, outcome: Result<Option<Tile>, TaskFault>) {
        if let Ok(Some(tile)) = outcome {
            // a render that completed first holds the newer tile
            self.tiles.get_mut().entry(self.key).or_insert(tile);
        }
    }
}
