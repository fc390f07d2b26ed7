//! # Map State Module
//!
//! The controller-side coordinator of the map: it owns the task pipeline, the
//! region files shared with the worker and the tiles the controller displays.
//!
//! ## Key Components
//!
//! * `MapState` - The coordinator, driven once per frame by the caller
//! * `region` - Region files, their sector allocator and the open-file cache
//! * `render` - Column compositing and chunk tiles
//! * `task_management` - The ordered single-worker task pipeline
//! * `tasks` - The concrete render, load and close tasks
//!
//! ## Threads
//!
//! The region cache is an `MtResource` because jobs write tiles through it on the
//! worker. The tile cache and the pending-render set are `StResource`s; only
//! completions and the duplicate checks touch them, and both run on the
//! controller thread.

use std::io;

use log::info;

use crate::{
    config::MapConfig,
    core::{MtResource, StResource},
};

use region::RegionCache;
use render::{ChunkSnapshot, HeightShading, Tile, TileView};
use task_management::{TaskManager, TaskManagerConfig};
use tasks::{PendingRenders, RegionCloseTask, TileCache, TileKey, TileLoadTask, TileRenderTask};

pub mod region;
pub mod render;
pub mod task_management;
pub mod tasks;

/// The map's controller-side state.
///
/// # Examples
///
/// ```no_run
/// use cgmath::Point2;
/// use region_map::config::MapConfig;
/// use region_map::map_state::{render::{ChunkSnapshot, TileView}, MapState};
///
/// let mut map = MapState::new(&MapConfig::default()).unwrap();
/// let snapshot = ChunkSnapshot::new(Point2::new(0, 0), 128);
/// map.request_render(0, snapshot, TileView::Surface { has_ceiling: false });
///
/// // Main loop
/// loop {
///     map.process_tasks();
///     # break;
/// }
/// map.shutdown();
/// ```
pub struct MapState {
    task_manager: TaskManager,
    regions: MtResource<RegionCache>,
    tiles: StResource<TileCache>,
    pending_renders: StResource<PendingRenders>,
    shading: HeightShading,
}

impl MapState {
    /// Creates the map state and starts its worker.
    ///
    /// # Errors
    /// Fails if the worker thread cannot be spawned.
    pub fn new(config: &MapConfig) -> io::Result<Self> {
        let task_manager = TaskManager::new(TaskManagerConfig::from(config))?;
        info!("map regions under '{}'", config.region_dir.display());

        Ok(MapState {
            task_manager,
            regions: MtResource::new(RegionCache::new(
                config.region_dir.clone(),
                config.max_open_regions,
            )),
            tiles: StResource::new(TileCache::new()),
            pending_renders: StResource::new(PendingRenders::new()),
            shading: config.height_shading(),
        })
    }

    /// Schedules rendering and saving the tile of `snapshot`.
    ///
    /// Returns whether a task was submitted; a chunk already being rendered is skipped.
    pub fn request_render(
        &mut self,
        dimension: i32,
        snapshot: ChunkSnapshot,
        view: TileView,
    ) -> bool {
        self.task_manager.submit(TileRenderTask::new(
            dimension,
            snapshot,
            view,
            self.shading,
            self.regions.clone(),
            self.tiles.clone(),
            self.pending_renders.clone(),
        ))
    }

    /// Schedules loading the stored tile at `key`.
    ///
    /// Returns whether a task was submitted; a tile already cached is skipped.
    pub fn request_load(&mut self, key: TileKey) -> bool {
        self.task_manager
            .submit(TileLoadTask::new(key, self.regions.clone(), self.tiles.clone()))
    }

    /// Schedules closing every open region file behind the work already submitted.
    pub fn request_close_regions(&mut self) -> bool {
        self.task_manager.submit(RegionCloseTask::new(self.regions.clone()))
    }

    /// Runs the completions of every finished task, in submission order.
    ///
    /// Call once per frame. Returns how many tasks completed.
    pub fn process_tasks(&mut self) -> usize {
        let mut completed = 0;
        while !self.task_manager.drain_one() {
            completed += 1;
        }
        completed
    }

    /// The cached tile at `key`.
    pub fn tile(&self, key: TileKey) -> Option<Tile> {
        self.tiles.get().get(&key).cloned()
    }

    /// Number of cached tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.get().len()
    }

    /// Drops the cached tile at `key`. The stored copy is kept.
    pub fn evict_tile(&mut self, key: TileKey) -> Option<Tile> {
        self.tiles.get_mut().remove(&key)
    }

    /// Whether a render of `key` is in flight.
    pub fn is_rendering(&self, key: TileKey) -> bool {
        self.pending_renders.get().contains(&key)
    }

    /// The task pipeline.
    pub fn task_manager(&self) -> &TaskManager {
        &self.task_manager
    }

    /// Drains the pipeline and closes the region files.
    ///
    /// Returns whether every task completed within the shutdown budget.
    pub fn shutdown(&mut self) -> bool {
        if !self.task_manager.is_closed() {
            self.request_close_regions();
        }
        let drained = self.task_manager.shutdown();
        if drained {
            self.regions.get_mut().close_all();
        }
        drained
    }
}
