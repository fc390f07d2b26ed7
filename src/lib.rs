#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Region Map
//!
//! Storage and background rendering for a top-down world map built from chunked
//! voxel data.
//!
//! ## Key Modules
//!
//! * `core` - Shared and controller-only resource containers
//! * `config` - JSON configuration of the map
//! * `map_state` - Region files, the column compositor, the task pipeline and the
//!   `MapState` coordinator tying them together
//!
//! ## Architecture
//!
//! The map keeps a strict split between two threads:
//! * The controller owns every piece of displayed state and runs task completions
//! * A single worker runs rendering and region I/O in submission order
//!
//! Region files store up to 1024 chunks each in 4096-byte sectors; map tiles are
//! saved into them as ordinary chunk payloads.
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     region_map::run();
//! }
//! ```

use std::{env, time::Duration};

use cgmath::Point2;
use log::{error, info};

use config::MapConfig;
use map_state::{
    render::{snapshot::NO_TINT, ChunkSnapshot, TileView},
    tasks::TileKey,
    MapState,
};

pub mod config;
pub mod core;
pub mod map_state;

/// Half-width, in chunks, of the area rendered by `run()`.
const DEMO_RADIUS: i32 = 4;
const DEMO_MAX_Y: i32 = 128;

/// Renders and saves a small synthetic map, then reloads it.
///
/// The first command-line argument, if any, names a JSON config file.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match env::args().nth(1) {
        Some(path) => match MapConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return;
            }
        },
        None => MapConfig::default(),
    };

    let mut map = match MapState::new(&config) {
        Ok(map) => map,
        Err(e) => {
            error!("could not start map worker: {}", e);
            return;
        }
    };

    let view = TileView::Surface { has_ceiling: false };
    for cz in -DEMO_RADIUS..DEMO_RADIUS {
        for cx in -DEMO_RADIUS..DEMO_RADIUS {
            map.request_render(0, demo_chunk(Point2::new(cx, cz)), view);
        }
    }
    wait_for_tasks(&mut map);
    info!("rendered {} tiles", map.tile_count());

    let keys: Vec<TileKey> = (-DEMO_RADIUS..DEMO_RADIUS)
        .flat_map(|cz| {
            (-DEMO_RADIUS..DEMO_RADIUS).map(move |cx| TileKey::new(0, Point2::new(cx, cz)))
        })
        .collect();
    for key in &keys {
        map.evict_tile(*key);
    }
    map.request_close_regions();
    for key in keys {
        map.request_load(key);
    }
    wait_for_tasks(&mut map);
    info!("reloaded {} tiles", map.tile_count());

    map.shutdown();
}

fn wait_for_tasks(map: &mut MapState) {
    while map.task_manager().outstanding_count() > 0 {
        if map.process_tasks() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Rolling terrain with a water level, so both opaque and translucent columns appear.
fn demo_chunk(position: Point2<i32>) -> ChunkSnapshot {
    const GRASS: u32 = 0xFF5F_9F35;
    const STONE: u32 = 0xFF7F_7F7F;
    const WATER: u32 = 0x8030_40FF;
    const SEA_LEVEL: i32 = 62;

    let mut chunk = ChunkSnapshot::new(position, DEMO_MAX_Y);
    for z in 0..16 {
        for x in 0..16 {
            let wx = (position.x * 16 + x) as f64;
            let wz = (position.y * 16 + z) as f64;
            let height = 60 + ((wx * 0.11).sin() * 6.0 + (wz * 0.07).cos() * 5.0) as i32;

            chunk.fill_column(x, z, height - 1, STONE);
            chunk.set_block(x, height, z, GRASS, NO_TINT);
            for y in height + 1..=SEA_LEVEL {
                chunk.set_block(x, y, z, WATER, NO_TINT);
            }
        }
    }
    chunk
}
