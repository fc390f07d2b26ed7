//! # Region Cache
//!
//! Maps world chunk coordinates to the region file that stores them and keeps a
//! bounded set of those files open.
//!
//! A chunk at `(cx, cz)` lives in region `(cx >> 5, cz >> 5)` at local position
//! `(cx & 31, cz & 31)`. Region files are laid out per dimension:
//!
//! ```text
//! <root>/region/r.<rx>.<rz>.mca          dimension 0
//! <root>/DIM<n>/region/r.<rx>.<rz>.mca   any other dimension
//! ```

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use cgmath::Point2;
use log::{debug, error};
use lru::LruCache;

use super::RegionFile;

/// Identifies one region file: a dimension and a region position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegionKey {
    /// Dimension id. Dimension 0 is stored at the root.
    pub dimension: i32,
    /// Region coordinates, in units of 32 chunks.
    pub position: Point2<i32>,
}

impl RegionKey {
    /// The region containing world chunk `chunk` in `dimension`.
    pub fn containing(dimension: i32, chunk: Point2<i32>) -> Self {
        RegionKey {
            dimension,
            position: Point2::new(chunk.x >> 5, chunk.y >> 5),
        }
    }
}

/// An LRU cache of open region files under one root directory.
pub struct RegionCache {
    root: PathBuf,
    regions: LruCache<RegionKey, RegionFile>,
}

impl RegionCache {
    /// Creates a cache rooted at `root` keeping at most `max_open` files open.
    pub fn new(root: impl Into<PathBuf>, max_open: usize) -> Self {
        let capacity = NonZeroUsize::new(max_open).unwrap_or(NonZeroUsize::MIN);
        RegionCache {
            root: root.into(),
            regions: LruCache::new(capacity),
        }
    }

    /// Root directory of the region files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn region_path(&self, key: RegionKey) -> PathBuf {
        let mut path = self.root.clone();
        if key.dimension != 0 {
            path.push(format!("DIM{}", key.dimension));
        }
        path.push("region");
        path.push(format!("r.{}.{}.mca", key.position.x, key.position.y));
        path
    }

    /// Number of region files currently open.
    pub fn open_count(&self) -> usize {
        self.regions.len()
    }

    /// Returns the open region for `key`, opening it if needed. Open failures are logged.
    pub fn region_mut(&mut self, key: RegionKey) -> Option<&mut RegionFile> {
        if self.regions.contains(&key) {
            return self.regions.get_mut(&key);
        }

        let path = self.region_path(key);
        let region = match RegionFile::open(&path) {
            Ok(region) => region,
            Err(e) => {
                error!("exception when opening region file '{}': {}", path.display(), e);
                return None;
            }
        };

        if let Some((evicted_key, mut evicted)) = self.regions.push(key, region) {
            debug!("closing region {:?} to make room", evicted_key);
            evicted.close();
        }
        self.regions.get_mut(&key)
    }

    /// Reads world chunk `chunk` of `dimension`.
    pub fn read_chunk(&mut self, dimension: i32, chunk: Point2<i32>) -> Option<Vec<u8>> {
        self.region_mut(RegionKey::containing(dimension, chunk))?
            .read_chunk(chunk.x, chunk.y)
    }

    /// Writes world chunk `chunk` of `dimension`. Returns whether it succeeded.
    pub fn write_chunk(&mut self, dimension: i32, chunk: Point2<i32>, data: &[u8]) -> bool {
        match self.region_mut(RegionKey::containing(dimension, chunk)) {
            Some(region) => region.write_chunk(chunk.x, chunk.y, data),
            None => false,
        }
    }

    /// Closes every open region file.
    pub fn close_all(&mut self) {
        while let Some((_, mut region)) = self.regions.pop_lru() {
            region.close();
        }
    }
}

impl Drop for RegionCache {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_chunks_map_to_negative_regions() {
        let key = RegionKey::containing(0, Point2::new(-1, 33));
        assert_eq!(key.position, Point2::new(-1, 1));
    }

    #[test]
    fn region_paths_per_dimension() {
        let cache = RegionCache::new("maps", 4);
        let overworld = RegionKey::containing(0, Point2::new(0, 0));
        let nether = RegionKey::containing(-1, Point2::new(64, -40));

        assert_eq!(
            cache.region_path(overworld),
            Path::new("maps").join("region").join("r.0.0.mca")
        );
        assert_eq!(
            cache.region_path(nether),
            Path::new("maps").join("DIM-1").join("region").join("r.2.-2.mca")
        );
    }

    #[test]
    fn evicts_least_recently_used_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = RegionCache::new(dir.path(), 2);

        for rx in 0..3 {
            assert!(cache.write_chunk(0, Point2::new(rx * 32, 0), b"payload"));
        }
        assert_eq!(cache.open_count(), 2);

        // the evicted region reopens from disk with its data intact
        assert_eq!(cache.read_chunk(0, Point2::new(0, 0)), Some(b"payload".to_vec()));
        cache.close_all();
        assert_eq!(cache.open_count(), 0);
    }
}
