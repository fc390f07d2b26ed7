//! # Region File
//!
//! A file-backed, sector-granular store for up to 1024 compressed chunks.
//!
//! ## Allocation
//!
//! When a chunk is committed it needs `ceil((compressed_len + 5) / 4096)` sectors.
//! If it already owns at least that many it stays where it is and gives back its
//! tail. Otherwise its old run is released and `SectorMap::find_free_run` picks the
//! closest-fitting free run, or the end of the file.
//!
//! The sector map is updated before the data is written, and the location entry
//! after. A failed write drops the chunk from the table instead of leaving an entry
//! that points at sectors the map considers free.
//!
//! ## Corruption
//!
//! Nothing read from disk is trusted. Overlapping or out-of-range entries found on
//! open are logged and treated as absent; a bad length or version byte makes only
//! that chunk unreadable.

use std::{
    fs::{self, File, OpenOptions},
    io::{Cursor, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use log::{debug, error, info, warn};
use web_time::{SystemTime, UNIX_EPOCH};

use super::{
    chunk_index, required_sectors, ChunkWriter, CompressionScheme, RegionError, Section,
    SectorMap, CHUNK_COUNT, CHUNK_HEADER_SIZE, HEADER_SECTORS, MAX_SECTORS_PER_CHUNK,
    MAX_SECTOR_COUNT, SECTOR_SIZE,
};

/// A decompressing reader over one stored chunk.
pub type ChunkReader = ZlibDecoder<Cursor<Vec<u8>>>;

/// One open region file and its in-memory tables.
pub struct RegionFile {
    path: PathBuf,
    file: Option<File>,
    sections: Vec<Option<Section>>,
    timestamps: Vec<u32>,
    sector_map: SectorMap,
}

impl RegionFile {
    /// Opens the region file at `path`, creating it and its parent directories if missing.
    ///
    /// Files shorter than three sectors are initialised with empty tables. Otherwise
    /// both tables are read and the sector map is rebuilt from the location table.
    pub fn open(path: impl AsRef<Path>) -> Result<RegionFile, RegionError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if dir.exists() {
                if !dir.is_dir() {
                    return Err(RegionError::NotADirectory(dir.to_path_buf()));
                }
            } else {
                fs::create_dir_all(dir)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let length_in_sectors = file.metadata()?.len().div_ceil(SECTOR_SIZE as u64) as usize;
        if length_in_sectors > MAX_SECTOR_COUNT {
            warn!(
                "region file {} spans {} sectors, only the first {} are addressable",
                path.display(),
                length_in_sectors,
                MAX_SECTOR_COUNT
            );
        }

        let mut region = RegionFile {
            path,
            file: None,
            sections: vec![None; CHUNK_COUNT],
            timestamps: vec![0; CHUNK_COUNT],
            sector_map: SectorMap::new(length_in_sectors),
        };

        file.seek(SeekFrom::Start(0))?;
        if length_in_sectors <= HEADER_SECTORS {
            file.write_all(&[0u8; HEADER_SECTORS * SECTOR_SIZE])?;
        } else {
            let mut header = vec![0u8; HEADER_SECTORS * SECTOR_SIZE];
            file.read_exact(&mut header)?;
            region.load_tables(&header);
        }

        region.file = Some(file);
        Ok(region)
    }

    fn load_tables(&mut self, header: &[u8]) {
        let entries = header
            .chunks_exact(4)
            .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));

        for (index, entry) in entries.enumerate() {
            if index >= CHUNK_COUNT {
                self.timestamps[index - CHUNK_COUNT] = entry;
                continue;
            }
            let Some(section) = Section::from_location(entry) else {
                continue;
            };
            if section.end() > self.sector_map.len() {
                error!(
                    "chunk {} in {} ends at sector {} past the end of the file, ignoring it",
                    index,
                    self.path.display(),
                    section.end()
                );
            } else if self.sector_map.overlaps(section) {
                error!(
                    "chunk {} in {} overlaps another chunk, file may be corrupt",
                    index,
                    self.path.display()
                );
            } else {
                self.sector_map.fill(section);
                self.sections[index] = Some(section);
            }
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file handle is still held.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Number of sectors the file spans.
    pub fn length_in_sectors(&self) -> usize {
        self.sector_map.len()
    }

    /// The sectors allocated to chunk `(x, z)`, if it is stored.
    pub fn section(&self, x: i32, z: i32) -> Option<Section> {
        self.sections[chunk_index(x, z)]
    }

    /// Every stored chunk's index and sectors.
    pub fn sections(&self) -> impl Iterator<Item = (usize, Section)> + '_ {
        self.sections
            .iter()
            .enumerate()
            .filter_map(|(index, section)| section.map(|section| (index, section)))
    }

    /// Unix time of the last write to chunk `(x, z)`, or 0 if never written.
    pub fn timestamp(&self, x: i32, z: i32) -> u32 {
        self.timestamps[chunk_index(x, z)]
    }

    /// Filled and free sector counts past the header.
    pub fn sector_usage(&self) -> (usize, usize) {
        self.sector_map.usage()
    }

    /// Logs sector usage and the full occupancy map.
    pub fn log_sector_map(&self) {
        let (filled, free) = self.sector_usage();
        info!(
            "region file {}: filled sectors = {}, free sectors = {}",
            self.path.display(),
            filled,
            free
        );
        for row in self.sector_map.rows() {
            debug!("{}", row);
        }
    }

    /// Returns a decompressing reader over chunk `(x, z)`.
    ///
    /// Returns `None` when the chunk is absent, the file is closed, or the stored
    /// chunk fails validation. Failures are logged.
    pub fn read(&mut self, x: i32, z: i32) -> Option<ChunkReader> {
        match self.try_read(x, z) {
            Ok(reader) => reader,
            Err(e) => {
                error!(
                    "could not read chunk ({}, {}) from {}: {}",
                    x,
                    z,
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn try_read(&mut self, x: i32, z: i32) -> Result<Option<ChunkReader>, RegionError> {
        let Some(section) = self.section(x, z) else {
            return Ok(None);
        };
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RegionError::Closed(self.path.clone()))?;

        file.seek(SeekFrom::Start(section.byte_offset()))?;
        let mut prefix = [0u8; CHUNK_HEADER_SIZE];
        file.read_exact(&mut prefix)?;
        let length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let version = prefix[4];

        if length <= 1 || length as usize + 4 > section.byte_len() {
            return Err(RegionError::InvalidLength {
                x,
                z,
                length,
                allocated: section.byte_len(),
            });
        }
        if CompressionScheme::from_version(version) != Some(CompressionScheme::Zlib) {
            return Err(RegionError::InvalidVersion { x, z, version });
        }

        let mut compressed = vec![0u8; length as usize - 1];
        file.read_exact(&mut compressed)?;
        Ok(Some(ZlibDecoder::new(Cursor::new(compressed))))
    }

    /// Reads and decompresses chunk `(x, z)` in full.
    pub fn read_chunk(&mut self, x: i32, z: i32) -> Option<Vec<u8>> {
        let mut reader = self.read(x, z)?;
        let mut data = Vec::new();
        match reader.read_to_end(&mut data) {
            Ok(_) => Some(data),
            Err(e) => {
                error!(
                    "could not decompress chunk ({}, {}) from {}: {}",
                    x,
                    z,
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Returns a sink for chunk `(x, z)`. The chunk is written when the sink is finished.
    pub fn write(&mut self, x: i32, z: i32) -> ChunkWriter<'_> {
        ChunkWriter::new(self, x, z)
    }

    /// Compresses `data` and stores it as chunk `(x, z)`. Returns whether it succeeded.
    ///
    /// An empty payload is skipped and counts as success.
    pub fn write_chunk(&mut self, x: i32, z: i32, data: &[u8]) -> bool {
        if data.is_empty() {
            warn!("not writing chunk ({}, {}) with length 0", x, z);
            return true;
        }

        let buffer = Vec::with_capacity(data.len() / 2);
        let mut encoder = ZlibEncoder::new(buffer, Compression::default());
        let compressed = encoder.write_all(data).and_then(|_| encoder.finish());
        match compressed {
            Ok(compressed) => self.write_compressed(x, z, &compressed),
            Err(e) => {
                error!("could not compress chunk ({}, {}): {}", x, z, e);
                false
            }
        }
    }

    /// Stores an already zlib-compressed chunk. Returns whether it succeeded.
    pub fn write_compressed(&mut self, x: i32, z: i32, compressed: &[u8]) -> bool {
        if compressed.is_empty() {
            warn!("not writing chunk ({}, {}) with length 0", x, z);
            return true;
        }

        match self.try_write_compressed(x, z, compressed) {
            Ok(_) => true,
            Err(e) => {
                error!(
                    "could not write chunk ({}, {}) to {}: {}",
                    x,
                    z,
                    self.path.display(),
                    e
                );
                false
            }
        }
    }

    fn try_write_compressed(
        &mut self,
        x: i32,
        z: i32,
        compressed: &[u8],
    ) -> Result<Section, RegionError> {
        if self.file.is_none() {
            return Err(RegionError::Closed(self.path.clone()));
        }

        let required = required_sectors(compressed.len() + CHUNK_HEADER_SIZE);
        if required > MAX_SECTORS_PER_CHUNK {
            return Err(RegionError::ChunkTooLarge {
                x,
                z,
                sectors: required,
            });
        }

        let index = chunk_index(x, z);
        let current = self.sections[index];
        if let Some(current) = current {
            self.sector_map.free(current);
        }

        let section = match current {
            Some(current) if required <= current.count => Section::new(current.start, required),
            _ => Section::new(self.sector_map.find_free_run(required), required),
        };
        if section.end() > MAX_SECTOR_COUNT {
            if let Some(current) = current {
                self.sector_map.fill(current);
            }
            return Err(RegionError::SectorOverflow {
                x,
                z,
                end: section.end(),
            });
        }

        self.sector_map.fill(section);
        let written = self
            .write_chunk_data(section, compressed)
            .and_then(|_| self.update_location(index, Some(section)));

        if let Err(e) = written {
            self.sector_map.free(section);
            self.sections[index] = None;
            if let Err(clear) = self.update_location(index, None) {
                debug!("could not clear location of chunk ({}, {}): {}", x, z, clear);
            }
            return Err(e);
        }

        if let Err(e) = self.update_timestamp(index) {
            warn!("could not record timestamp of chunk ({}, {}): {}", x, z, e);
        }
        Ok(section)
    }

    fn write_chunk_data(&mut self, section: Section, compressed: &[u8]) -> Result<(), RegionError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RegionError::Closed(self.path.clone()))?;

        let mut record = Vec::with_capacity(compressed.len() + CHUNK_HEADER_SIZE);
        record.extend_from_slice(&(compressed.len() as u32 + 1).to_be_bytes());
        record.push(CompressionScheme::Zlib as u8);
        record.extend_from_slice(compressed);

        file.seek(SeekFrom::Start(section.byte_offset()))?;
        file.write_all(&record)?;
        Ok(())
    }

    fn update_location(
        &mut self,
        index: usize,
        section: Option<Section>,
    ) -> Result<(), RegionError> {
        self.sections[index] = section;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RegionError::Closed(self.path.clone()))?;

        let entry = section.map_or(0, |section| section.to_location());
        file.seek(SeekFrom::Start((index * 4) as u64))?;
        file.write_all(&entry.to_be_bytes())?;
        Ok(())
    }

    fn update_timestamp(&mut self, index: usize) -> Result<(), RegionError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as u32);
        self.timestamps[index] = now;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RegionError::Closed(self.path.clone()))?;

        file.seek(SeekFrom::Start((SECTOR_SIZE + index * 4) as u64))?;
        file.write_all(&now.to_be_bytes())?;
        Ok(())
    }

    /// Releases the file handle. Safe to call more than once; errors are ignored.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all() {
                debug!("error syncing {} on close: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for RegionFile {
    fn drop(&mut self) {
        self.close();
    }
}
